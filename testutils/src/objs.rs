use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use po_api::v1::*;
use po_api::v1alpha1::*;
use po_core::constants::*;
use rstest::fixture;

use crate::constants::*;

fn meta(ns: &str, name: &str) -> metav1::ObjectMeta {
    metav1::ObjectMeta {
        namespace: Some(ns.into()),
        name: Some(name.into()),
        generation: Some(1),
        ..Default::default()
    }
}

pub fn match_labels(key: &str, value: &str) -> metav1::LabelSelector {
    metav1::LabelSelector {
        match_labels: Some(BTreeMap::from([(key.into(), value.into())])),
        ..Default::default()
    }
}

#[fixture]
pub fn test_prometheus() -> Prometheus {
    Prometheus {
        metadata: meta(TEST_NAMESPACE, TEST_PROMETHEUS),
        spec: PrometheusSpec {
            common: CommonPrometheusFields {
                scrape_interval: Some("30s".into()),
                service_monitor_selector: Some(match_labels("group", "group1")),
                ..Default::default()
            },
            evaluation_interval: Some("30s".into()),
            ..Default::default()
        },
    }
}

#[fixture]
pub fn test_service_monitor(#[default(TEST_SERVICE_MONITOR)] name: &str) -> ServiceMonitor {
    ServiceMonitor {
        metadata: metav1::ObjectMeta {
            labels: Some(BTreeMap::from([("group".into(), "group1".into())])),
            ..meta(TEST_NAMESPACE, name)
        },
        spec: ServiceMonitorSpec {
            selector: match_labels("group", "group1"),
            endpoints: vec![Endpoint {
                port: Some("web".into()),
                interval: Some("30s".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
        status: None,
    }
}

#[fixture]
pub fn test_pod_monitor(#[default(TEST_POD_MONITOR)] name: &str) -> PodMonitor {
    PodMonitor {
        metadata: metav1::ObjectMeta {
            labels: Some(BTreeMap::from([("group".into(), "group1".into())])),
            ..meta(TEST_NAMESPACE, name)
        },
        spec: PodMonitorSpec {
            selector: match_labels("group", "group1"),
            pod_metrics_endpoints: vec![PodMetricsEndpoint {
                port: Some("web".into()),
                interval: Some("30s".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
        status: None,
    }
}

#[fixture]
pub fn test_probe(#[default(TEST_PROBE)] name: &str) -> Probe {
    Probe {
        metadata: metav1::ObjectMeta {
            labels: Some(BTreeMap::from([("group".into(), "group1".into())])),
            ..meta(TEST_NAMESPACE, name)
        },
        spec: ProbeSpec {
            module: Some("http_2xx".into()),
            prober: Some(ProberSpec {
                url: "blackbox.exporter.io".into(),
                ..Default::default()
            }),
            targets: ProbeTargets {
                static_config: Some(ProbeTargetStaticConfig {
                    targets: vec!["prometheus.io".into(), "promcon.io".into()],
                    labels: Some(BTreeMap::from([("static".into(), "label".into())])),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        },
        status: None,
    }
}

#[fixture]
pub fn test_scrape_config(#[default(TEST_SCRAPE_CONFIG)] name: &str) -> ScrapeConfig {
    ScrapeConfig {
        metadata: metav1::ObjectMeta {
            labels: Some(BTreeMap::from([("group".into(), "group1".into())])),
            ..meta(TEST_NAMESPACE, name)
        },
        spec: ScrapeConfigSpec {
            static_configs: Some(vec![StaticConfig {
                targets: vec!["target1:9100".into(), "target2:9100".into()],
                labels: Some(BTreeMap::from([("env".into(), "prod".into())])),
            }]),
            ..Default::default()
        },
        status: None,
    }
}

#[fixture]
pub fn test_namespace(#[default(TEST_NAMESPACE)] name: &str) -> corev1::Namespace {
    corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some(name.into()),
            labels: Some(BTreeMap::from([(KUBERNETES_IO_METADATA_NAME_KEY.into(), name.into())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn test_secret(name: &str, data: &[(&str, &str)]) -> corev1::Secret {
    corev1::Secret {
        metadata: meta(TEST_NAMESPACE, name),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn test_config_map(name: &str, data: &[(&str, &str)]) -> corev1::ConfigMap {
    corev1::ConfigMap {
        metadata: meta(TEST_NAMESPACE, name),
        data: Some(data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
        ..Default::default()
    }
}

pub fn secret_selector(name: &str, key: &str) -> SecretKeySelector {
    SecretKeySelector { name: name.into(), key: key.into(), optional: None }
}

pub fn config_map_selector(name: &str, key: &str) -> ConfigMapKeySelector {
    ConfigMapKeySelector { name: name.into(), key: key.into(), optional: None }
}
