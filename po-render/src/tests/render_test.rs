use std::io::Read;

use flate2::read::GzDecoder;
use serde_yaml::{
    Mapping,
    Value,
};
use tracing_test::traced_test;

use super::*;
use crate::bundle::Bundle;
use crate::render::{
    self,
    RenderError,
};

const BUNDLE: &str = r#"
prometheus:
  apiVersion: monitoring.coreos.com/v1
  kind: Prometheus
  metadata:
    name: test
    namespace: default
  spec:
    version: v2.55.0
    serviceMonitorSelector:
      matchLabels:
        group: group1
    scrapeConfigSelector: {}
serviceMonitors:
- apiVersion: monitoring.coreos.com/v1
  kind: ServiceMonitor
  metadata:
    name: web
    namespace: default
    labels:
      group: group1
  spec:
    selector:
      matchLabels:
        app: web
    endpoints:
    - port: web
- apiVersion: monitoring.coreos.com/v1
  kind: ServiceMonitor
  metadata:
    name: broken
    namespace: default
    labels:
      group: group1
  spec:
    selector:
      matchLabels:
        app: broken
    endpoints:
    - port: web
      basicAuth:
        username:
          name: missing
          key: user
        password:
          name: missing
          key: pass
scrapeConfigs:
- apiVersion: monitoring.coreos.com/v1alpha1
  kind: ScrapeConfig
  metadata:
    name: static
    namespace: default
  spec:
    staticConfigs:
    - targets: ["node:9100"]
ruleConfigMapNames: [rules-0]
"#;

fn parse(bundle: &str) -> Bundle {
    serde_yaml::from_str(bundle).unwrap()
}

fn job_names(cfg: &Mapping) -> Vec<String> {
    cfg["scrape_configs"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|j| j["job_name"].as_str().unwrap().to_string())
        .collect()
}

#[rstest]
#[tokio::test]
#[traced_test]
async fn test_render_server_bundle() {
    let out = render::cmd(&parse(BUNDLE), true).await.unwrap();
    let cfg: Mapping = serde_yaml::from_slice(&out).unwrap();

    assert_eq!(job_names(&cfg), vec!["default/web/0", "default/static"]);
    assert_eq!(cfg["rule_files"], Value::from(vec!["/etc/prometheus/rules/rules-0/*.yaml"]));
    assert!(cfg.contains_key("alerting"));
    assert!(logs_contain("1 resource(s) were rejected"));
}

#[rstest]
#[tokio::test]
async fn test_render_gzip() {
    let bundle = parse(BUNDLE);
    let compressed = render::cmd(&bundle, false).await.unwrap();
    let plain = render::cmd(&bundle, true).await.unwrap();

    let mut decoded = vec![];
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, plain);
}

#[rstest]
#[tokio::test]
async fn test_render_agent_bundle() {
    let bundle = r#"
prometheusAgent:
  apiVersion: monitoring.coreos.com/v1alpha1
  kind: PrometheusAgent
  metadata:
    name: agent
    namespace: default
  spec:
    remoteWrite:
    - url: http://remote:9090/api/v1/write
"#;
    let out = render::cmd(&parse(bundle), true).await.unwrap();
    let cfg: Mapping = serde_yaml::from_slice(&out).unwrap();

    let keys: Vec<_> = cfg.keys().map(|k| k.as_str().unwrap()).collect();
    assert_eq!(keys, vec!["global", "scrape_configs", "remote_write"]);
    assert_eq!(cfg["remote_write"][0]["url"], Value::from("http://remote:9090/api/v1/write"));
}

#[rstest]
#[tokio::test]
#[case::empty("serviceMonitors: []")]
#[case::both(
    r#"
prometheus:
  apiVersion: monitoring.coreos.com/v1
  kind: Prometheus
  metadata: {name: a, namespace: default}
  spec: {}
prometheusAgent:
  apiVersion: monitoring.coreos.com/v1alpha1
  kind: PrometheusAgent
  metadata: {name: b, namespace: default}
  spec: {}
"#
)]
async fn test_render_needs_exactly_one_workload(#[case] bundle: &str) {
    let err = render::cmd(&parse(bundle), true).await.unwrap_err();
    assert!(matches!(err.downcast::<RenderError>().unwrap(), RenderError::InvalidBundle(_)));
}

#[rstest]
fn test_bundle_rejects_unknown_fields() {
    assert_err!(serde_yaml::from_str::<Bundle>("prometheuses: []"));
}
