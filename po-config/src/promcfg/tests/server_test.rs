use po_api::IntOrString;
use tracing_test::traced_test;

use super::*;

fn remote_write(url: &str) -> RemoteWriteSpec {
    RemoteWriteSpec { url: url.into(), ..Default::default() }
}

fn alertmanager(name: &str, port: IntOrString) -> AlertmanagerEndpoints {
    AlertmanagerEndpoints { name: name.into(), port, ..Default::default() }
}

fn with_alertmanagers(mut prom: Prometheus, ams: Vec<AlertmanagerEndpoints>) -> Prometheus {
    prom.spec.alerting = Some(AlertingSpec { alertmanagers: ams });
    prom
}

fn remote_writes(cfg: &Mapping) -> Vec<Value> {
    cfg["remote_write"].as_sequence().unwrap().clone()
}

#[rstest]
fn test_alerting_defaults(test_prometheus: Prometheus) {
    let prom = with_alertmanagers(test_prometheus, vec![alertmanager("alertmanager-main", IntOrString::String("web".into()))]);
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    let alerting = &cfg["alerting"];
    assert_eq!(alerting["alert_relabel_configs"][0]["regex"], Value::from("prometheus_replica"));
    assert_eq!(alerting["alert_relabel_configs"][0]["action"], Value::from("labeldrop"));

    let am = &alerting["alertmanagers"][0];
    assert_eq!(am["path_prefix"], Value::from("/"));
    assert_eq!(am["scheme"], Value::from("http"));
    assert_eq!(am["api_version"], Value::from("v2"));
    assert_eq!(am["kubernetes_sd_configs"][0]["namespaces"]["names"], Value::from(vec!["default"]));

    let rules: Vec<Value> = am["relabel_configs"].as_sequence().unwrap().clone();
    assert_eq!(
        rules,
        relabel_configs(&[
            relabel::keep(&["__meta_kubernetes_service_name"], "alertmanager-main"),
            relabel::keep(&["__meta_kubernetes_endpoints_port_name"], "web"),
        ])
    );
}

#[rstest]
fn test_alertmanager_numeric_port_and_namespace(test_prometheus: Prometheus) {
    let am = AlertmanagerEndpoints {
        namespace: Some("monitoring".into()),
        api_version: Some("V1".into()),
        path_prefix: Some("/am".into()),
        ..alertmanager("am", IntOrString::Int(9093))
    };
    let prom = with_alertmanagers(test_prometheus, vec![am]);
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    let am = &cfg["alerting"]["alertmanagers"][0];
    assert_eq!(am["path_prefix"], Value::from("/am"));
    assert_eq!(am["api_version"], Value::from("v1"));
    assert_eq!(am["kubernetes_sd_configs"][0]["namespaces"]["names"], Value::from(vec!["monitoring"]));
    assert_eq!(
        am["relabel_configs"][1],
        relabel_config(&relabel::keep(&["__meta_kubernetes_pod_container_port_number"], "9093"))
    );
}

#[rstest]
#[case::old("v2.50.0", false)]
#[case::new("v2.51.0", true)]
fn test_alertmanager_alert_relabelings_gated(test_prometheus: Prometheus, #[case] version: &str, #[case] present: bool) {
    let am = AlertmanagerEndpoints {
        alert_relabelings: Some(vec![relabel::set_label("team", "ops")]),
        ..alertmanager("am", IntOrString::String("web".into()))
    };
    let prom = with_version(with_alertmanagers(test_prometheus, vec![am]), version);
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    let am = cfg["alerting"]["alertmanagers"][0].as_mapping().unwrap();
    assert_eq!(am.contains_key("alert_relabel_configs"), present);
}

#[rstest]
#[tokio::test]
async fn test_alertmanager_basic_auth(test_prometheus: Prometheus) {
    let am = AlertmanagerEndpoints {
        basic_auth: Some(BasicAuth {
            username: Some(secret_selector(TEST_SECRET, "user")),
            password: Some(secret_selector(TEST_SECRET, "pass")),
        }),
        ..alertmanager("am", IntOrString::String("web".into()))
    };
    let prom = with_alertmanagers(test_prometheus, vec![am]);
    let secret = test_secret(TEST_SECRET, &[("user", "admin"), ("pass", "hunter2")]);
    let assets = load_assets(&prom, vec![secret]).await;

    let cfg = render(&prom, &ConfigInputs::default(), &assets);
    assert_eq!(cfg["alerting"]["alertmanagers"][0]["basic_auth"]["username"], Value::from("admin"));

    let old = with_version(prom, "v2.25.0");
    let cfg = render(&old, &ConfigInputs::default(), &assets);
    assert!(!cfg["alerting"]["alertmanagers"][0].as_mapping().unwrap().contains_key("basic_auth"));
}

#[rstest]
#[tokio::test]
async fn test_additional_alertmanager_configs(mut test_prometheus: Prometheus) {
    test_prometheus.spec.additional_alert_manager_configs = Some(secret_selector("extra-am", "am.yaml"));
    let secret = test_secret("extra-am", &[("am.yaml", "- static_configs:\n  - targets: [am:9093]\n")]);
    let assets = load_assets(&test_prometheus, vec![secret]).await;

    let cfg = render(&test_prometheus, &ConfigInputs::default(), &assets);
    let ams = cfg["alerting"]["alertmanagers"].as_sequence().unwrap();
    assert_len_eq_x!(&ams, 1);
    assert_eq!(ams[0]["static_configs"][0]["targets"], Value::from(vec!["am:9093"]));
}

#[rstest]
fn test_remote_write(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.remote_write = Some(vec![RemoteWriteSpec {
        name: Some("primary".into()),
        message_version: Some("V2".into()),
        send_exemplars: Some(true),
        headers: Some(BTreeMap::from([("X-Scope-OrgID".into(), "tenant-1".into())])),
        write_relabel_configs: Some(vec![relabel::drop_matching(&["__name__"], "go_.*")]),
        queue_config: Some(QueueConfig {
            capacity: Some(2500),
            retry_on_rate_limit: Some(true),
            ..Default::default()
        }),
        metadata_config: Some(MetadataConfig { send: Some(false), ..Default::default() }),
        ..remote_write("https://remote.example.com/write")
    }]);
    let cfg = render(&test_prometheus, &ConfigInputs::default(), &Assets::default());

    let rw = &remote_writes(&cfg)[0];
    assert_eq!(rw["url"], Value::from("https://remote.example.com/write"));
    assert_eq!(rw["name"], Value::from("primary"));
    assert_eq!(rw["protobuf_message"], Value::from("io.prometheus.write.v2.Request"));
    assert_eq!(rw["send_exemplars"], Value::from(true));
    assert_eq!(rw["headers"]["X-Scope-OrgID"], Value::from("tenant-1"));
    assert_eq!(rw["write_relabel_configs"][0]["action"], Value::from("drop"));
    assert_eq!(rw["queue_config"]["capacity"], Value::from(2500));
    assert_eq!(rw["queue_config"]["retry_on_http_429"], Value::from(true));
    assert_eq!(rw["metadata_config"]["send"], Value::from(false));
}

#[rstest]
#[case::too_old("v2.22.0", false, false)]
#[case::metadata_only("v2.23.0", true, false)]
#[case::headers("v2.25.0", true, true)]
fn test_remote_write_gates(
    mut test_prometheus: Prometheus,
    #[case] version: &str,
    #[case] metadata: bool,
    #[case] headers: bool,
) {
    test_prometheus.spec.common.remote_write = Some(vec![RemoteWriteSpec {
        headers: Some(BTreeMap::from([("X-Tenant".into(), "a".into())])),
        metadata_config: Some(MetadataConfig { send: Some(true), ..Default::default() }),
        ..remote_write("http://remote")
    }]);
    let prom = with_version(test_prometheus, version);
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    let rw = remote_writes(&cfg)[0].as_mapping().unwrap().clone();
    assert_eq!(rw.contains_key("metadata_config"), metadata);
    assert_eq!(rw.contains_key("headers"), headers);
}

#[rstest]
#[traced_test]
fn test_remote_write_max_retries_dropped(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.remote_write = Some(vec![RemoteWriteSpec {
        queue_config: Some(QueueConfig { max_retries: Some(5), ..Default::default() }),
        ..remote_write("http://remote")
    }]);
    let cfg = render(&test_prometheus, &ConfigInputs::default(), &Assets::default());

    let queue = remote_writes(&cfg)[0]["queue_config"].as_mapping().unwrap().clone();
    assert!(!queue.contains_key("max_retries"));
    assert!(logs_contain("queueConfig.maxRetries is no longer supported"));
}

#[rstest]
#[tokio::test]
async fn test_remote_write_credentials(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.remote_write = Some(vec![RemoteWriteSpec {
        sigv4: Some(Sigv4 {
            region: Some("us-east-1".into()),
            access_key: Some(secret_selector(TEST_SECRET, "access")),
            secret_key: Some(secret_selector(TEST_SECRET, "secret")),
            ..Default::default()
        }),
        authorization: Some(Authorization {
            safe: SafeAuthorization { type_: None, credentials: Some(secret_selector(TEST_SECRET, "token")) },
            credentials_file: None,
        }),
        ..remote_write("http://remote")
    }]);
    let secret = test_secret(TEST_SECRET, &[("access", "AKIA"), ("secret", "shh"), ("token", "abc")]);
    let assets = load_assets(&test_prometheus, vec![secret]).await;

    let cfg = render(&test_prometheus, &ConfigInputs::default(), &assets);
    let rw = &remote_writes(&cfg)[0];
    assert_eq!(rw["sigv4"]["region"], Value::from("us-east-1"));
    assert_eq!(rw["sigv4"]["access_key"], Value::from("AKIA"));
    assert_eq!(rw["sigv4"]["secret_key"], Value::from("shh"));
    assert_eq!(rw["authorization"]["type"], Value::from("Bearer"));
    assert_eq!(rw["authorization"]["credentials"], Value::from("abc"));
}

#[rstest]
#[tokio::test]
async fn test_load_workload_assets_missing_secret(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.remote_write = Some(vec![RemoteWriteSpec {
        basic_auth: Some(BasicAuth {
            username: Some(secret_selector("missing", "user")),
            password: Some(secret_selector("missing", "pass")),
        }),
        ..remote_write("http://remote")
    }]);

    let mut store = AssetStore::new(InMemorySecretSource::default());
    let err = load_workload_assets(&test_prometheus, &mut store).await.unwrap_err();
    assert_contains!(format!("{err:#}"), "remoteWrite[0]");
}

#[rstest]
fn test_remote_read(mut test_prometheus: Prometheus) {
    test_prometheus.spec.remote_read = Some(vec![RemoteReadSpec {
        url: "http://remote/read".into(),
        read_recent: Some(true),
        required_matchers: Some(BTreeMap::from([("job".into(), "api".into())])),
        filter_external_labels: Some(false),
        ..Default::default()
    }]);
    let cfg = render(&test_prometheus, &ConfigInputs::default(), &Assets::default());

    let rr = &cfg["remote_read"][0];
    assert_eq!(rr["url"], Value::from("http://remote/read"));
    assert_eq!(rr["read_recent"], Value::from(true));
    assert_eq!(rr["required_matchers"]["job"], Value::from("api"));
    assert_eq!(rr["filter_external_labels"], Value::from(false));
}

#[rstest]
#[case::old("v2.38.0", false)]
#[case::new("v2.39.0", true)]
fn test_storage(mut test_prometheus: Prometheus, #[case] version: &str, #[case] tsdb: bool) {
    test_prometheus.spec.common.tsdb = Some(TSDBSpec { out_of_order_time_window: Some("1h".into()) });
    test_prometheus.spec.exemplars = Some(Exemplars { max_size: Some(100000) });
    let prom = with_version(test_prometheus, version);
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    let storage = cfg["storage"].as_mapping().unwrap();
    assert_eq!(storage["exemplars"]["max_exemplars"], Value::from(100000));
    assert_eq!(storage.contains_key("tsdb"), tsdb);
}

#[rstest]
fn test_no_storage(test_prometheus: Prometheus) {
    let cfg = render(&test_prometheus, &ConfigInputs::default(), &Assets::default());
    assert!(!cfg.contains_key("storage"));
    assert!(!cfg.contains_key("remote_write"));
    assert!(!cfg.contains_key("remote_read"));
}

#[rstest]
fn test_tracing(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.tracing_config = Some(PrometheusTracingConfig {
        endpoint: "otel-collector:4317".into(),
        sampling_fraction: Some("0.1".into()),
        insecure: Some(true),
        ..Default::default()
    });
    let cfg = render(&test_prometheus, &ConfigInputs::default(), &Assets::default());

    assert_eq!(cfg["tracing"]["endpoint"], Value::from("otel-collector:4317"));
    assert_eq!(cfg["tracing"]["sampling_fraction"], Value::from(0.1));
    assert_eq!(cfg["tracing"]["insecure"], Value::from(true));
}

#[rstest]
#[traced_test]
fn test_tracing_unsupported(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.tracing_config =
        Some(PrometheusTracingConfig { endpoint: "otel-collector:4317".into(), ..Default::default() });
    let prom = with_version(test_prometheus, "v2.41.0");
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    assert!(!cfg.contains_key("tracing"));
    assert!(logs_contain("tracing configuration requires Prometheus >= 2.42.0"));
}

#[rstest]
#[case::old("v2.54.0", false, false)]
#[case::otlp_only("v2.55.0", true, false)]
#[case::translation("v3.0.0", true, true)]
fn test_otlp(
    mut test_prometheus: Prometheus,
    #[case] version: &str,
    #[case] present: bool,
    #[case] translation: bool,
) {
    test_prometheus.spec.common.otlp = Some(OTLPConfig {
        promote_resource_attributes: Some(vec!["service.name".into()]),
        translation_strategy: Some("NoUTF8EscapingWithSuffixes".into()),
        ..Default::default()
    });
    let prom = with_version(test_prometheus, version);
    let cfg = render(&prom, &ConfigInputs::default(), &Assets::default());

    assert_eq!(cfg.contains_key("otlp"), present);
    if present {
        let otlp = cfg["otlp"].as_mapping().unwrap();
        assert_eq!(otlp["promote_resource_attributes"], Value::from(vec!["service.name"]));
        assert_eq!(otlp.contains_key("translation_strategy"), translation);
    }
}

#[rstest]
fn test_agent_remote_write(mut test_prometheus: Prometheus) {
    test_prometheus.spec.common.remote_write = Some(vec![remote_write("http://remote")]);
    let agent = PrometheusAgent {
        metadata: test_prometheus.metadata.clone(),
        spec: PrometheusAgentSpec { common: test_prometheus.spec.common.clone() },
    };
    let cfg = render(&agent, &ConfigInputs::default(), &Assets::default());

    assert_eq!(remote_writes(&cfg)[0]["url"], Value::from("http://remote"));
    assert!(!cfg.contains_key("alerting"));
    assert!(!cfg.contains_key("remote_read"));
}
