use httpmock::Method::PATCH;
use k8s_openapi::chrono::DateTime;
use serde_json::Value;

use super::*;
use crate::assets::InMemorySecretSource;
use crate::selector::{
    ResourceSelector,
    list_from,
};

const SM_STATUS_PATH: &str = "/apis/monitoring.coreos.com/v1/namespaces/default/servicemonitors";

fn accepted(status: &str, message: Option<&str>, ts: i64) -> ConfigResourceCondition {
    ConfigResourceCondition {
        type_: ACCEPTED_CONDITION.into(),
        status: status.into(),
        last_transition_time: DateTime::from_timestamp(ts, 0).map(metav1::Time),
        message: message.map(String::from),
        observed_generation: Some(1),
        ..Default::default()
    }
}

fn binding(name: &str, conditions: Vec<ConfigResourceCondition>) -> WorkloadBinding {
    WorkloadBinding {
        group: MONITORING_GROUP.into(),
        resource: "prometheuses".into(),
        name: name.into(),
        namespace: TEST_NAMESPACE.into(),
        conditions,
    }
}

fn with_bindings(mut sm: ServiceMonitor, bindings: Vec<WorkloadBinding>) -> ServiceMonitor {
    sm.status = Some(ConfigResourceStatus { bindings });
    sm
}

fn test_ops(i: usize) -> Vec<Value> {
    vec![
        json!({"op": "test", "path": format!("/status/bindings/{i}/name"), "value": TEST_PROMETHEUS}),
        json!({"op": "test", "path": format!("/status/bindings/{i}/namespace"), "value": TEST_NAMESPACE}),
        json!({"op": "test", "path": format!("/status/bindings/{i}/resource"), "value": "prometheuses"}),
        json!({"op": "test", "path": format!("/status/bindings/{i}/group"), "value": MONITORING_GROUP}),
    ]
}

fn syncer(prom: &Prometheus) -> (MockServerBuilder, ConfigResourceSyncer) {
    let (fake_apiserver, client) = make_fake_apiserver();
    (fake_apiserver, ConfigResourceSyncer::new(prom, client))
}

#[rstest]
#[tokio::test]
async fn test_binding_index(test_prometheus: Prometheus) {
    let (_, syncer) = syncer(&test_prometheus);
    let other_resource = WorkloadBinding { resource: "prometheusagents".into(), ..binding(TEST_PROMETHEUS, vec![]) };
    let bindings = vec![binding("other", vec![]), other_resource, binding(TEST_PROMETHEUS, vec![])];

    assert_eq!(syncer.binding_index(&bindings), Some(2));
    assert_none!(syncer.binding_index(&bindings[..2]));
}

#[rstest]
#[tokio::test]
async fn test_update_binding_patch_appends(test_prometheus: Prometheus) {
    let (_, syncer) = syncer(&test_prometheus);
    let conditions = vec![accepted(CONDITION_TRUE, None, 1000)];
    let bindings = vec![binding("other", vec![])];

    let patch = syncer.update_binding_patch(&bindings, conditions.clone()).unwrap();
    assert_eq!(
        serde_json::to_value(patch).unwrap(),
        json!([{
            "op": "add",
            "path": "/status/bindings/-",
            "value": binding(TEST_PROMETHEUS, conditions),
        }])
    );
}

#[rstest]
#[tokio::test]
async fn test_update_binding_patch_unchanged(test_prometheus: Prometheus) {
    let (_, syncer) = syncer(&test_prometheus);
    let bindings = vec![binding(TEST_PROMETHEUS, vec![accepted(CONDITION_TRUE, None, 1000)])];

    assert_none!(syncer.update_binding_patch(&bindings, vec![accepted(CONDITION_TRUE, None, 5000)]));
}

#[rstest]
#[tokio::test]
async fn test_update_binding_patch_replaces_conditions(test_prometheus: Prometheus) {
    let (_, syncer) = syncer(&test_prometheus);
    let bindings = vec![
        binding("other", vec![]),
        binding(TEST_PROMETHEUS, vec![accepted(CONDITION_TRUE, None, 1000)]),
    ];
    let desired = vec![accepted(CONDITION_FALSE, Some("bad relabeling"), 5000)];

    let patch = syncer.update_binding_patch(&bindings, desired.clone()).unwrap();

    let mut expected = test_ops(1);
    expected.push(json!({"op": "replace", "path": "/status/bindings/1/conditions", "value": desired}));
    assert_eq!(serde_json::to_value(patch).unwrap(), Value::Array(expected));
}

#[rstest]
#[tokio::test]
async fn test_update_binding_patch_keeps_transition_time(test_prometheus: Prometheus) {
    let (_, syncer) = syncer(&test_prometheus);
    let bindings = vec![binding(TEST_PROMETHEUS, vec![accepted(CONDITION_FALSE, Some("old"), 1000)])];

    let patch = syncer
        .update_binding_patch(&bindings, vec![accepted(CONDITION_FALSE, Some("new"), 5000)])
        .unwrap();

    let ops = serde_json::to_value(patch).unwrap();
    assert_eq!(ops[4]["value"], json!([accepted(CONDITION_FALSE, Some("new"), 1000)]));
}

#[rstest]
#[tokio::test]
async fn test_remove_binding_patch(test_prometheus: Prometheus) {
    let (_, syncer) = syncer(&test_prometheus);
    let bindings = vec![binding("other", vec![]), binding(TEST_PROMETHEUS, vec![])];

    assert_none!(syncer.remove_binding_patch(&bindings[..1]));

    let patch = syncer.remove_binding_patch(&bindings).unwrap();
    let mut expected = test_ops(1);
    expected.push(json!({"op": "remove", "path": "/status/bindings/1"}));
    assert_eq!(serde_json::to_value(patch).unwrap(), Value::Array(expected));
}

#[rstest]
#[tokio::test]
async fn test_update_binding_initializes_status(test_prometheus: Prometheus, test_service_monitor: ServiceMonitor) {
    let (mut fake_apiserver, syncer) = syncer(&test_prometheus);
    let conditions = vec![accepted(CONDITION_TRUE, None, 1000)];
    let expected = json!([{
        "op": "add",
        "path": "/status",
        "value": {"bindings": [binding(TEST_PROMETHEUS, conditions.clone())]},
    }]);
    let response = serde_json::to_value(&test_service_monitor).unwrap();
    fake_apiserver
        .handle(move |when, then| {
            when.method(PATCH)
                .path(format!("{SM_STATUS_PATH}/{TEST_SERVICE_MONITOR}/status"))
                .query_param("fieldManager", PROMETHEUS_OPERATOR_FIELD_MANAGER)
                .json_body(expected.clone());
            then.json_body(response.clone());
        })
        .build();

    syncer.update_binding(&test_service_monitor, conditions).await.unwrap();
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_update_binding_noop(test_prometheus: Prometheus, test_service_monitor: ServiceMonitor) {
    let (mut fake_apiserver, syncer) = syncer(&test_prometheus);
    let sm = with_bindings(test_service_monitor, vec![binding(TEST_PROMETHEUS, vec![accepted(CONDITION_TRUE, None, 1)])]);
    fake_apiserver.build();

    // Nothing is registered on the fake apiserver, so any request would fail the call
    syncer.update_binding(&sm, vec![accepted(CONDITION_TRUE, None, 2)]).await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_cleanup_bindings(test_prometheus: Prometheus) {
    let (mut fake_apiserver, syncer) = syncer(&test_prometheus);

    let ours = vec![binding(TEST_PROMETHEUS, vec![])];
    let mut stale = with_bindings(test_service_monitor("stale"), ours.clone());
    stale.metadata.labels = None;
    let objects = vec![
        with_bindings(test_service_monitor("selected"), ours.clone()),
        stale.clone(),
        test_service_monitor("unbound"),
    ];

    let mut expected = test_ops(0);
    expected.push(json!({"op": "remove", "path": "/status/bindings/0"}));
    let response = serde_json::to_value(&stale).unwrap();
    fake_apiserver
        .handle(move |when, then| {
            when.method(PATCH)
                .path(format!("{SM_STATUS_PATH}/stale/status"))
                .json_body(Value::Array(expected.clone()));
            then.json_body(response.clone());
        })
        .build();

    let mut store = AssetStore::new(InMemorySecretSource::new(vec![], vec![]));
    let namespaces: Vec<corev1::Namespace> = vec![];
    let mut selector = ResourceSelector::new(&test_prometheus, &mut store, &namespaces).unwrap();
    let selection = selector.select_service_monitors(list_from(&objects)).await.unwrap();
    assert_eq!(selection.keys().collect::<Vec<_>>(), vec!["default/selected", "default/unbound"]);

    syncer.cleanup_bindings(&objects, &selection).await.unwrap();
    fake_apiserver.assert();
}
