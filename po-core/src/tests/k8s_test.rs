use assertables::*;

use super::*;
use crate::k8s::*;
use crate::macros::*;
use crate::prelude::*;

#[fixture]
fn test_namespace() -> corev1::Namespace {
    corev1::Namespace {
        metadata: metav1::ObjectMeta {
            name: Some("monitoring".into()),
            labels: klabel!("team" => "frontend", KUBERNETES_IO_METADATA_NAME_KEY => "monitoring"),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn build_label_sel(key: &str, op: &str, value: Option<&str>) -> metav1::LabelSelector {
    metav1::LabelSelector {
        match_expressions: Some(vec![metav1::LabelSelectorRequirement {
            key: key.into(),
            operator: op.into(),
            values: value.map(|s| vec![s.into()]),
        }]),
        ..Default::default()
    }
}

#[rstest]
#[case::op_in(OPERATOR_IN, true)]
#[case::op_not_in(OPERATOR_NOT_IN, false)]
fn test_label_expr_match(test_namespace: corev1::Namespace, #[case] op: &str, #[case] expected: bool) {
    let sel = build_label_sel("team", op, Some("frontend"));
    assert_eq!(test_namespace.matches(&sel).unwrap(), expected);
}

#[rstest]
#[case::op_in(OPERATOR_IN)]
#[case::op_not_in(OPERATOR_NOT_IN)]
fn test_label_expr_no_values(test_namespace: corev1::Namespace, #[case] op: &str) {
    let sel = build_label_sel("team", op, None);
    let err = test_namespace.matches(&sel).unwrap_err().downcast::<KubernetesError>().unwrap();
    assert!(matches!(err, KubernetesError::MalformedLabelSelector(_)));
}

#[rstest]
#[case::exists(OPERATOR_EXISTS, true)]
#[case::does_not_exist(OPERATOR_DOES_NOT_EXIST, false)]
fn test_label_expr_exists(test_namespace: corev1::Namespace, #[case] op: &str, #[case] expected: bool) {
    let sel = build_label_sel("team", op, None);
    assert_eq!(test_namespace.matches(&sel).unwrap(), expected);
}

#[rstest]
fn test_label_match_labels(test_namespace: corev1::Namespace) {
    let sel = metav1::LabelSelector {
        match_labels: klabel!("team" => "backend"),
        ..Default::default()
    };
    assert!(!test_namespace.matches(&sel).unwrap());
}

#[rstest]
fn test_empty_selector_matches_everything(test_namespace: corev1::Namespace) {
    assert!(test_namespace.matches(&Default::default()).unwrap());
}

#[rstest]
fn test_namespaced_name(test_namespace: corev1::Namespace) {
    assert_eq!(test_namespace.namespaced_name(), "monitoring");
    assert_eq!(split_namespaced_name("default/foo"), ("default".into(), "foo".into()));
    assert_eq!(split_namespaced_name("foo"), ("".into(), "foo".into()));
}

#[rstest]
fn test_klabel_builds_sorted_map() {
    let labels = klabel!("b" => "2", "a" => "1").unwrap();
    assert_eq!(labels.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_len_eq_x!(&labels, 2);
}

#[rstest]
#[case::in_without_values(OPERATOR_IN, None, false)]
#[case::exists_with_values(OPERATOR_EXISTS, Some("x"), false)]
#[case::unknown_operator("Matches", Some("x"), false)]
#[case::valid_in(OPERATOR_IN, Some("x"), true)]
#[case::valid_does_not_exist(OPERATOR_DOES_NOT_EXIST, None, true)]
fn test_validate_label_selector(#[case] op: &str, #[case] value: Option<&str>, #[case] valid: bool) {
    let sel = build_label_sel("missing", op, value);
    assert_eq!(validate_label_selector(&sel).is_ok(), valid);
}
