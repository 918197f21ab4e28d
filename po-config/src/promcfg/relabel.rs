use lazy_static::lazy_static;
use po_core::errors::*;

use crate::prelude::*;
use crate::validation::{
    ACTION_DROP,
    ACTION_HASHMOD,
    ACTION_KEEP,
};

lazy_static! {
    static ref INVALID_LABEL_CHARS_RE: Regex = Regex::new(r"[^a-zA-Z0-9_]").unwrap();
}

pub(super) const TMP_JOB_NAME_LABEL: &str = "__tmp_prometheus_job_name";
const TMP_HASH_LABEL: &str = "__tmp_hash";

/// Kubernetes label names as they appear in `__meta_kubernetes_*_label_<name>` discovery labels.
pub(super) fn sanitize_label_name(name: &str) -> String {
    INVALID_LABEL_CHARS_RE.replace_all(name, "_").into_owned()
}

fn labels(sources: &[&str]) -> Option<Vec<String>> {
    Some(sources.iter().map(|s| s.to_string()).collect())
}

pub(super) fn keep(sources: &[&str], regex: impl Into<String>) -> RelabelConfig {
    RelabelConfig {
        source_labels: labels(sources),
        regex: Some(regex.into()),
        action: Some(ACTION_KEEP.into()),
        ..Default::default()
    }
}

pub(super) fn drop_matching(sources: &[&str], regex: impl Into<String>) -> RelabelConfig {
    RelabelConfig {
        source_labels: labels(sources),
        regex: Some(regex.into()),
        action: Some(ACTION_DROP.into()),
        ..Default::default()
    }
}

pub(super) fn copy_to(sources: &[&str], target: &str) -> RelabelConfig {
    RelabelConfig {
        source_labels: labels(sources),
        target_label: Some(target.into()),
        ..Default::default()
    }
}

/// Copies a label only when it is set, so that an empty source doesn't clear the target.
pub(super) fn copy_if_set(source: &str, target: &str) -> RelabelConfig {
    RelabelConfig {
        source_labels: labels(&[source]),
        target_label: Some(target.into()),
        regex: Some("(.+)".into()),
        replacement: Some("${1}".into()),
        ..Default::default()
    }
}

pub(super) fn set_label(target: &str, replacement: impl Into<String>) -> RelabelConfig {
    RelabelConfig {
        target_label: Some(target.into()),
        replacement: Some(replacement.into()),
        ..Default::default()
    }
}

pub(super) fn target_kind(kind_label: &str, name_label: &str, kind: &str, target: &str) -> RelabelConfig {
    RelabelConfig {
        source_labels: labels(&[kind_label, name_label]),
        separator: Some(";".into()),
        regex: Some(format!("{kind};(.*)")),
        replacement: Some("${1}".into()),
        target_label: Some(target.into()),
        ..Default::default()
    }
}

pub(super) fn job_name_init() -> RelabelConfig {
    copy_to(&["job"], TMP_JOB_NAME_LABEL)
}

/// Keep and drop rules equivalent to a label selector, evaluated against the discovery labels
/// `<prefix>_label_<name>` and `<prefix>_labelpresent_<name>`.
pub(super) fn selector_rules(prefix: &str, selector: &metav1::LabelSelector) -> Vec<RelabelConfig> {
    let mut rules = vec![];
    for (k, v) in selector.match_labels.iter().flatten() {
        let name = sanitize_label_name(k);
        let value_label = format!("{prefix}_label_{name}");
        let present_label = format!("{prefix}_labelpresent_{name}");
        rules.push(keep(&[value_label.as_str(), present_label.as_str()], format!("({v});true")));
    }

    for expr in selector.match_expressions.iter().flatten() {
        let name = sanitize_label_name(&expr.key);
        let value_label = format!("{prefix}_label_{name}");
        let present_label = format!("{prefix}_labelpresent_{name}");
        let values = expr.values.as_deref().unwrap_or_default().join("|");
        match expr.operator.as_str() {
            "In" => rules.push(keep(&[value_label.as_str(), present_label.as_str()], format!("({values});true"))),
            "NotIn" => rules.push(drop_matching(
                &[value_label.as_str(), present_label.as_str()],
                format!("({values});true"),
            )),
            "Exists" => rules.push(keep(&[present_label.as_str()], "true")),
            "DoesNotExist" => rules.push(drop_matching(&[present_label.as_str()], "true")),
            _ => (),
        }
    }
    rules
}

/// Each shard keeps the targets whose address hashes to its own index.
pub(super) fn sharding_rules(shards: Option<i32>) -> Vec<RelabelConfig> {
    let shards = shards.filter(|s| *s > 1).unwrap_or(1) as u64;
    vec![
        RelabelConfig {
            source_labels: labels(&["__address__"]),
            target_label: Some(TMP_HASH_LABEL.into()),
            modulus: Some(shards),
            action: Some(ACTION_HASHMOD.into()),
            ..Default::default()
        },
        keep(&[TMP_HASH_LABEL], SHARD_PLACEHOLDER),
    ]
}

/// Drops the user rules that would overwrite the enforced namespace label.
pub(super) fn without_target<'a>(
    rcs: Option<&'a [RelabelConfig]>,
    enforced_label: Option<&'a str>,
) -> impl Iterator<Item = &'a RelabelConfig> {
    rcs.unwrap_or_default().iter().filter(move |rc| {
        enforced_label.is_none_or(|label| rc.target_label.as_deref() != Some(label))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assertables::*;
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::dots("app.kubernetes.io/name", "app_kubernetes_io_name")]
    #[case::dashes("my-label", "my_label")]
    #[case::clean("group", "group")]
    fn test_sanitize_label_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_label_name(input), expected);
    }

    #[rstest]
    fn test_selector_rules() {
        let selector = metav1::LabelSelector {
            match_labels: Some(BTreeMap::from([("app.kubernetes.io/name".into(), "web".into())])),
            match_expressions: Some(vec![
                metav1::LabelSelectorRequirement {
                    key: "tier".into(),
                    operator: "NotIn".into(),
                    values: Some(vec!["cache".into(), "db".into()]),
                },
                metav1::LabelSelectorRequirement { key: "canary".into(), operator: "DoesNotExist".into(), values: None },
            ]),
        };

        let rules = selector_rules("__meta_kubernetes_service", &selector);
        assert_len_eq_x!(&rules, 3);
        assert_eq!(
            rules[0],
            keep(
                &[
                    "__meta_kubernetes_service_label_app_kubernetes_io_name",
                    "__meta_kubernetes_service_labelpresent_app_kubernetes_io_name"
                ],
                "(web);true"
            )
        );
        assert_eq!(rules[1].action.as_deref(), Some("drop"));
        assert_eq!(rules[1].regex.as_deref(), Some("(cache|db);true"));
        assert_eq!(rules[2], drop_matching(&["__meta_kubernetes_service_labelpresent_canary"], "true"));
    }

    #[rstest]
    #[case::unset(None, 1)]
    #[case::zero(Some(0), 1)]
    #[case::three(Some(3), 3)]
    fn test_sharding_rules(#[case] shards: Option<i32>, #[case] modulus: u64) {
        let rules = sharding_rules(shards);
        assert_eq!(rules[0].modulus, Some(modulus));
        assert_eq!(rules[1].regex.as_deref(), Some("$(SHARD)"));
    }

    #[rstest]
    fn test_without_target() {
        let rcs = vec![set_label("namespace", "evil"), set_label("team", "a")];
        let kept: Vec<_> = without_target(Some(rcs.as_slice()), Some("namespace")).collect();
        assert_eq!(kept, vec![&rcs[1]]);
        assert_len_eq_x!(without_target(Some(rcs.as_slice()), None).collect::<Vec<_>>(), 2);
    }
}
