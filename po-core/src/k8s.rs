use std::collections::BTreeMap;

use kube::Resource;

use crate::errors::*;
use crate::prelude::*;

err_impl! {KubernetesError,
    #[error("malformed label selector: {0:?}")]
    MalformedLabelSelector(metav1::LabelSelectorRequirement),
}

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
    fn matches(&self, sel: &metav1::LabelSelector) -> anyhow::Result<bool>;
}

impl<T: Resource> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any().clone(),
        }
    }

    fn matches(&self, sel: &metav1::LabelSelector) -> anyhow::Result<bool> {
        labels_match(self.labels(), sel)
    }
}

pub fn split_namespaced_name(name: &str) -> (String, String) {
    match name.split_once('/') {
        Some((namespace, name)) => (namespace.into(), name.into()),
        None => ("".into(), name.into()),
    }
}

pub fn labels_match(labels: &BTreeMap<String, String>, sel: &metav1::LabelSelector) -> anyhow::Result<bool> {
    if let Some(exprs) = &sel.match_expressions {
        for expr in exprs {
            if !label_expr_match(labels, expr)? {
                return Ok(false);
            }
        }
    }

    if let Some(match_labels) = &sel.match_labels {
        for (k, v) in match_labels {
            if labels.get(k) != Some(v) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Rejects selectors whose expressions could never be evaluated, without matching any object.
pub fn validate_label_selector(sel: &metav1::LabelSelector) -> EmptyResult {
    for expr in sel.match_expressions.iter().flatten() {
        let has_values = expr.values.as_ref().is_some_and(|v| !v.is_empty());
        let valid = match expr.operator.as_str() {
            OPERATOR_IN | OPERATOR_NOT_IN => has_values,
            OPERATOR_EXISTS | OPERATOR_DOES_NOT_EXIST => !has_values,
            _ => false,
        };
        ensure!(valid, KubernetesError::malformed_label_selector(expr));
    }
    Ok(())
}

// The meanings of these operators is explained here:
// https://kubernetes.io/docs/concepts/overview/working-with-objects/labels/#set-based-requirement
pub const OPERATOR_IN: &str = "In";
pub const OPERATOR_NOT_IN: &str = "NotIn";
pub const OPERATOR_EXISTS: &str = "Exists";
pub const OPERATOR_DOES_NOT_EXIST: &str = "DoesNotExist";

fn label_expr_match(
    obj_labels: &BTreeMap<String, String>,
    expr: &metav1::LabelSelectorRequirement,
) -> anyhow::Result<bool> {
    // LabelSelectorRequirement is considered invalid if the Operator is "In" or NotIn"
    // and there are no values; conversely for "Exists" and "DoesNotExist".
    match expr.operator.as_str() {
        OPERATOR_IN => match obj_labels.get(&expr.key) {
            Some(v) => match &expr.values {
                Some(values) if !values.is_empty() => Ok(values.contains(v)),
                _ => bail!(KubernetesError::malformed_label_selector(expr)),
            },
            None => Ok(false),
        },
        OPERATOR_NOT_IN => match obj_labels.get(&expr.key) {
            Some(v) => match &expr.values {
                Some(values) if !values.is_empty() => Ok(!values.contains(v)),
                _ => bail!(KubernetesError::malformed_label_selector(expr)),
            },
            None => Ok(true),
        },
        OPERATOR_EXISTS => match &expr.values {
            Some(values) if !values.is_empty() => bail!(KubernetesError::malformed_label_selector(expr)),
            _ => Ok(obj_labels.contains_key(&expr.key)),
        },
        OPERATOR_DOES_NOT_EXIST => match &expr.values {
            Some(values) if !values.is_empty() => {
                bail!(KubernetesError::malformed_label_selector(expr));
            },
            _ => Ok(!obj_labels.contains_key(&expr.key)),
        },
        _ => bail!(KubernetesError::malformed_label_selector(expr)),
    }
}
