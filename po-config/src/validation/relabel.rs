use lazy_static::lazy_static;
use po_core::errors::*;

use super::ValidationError;
use crate::prelude::*;

lazy_static! {
    static ref RELABEL_TARGET_RE: Regex = Regex::new(r"^(?:(?:[a-zA-Z_]|\$(?:\{\w+\}|\w+))+\w*)+$").unwrap();
    static ref LABEL_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

pub const DEFAULT_RELABEL_REGEX: &str = "(.*)";
pub const DEFAULT_RELABEL_SEPARATOR: &str = ";";
pub const DEFAULT_RELABEL_REPLACEMENT: &str = "$1";

pub const ACTION_REPLACE: &str = "replace";
pub const ACTION_KEEP: &str = "keep";
pub const ACTION_DROP: &str = "drop";
pub const ACTION_HASHMOD: &str = "hashmod";
pub const ACTION_LABELMAP: &str = "labelmap";
pub const ACTION_LABELDROP: &str = "labeldrop";
pub const ACTION_LABELKEEP: &str = "labelkeep";
pub const ACTION_LOWERCASE: &str = "lowercase";
pub const ACTION_UPPERCASE: &str = "uppercase";
pub const ACTION_KEEPEQUAL: &str = "keepequal";
pub const ACTION_DROPEQUAL: &str = "dropequal";

pub fn is_valid_label_name(name: &str) -> bool {
    LABEL_NAME_RE.is_match(name)
}

/// Validates relabeling rules against the grammar Prometheus accepts for each action.
pub struct LabelConfigValidator<'a> {
    version: &'a PrometheusVersion,
}

impl<'a> LabelConfigValidator<'a> {
    pub fn new(version: &'a PrometheusVersion) -> LabelConfigValidator<'a> {
        LabelConfigValidator { version }
    }

    pub fn validate(&self, rcs: Option<&[RelabelConfig]>) -> EmptyResult {
        for (i, rc) in rcs.unwrap_or_default().iter().enumerate() {
            self.validate_one(rc).with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    pub fn validate_one(&self, rc: &RelabelConfig) -> EmptyResult {
        let raw_action = rc.action.as_deref().filter(|a| !a.is_empty()).unwrap_or(ACTION_REPLACE);
        let action = raw_action.to_lowercase();
        let action = action.as_str();
        let target = rc.target_label.as_deref().unwrap_or_default();
        let modulus = rc.modulus.unwrap_or_default();
        let replacement_set = rc.replacement.as_deref().is_some_and(|r| r != DEFAULT_RELABEL_REPLACEMENT);
        let separator_set = rc.separator.as_deref().is_some_and(|s| s != DEFAULT_RELABEL_SEPARATOR);

        let case_action = matches!(action, ACTION_LOWERCASE | ACTION_UPPERCASE);
        let equal_action = matches!(action, ACTION_KEEPEQUAL | ACTION_DROPEQUAL);

        if case_action && !self.version.supports(Feature::RelabelCaseActions) {
            bail!(ValidationError::unsupported_feature(&format!(
                "{raw_action} relabel action is only supported from Prometheus version 2.36.0"
            )));
        }
        if equal_action && !self.version.supports(Feature::RelabelEqualActions) {
            bail!(ValidationError::unsupported_feature(&format!(
                "{raw_action} relabel action is only supported from Prometheus version 2.41.0"
            )));
        }

        let regex = rc.regex.as_deref().unwrap_or_default();
        if let Err(err) = Regex::new(&format!("^(?:{regex})$")) {
            bail!(ValidationError::invalid_relabel_config(&format!(
                "invalid regex {regex} for relabel configuration: {err}"
            )));
        }

        if action == ACTION_HASHMOD && modulus == 0 {
            bail!(ValidationError::invalid_relabel_config("relabel configuration for hashmod requires non-zero modulus"));
        }

        if (action == ACTION_REPLACE || action == ACTION_HASHMOD || case_action || equal_action) && target.is_empty() {
            bail!(ValidationError::invalid_relabel_config(&format!(
                "relabel configuration for {raw_action} action needs targetLabel value"
            )));
        }

        if (action == ACTION_REPLACE || case_action || equal_action) && !RELABEL_TARGET_RE.is_match(target) {
            bail!(ValidationError::invalid_relabel_config(&format!(
                "{target:?} is invalid 'target_label' for {raw_action} action"
            )));
        }

        if (case_action || equal_action) && replacement_set {
            bail!(ValidationError::invalid_relabel_config(&format!(
                "'replacement' can not be set for {raw_action} action"
            )));
        }

        if action == ACTION_LABELMAP
            && let Some(replacement) = rc.replacement.as_deref()
            && !RELABEL_TARGET_RE.is_match(replacement)
        {
            bail!(ValidationError::invalid_relabel_config(&format!(
                "{replacement:?} is invalid 'replacement' for {raw_action} action"
            )));
        }

        if action == ACTION_HASHMOD && !is_valid_label_name(target) {
            bail!(ValidationError::invalid_relabel_config(&format!(
                "{target:?} is invalid 'target_label' for {raw_action} action"
            )));
        }

        if equal_action {
            let regex_set = !regex.is_empty() && regex != DEFAULT_RELABEL_REGEX;
            if regex_set || modulus != 0 || separator_set || replacement_set {
                bail!(ValidationError::invalid_relabel_config(&format!(
                    "{raw_action} action requires only 'source_labels' and `target_label`, and no other fields"
                )));
            }
        }

        if matches!(action, ACTION_LABELDROP | ACTION_LABELKEEP) {
            let has_sources = rc.source_labels.as_ref().is_some_and(|s| !s.is_empty());
            if has_sources || !target.is_empty() || modulus != 0 || separator_set || replacement_set {
                bail!(ValidationError::invalid_relabel_config(&format!(
                    "{raw_action} action requires only 'regex', and no other fields"
                )));
            }
        }

        Ok(())
    }
}
