use lazy_static::lazy_static;
use po_core::errors::*;
use serde_yaml::Mapping;

use super::yaml::*;
use crate::prelude::*;

lazy_static! {
    static ref BYTE_SIZE_RE: Regex = Regex::new(r"^(\d+)(B|KB|KiB|MB|MiB|GB|GiB|TB|TiB|PB|PiB|EB|EiB)?$").unwrap();
}

/// The stricter of a resource's limit and the workload's enforced limit; zero means unlimited on
/// both sides.
pub(super) fn effective_limit(user: Option<u64>, enforced: Option<u64>) -> Option<u64> {
    match (user, enforced) {
        (user, None | Some(0)) => user,
        (None | Some(0), enforced) => enforced,
        (Some(u), Some(e)) => Some(u.min(e)),
    }
}

/// Parses Prometheus byte sizes such as `512KB` or `1GiB`; units are powers of two.
pub(super) fn parse_byte_size(s: &str) -> Option<u64> {
    let caps = BYTE_SIZE_RE.captures(s.trim())?;
    let n: u64 = caps.get(1)?.as_str().parse().ok()?;
    let shift = match caps.get(2).map(|m| m.as_str()) {
        None | Some("B") => 0,
        Some("KB" | "KiB") => 10,
        Some("MB" | "MiB") => 20,
        Some("GB" | "GiB") => 30,
        Some("TB" | "TiB") => 40,
        Some("PB" | "PiB") => 50,
        Some("EB" | "EiB") => 60,
        Some(_) => return None,
    };
    n.checked_mul(1u64 << shift)
}

pub(super) fn effective_body_size_limit(user: Option<&str>, enforced: Option<&str>) -> Option<String> {
    let user = user.filter(|u| !u.is_empty());
    let enforced = enforced.filter(|e| !e.is_empty() && parse_byte_size(e) != Some(0));
    match (user, enforced) {
        (user, None) => user.map(String::from),
        (None, Some(enforced)) => Some(enforced.into()),
        (Some(user), Some(enforced)) => match (parse_byte_size(user), parse_byte_size(enforced)) {
            (Some(u), Some(e)) if u != 0 && u < e => Some(user.into()),
            _ => Some(enforced.into()),
        },
    }
}

/// Emits the per-job limits.  Resources excluded from enforcement keep their own values.
pub(super) fn add_limits(
    cfg: &mut Mapping,
    limits: &ScrapeLimits,
    cpf: &CommonPrometheusFields,
    excluded: bool,
    version: &PrometheusVersion,
) {
    let enforced = |v: Option<u64>| if excluded { None } else { v };

    cfg.set_opt("sample_limit", effective_limit(limits.sample_limit, enforced(cpf.enforced_sample_limit)));
    cfg.set_gated(
        version,
        Feature::TargetLimit,
        "target_limit",
        effective_limit(limits.target_limit, enforced(cpf.enforced_target_limit)),
    );
    cfg.set_gated(
        version,
        Feature::LabelLimits,
        "label_limit",
        effective_limit(limits.label_limit, enforced(cpf.enforced_label_limit)),
    );
    cfg.set_gated(
        version,
        Feature::LabelLimits,
        "label_name_length_limit",
        effective_limit(limits.label_name_length_limit, enforced(cpf.enforced_label_name_length_limit)),
    );
    cfg.set_gated(
        version,
        Feature::LabelLimits,
        "label_value_length_limit",
        effective_limit(limits.label_value_length_limit, enforced(cpf.enforced_label_value_length_limit)),
    );
    cfg.set_gated(
        version,
        Feature::KeepDroppedTargets,
        "keep_dropped_targets",
        effective_limit(limits.keep_dropped_targets, enforced(cpf.enforced_keep_dropped_targets)),
    );

    let enforced_body_size = if excluded { None } else { cpf.enforced_body_size_limit.as_deref() };
    cfg.set_gated(
        version,
        Feature::BodySizeLimit,
        "body_size_limit",
        effective_body_size_limit(limits.body_size_limit.as_deref(), enforced_body_size),
    );
}

/// Workload-wide defaults in the `global` section.
pub(super) fn add_global_limits(cfg: &mut Mapping, limits: &ScrapeLimits, version: &PrometheusVersion) {
    if !version.supports(Feature::GlobalLimits) {
        return;
    }

    cfg.set_opt("sample_limit", limits.sample_limit);
    cfg.set_opt("target_limit", limits.target_limit);
    cfg.set_opt("label_limit", limits.label_limit);
    cfg.set_opt("label_name_length_limit", limits.label_name_length_limit);
    cfg.set_opt("label_value_length_limit", limits.label_value_length_limit);
    cfg.set_gated(version, Feature::KeepDroppedTargets, "keep_dropped_targets", limits.keep_dropped_targets);
    cfg.set_str("body_size_limit", limits.body_size_limit.as_deref());
}

pub(super) fn add_native_histograms(cfg: &mut Mapping, nh: &NativeHistogramConfig, version: &PrometheusVersion) {
    cfg.set_gated(version, Feature::ScrapeClassicHistograms, "scrape_classic_histograms", nh.scrape_classic_histograms);
    cfg.set_gated(
        version,
        Feature::NativeHistogramBucketLimit,
        "native_histogram_bucket_limit",
        nh.native_histogram_bucket_limit,
    );
    cfg.set_gated(
        version,
        Feature::NativeHistogramMinBucketFactor,
        "native_histogram_min_bucket_factor",
        nh.native_histogram_min_bucket_factor.as_deref().map(float_or_string),
    );
    cfg.set_gated(
        version,
        Feature::ConvertClassicHistogramsToNHCB,
        "convert_classic_histograms_to_nhcb",
        nh.convert_classic_histograms_to_nhcb,
    );
}
