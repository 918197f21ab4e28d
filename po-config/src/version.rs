use std::fmt;

use po_core::errors::*;
use semver::Version;
use serde::Serialize;
use serde_yaml::{
    Mapping,
    Value,
};

use crate::prelude::*;

err_impl! {VersionError,
    #[error("failed to parse Prometheus version: {0}")]
    InvalidVersion(String),
}

/// Prometheus features whose availability depends on the Prometheus version.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Feature {
    HonorTimestamps,
    AlertmanagerApiVersion,
    RemoteName,
    DigitalOceanSD,
    DockerSwarmSD,
    TargetLimit,
    RemoteWriteMetadata,
    RemoteWriteHeaders,
    RemoteReadHeaders,
    Sigv4,
    RemoteWriteAuthorization,
    FollowRedirects,
    RetryOnRateLimit,
    AlertmanagerBasicAuth,
    ScalewaySD,
    LabelLimits,
    SendExemplars,
    RemoteWriteOAuth2,
    LightSailSD,
    BodySizeLimit,
    HTTPSD,
    ConsulNamespace,
    LinodeSD,
    ExemplarStorage,
    PuppetDBSD,
    FilterExternalLabels,
    EnableHTTP2,
    TLSMinVersion,
    PodMonitorAttachMetadata,
    AzureSDResourceGroup,
    IonosSD,
    RelabelCaseActions,
    ServiceMonitorAttachMetadata,
    OutOfOrderTimeWindow,
    SendNativeHistograms,
    OVHCloudSD,
    RelabelEqualActions,
    TLSMaxVersion,
    Tracing,
    ProxyExtensions,
    GlobalLimits,
    ConsulPathPrefix,
    AzureAD,
    ScrapeClassicHistograms,
    NativeHistogramBucketLimit,
    KeepDroppedTargets,
    OTLPFeatureFlag,
    TrackTimestampsStaleness,
    AzureADOAuth,
    ScrapeProtocols,
    EnableCompression,
    SampleAgeLimit,
    NativeHistogramMinBucketFactor,
    AlertmanagerAlertRelabelConfigs,
    AzureADSDK,
    AzureSDSDKAuthentication,
    RemoteWriteMessageVersion,
    OTLPConfig,
    FallbackScrapeProtocol,
    OTLPReceiverFlag,
    ConsulFilter,
    OTLPTranslationStrategy,
    ConvertClassicHistogramsToNHCB,
    RoundRobinDNS,
    KeepIdentifyingResourceAttributes,
    OpenStackLoadBalancerRole,
}

// (feature, minimum version inclusive, maximum version exclusive)
const FEATURES: &[(Feature, &str, Option<&str>)] = &[
    (Feature::HonorTimestamps, "2.9.0", None),
    (Feature::AlertmanagerApiVersion, "2.11.0", None),
    (Feature::RemoteName, "2.15.0", None),
    (Feature::DigitalOceanSD, "2.20.0", None),
    (Feature::DockerSwarmSD, "2.20.0", None),
    (Feature::TargetLimit, "2.21.0", None),
    (Feature::RemoteWriteMetadata, "2.23.0", None),
    (Feature::RemoteWriteHeaders, "2.25.0", None),
    (Feature::RemoteReadHeaders, "2.26.0", None),
    (Feature::Sigv4, "2.26.0", None),
    (Feature::RemoteWriteAuthorization, "2.26.0", None),
    (Feature::FollowRedirects, "2.26.0", None),
    (Feature::RetryOnRateLimit, "2.26.0", None),
    (Feature::AlertmanagerBasicAuth, "2.26.0", None),
    (Feature::ScalewaySD, "2.26.0", None),
    (Feature::LabelLimits, "2.27.0", None),
    (Feature::SendExemplars, "2.27.0", None),
    (Feature::RemoteWriteOAuth2, "2.27.0", None),
    (Feature::LightSailSD, "2.27.0", None),
    (Feature::BodySizeLimit, "2.28.0", None),
    (Feature::HTTPSD, "2.28.0", None),
    (Feature::ConsulNamespace, "2.28.0", None),
    (Feature::LinodeSD, "2.28.0", None),
    (Feature::ExemplarStorage, "2.29.0", None),
    (Feature::PuppetDBSD, "2.31.0", None),
    (Feature::FilterExternalLabels, "2.34.0", None),
    (Feature::EnableHTTP2, "2.35.0", None),
    (Feature::TLSMinVersion, "2.35.0", None),
    (Feature::PodMonitorAttachMetadata, "2.35.0", None),
    (Feature::AzureSDResourceGroup, "2.35.0", None),
    (Feature::IonosSD, "2.36.0", None),
    (Feature::RelabelCaseActions, "2.36.0", None),
    (Feature::ServiceMonitorAttachMetadata, "2.37.0", None),
    (Feature::OutOfOrderTimeWindow, "2.39.0", None),
    (Feature::SendNativeHistograms, "2.40.0", None),
    (Feature::OVHCloudSD, "2.40.0", None),
    (Feature::RelabelEqualActions, "2.41.0", None),
    (Feature::TLSMaxVersion, "2.41.0", None),
    (Feature::Tracing, "2.42.0", None),
    (Feature::ProxyExtensions, "2.43.0", None),
    (Feature::GlobalLimits, "2.45.0", None),
    (Feature::ConsulPathPrefix, "2.45.0", None),
    (Feature::AzureAD, "2.45.0", None),
    (Feature::ScrapeClassicHistograms, "2.45.0", None),
    (Feature::NativeHistogramBucketLimit, "2.45.0", None),
    (Feature::KeepDroppedTargets, "2.47.0", None),
    (Feature::OTLPFeatureFlag, "2.47.0", Some("3.0.0")),
    (Feature::TrackTimestampsStaleness, "2.48.0", None),
    (Feature::AzureADOAuth, "2.48.0", None),
    (Feature::ScrapeProtocols, "2.49.0", None),
    (Feature::EnableCompression, "2.49.0", None),
    (Feature::SampleAgeLimit, "2.50.0", None),
    (Feature::NativeHistogramMinBucketFactor, "2.50.0", None),
    (Feature::AlertmanagerAlertRelabelConfigs, "2.51.0", None),
    (Feature::AzureADSDK, "2.52.0", None),
    (Feature::AzureSDSDKAuthentication, "2.52.0", None),
    (Feature::RemoteWriteMessageVersion, "2.54.0", None),
    (Feature::OTLPConfig, "2.55.0", None),
    (Feature::FallbackScrapeProtocol, "3.0.0", None),
    (Feature::OTLPReceiverFlag, "3.0.0", None),
    (Feature::ConsulFilter, "3.0.0", None),
    (Feature::OTLPTranslationStrategy, "3.0.0", None),
    (Feature::ConvertClassicHistogramsToNHCB, "3.0.0", None),
    (Feature::RoundRobinDNS, "3.1.0", None),
    (Feature::KeepIdentifyingResourceAttributes, "3.1.0", None),
    (Feature::OpenStackLoadBalancerRole, "3.2.0", None),
];

pub const OTLP_RECEIVER_FEATURE: &str = "otlp-write-receiver";
pub const OTLP_RECEIVER_FLAG: &str = "web.enable-otlp-receiver";
pub const ENABLE_FEATURE_FLAG: &str = "enable-feature";

/// A parsed Prometheus version, used to decide which configuration fields and flags to emit.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct PrometheusVersion(Version);

impl PrometheusVersion {
    /// Parses versions leniently: a leading `v` is ignored and missing minor/patch components
    /// default to zero, so `v2.47` is read as `2.47.0`.
    pub fn parse(s: &str) -> anyhow::Result<PrometheusVersion> {
        let trimmed = s.trim().trim_start_matches('v');
        let (core, suffix) = match trimmed.find(['-', '+']) {
            Some(idx) => trimmed.split_at(idx),
            None => (trimmed, ""),
        };

        let mut parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            bail!(VersionError::invalid_version(s));
        }
        while parts.len() < 3 {
            parts.push("0");
        }

        let normalized = format!("{}{suffix}", parts.join("."));
        let v = Version::parse(&normalized).map_err(|e| VersionError::invalid_version(&format!("{s}: {e}")))?;
        Ok(PrometheusVersion(v))
    }

    pub fn from_spec(version: Option<&str>) -> anyhow::Result<PrometheusVersion> {
        match version {
            Some(v) if !v.is_empty() => PrometheusVersion::parse(v),
            _ => PrometheusVersion::parse(DEFAULT_PROMETHEUS_VERSION),
        }
    }

    pub fn gte(&self, other: &str) -> bool {
        match PrometheusVersion::parse(other) {
            Ok(o) => self.0 >= o.0,
            Err(_) => false,
        }
    }

    pub fn lt(&self, other: &str) -> bool {
        !self.gte(other)
    }

    /// `min <= self < max`; an open upper bound always matches.
    pub fn in_range(&self, min: &str, max: Option<&str>) -> bool {
        self.gte(min) && max.is_none_or(|m| self.lt(m))
    }

    pub fn supports(&self, feature: Feature) -> bool {
        FEATURES
            .iter()
            .find(|(f, ..)| *f == feature)
            .is_some_and(|(_, min, max)| self.in_range(min, *max))
    }

    /// Minimum version for a feature, used in "only supported from version X" errors.
    pub fn minimum_for(feature: Feature) -> &'static str {
        FEATURES.iter().find(|(f, ..)| *f == feature).map(|(_, min, _)| *min).unwrap_or("unknown")
    }

    /// Inserts `key: value` into the mapping only when the feature is available.
    pub fn insert_gated<V: Into<Value>>(&self, cfg: &mut Mapping, feature: Feature, key: &str, value: V) -> bool {
        if self.supports(feature) {
            cfg.insert(key.into(), value.into());
            return true;
        }
        false
    }
}

impl fmt::Display for PrometheusVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command-line argument passed to the Prometheus container.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Argument {
    pub name: String,
    pub value: Option<String>,
}

impl Argument {
    fn flag(name: &str) -> Argument {
        Argument { name: name.into(), value: None }
    }
}

/// Builds the version-dependent arguments shared by Prometheus and PrometheusAgent:
/// the OTLP receiver switch and the list of feature flags.
pub fn build_common_args(cpf: &CommonPrometheusFields, version: &PrometheusVersion) -> Vec<Argument> {
    let mut args = vec![];
    let mut features: Vec<String> = cpf.enable_features.clone().unwrap_or_default();

    // An OTLP configuration block implies the receiver is wanted unless explicitly disabled.
    let otlp_enabled = cpf.enable_otlp_receiver.unwrap_or(cpf.otlp.is_some());
    if otlp_enabled {
        if version.supports(Feature::OTLPReceiverFlag) {
            args.push(Argument::flag(OTLP_RECEIVER_FLAG));
        } else if version.supports(Feature::OTLPFeatureFlag) {
            features.push(OTLP_RECEIVER_FEATURE.into());
        }
    }

    features.sort();
    features.dedup();
    if !features.is_empty() {
        args.push(Argument {
            name: ENABLE_FEATURE_FLAG.into(),
            value: Some(features.join(",")),
        });
    }

    args
}
