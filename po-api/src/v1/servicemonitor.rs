use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use super::*;

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub port: Option<String>,
    pub target_port: Option<IntOrString>,
    pub path: Option<String>,
    pub scheme: Option<String>,
    pub params: Option<BTreeMap<String, Vec<String>>>,
    pub interval: Option<Duration>,
    pub scrape_timeout: Option<Duration>,
    pub tls_config: Option<TLSConfig>,
    pub bearer_token_file: Option<String>,
    pub bearer_token_secret: Option<SecretKeySelector>,
    pub authorization: Option<SafeAuthorization>,
    pub honor_labels: Option<bool>,
    pub honor_timestamps: Option<bool>,
    pub track_timestamps_staleness: Option<bool>,
    pub basic_auth: Option<BasicAuth>,
    pub oauth2: Option<OAuth2>,
    pub metric_relabelings: Option<Vec<RelabelConfig>>,
    pub relabelings: Option<Vec<RelabelConfig>>,
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    pub follow_redirects: Option<bool>,
    #[serde(rename = "enableHttp2")]
    pub enable_http2: Option<bool>,
    pub filter_running: Option<bool>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(group = "monitoring.coreos.com", version = "v1", kind = "ServiceMonitor", namespaced)]
#[kube(shortname = "smon")]
#[kube(status = "ConfigResourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    pub job_label: Option<String>,
    pub target_labels: Option<Vec<String>>,
    pub pod_target_labels: Option<Vec<String>>,
    pub endpoints: Vec<Endpoint>,
    pub selector: LabelSelector,
    #[serde(default)]
    pub namespace_selector: NamespaceSelector,
    pub attach_metadata: Option<AttachMetadata>,
    pub scrape_protocols: Option<Vec<String>>,
    pub fallback_scrape_protocol: Option<String>,
    #[serde(flatten)]
    pub limits: ScrapeLimits,
    #[serde(flatten)]
    pub native_histograms: NativeHistogramConfig,
    #[serde(rename = "scrapeClass")]
    pub scrape_class_name: Option<String>,
    pub service_discovery_role: Option<String>,
}
