use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use super::*;

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProberSpec {
    pub url: String,
    pub scheme: Option<String>,
    pub path: Option<String>,
    pub proxy_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTargetStaticConfig {
    #[serde(rename = "static", default)]
    pub targets: Vec<String>,
    pub labels: Option<BTreeMap<String, String>>,
    pub relabeling_configs: Option<Vec<RelabelConfig>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTargetIngress {
    #[serde(default)]
    pub selector: LabelSelector,
    #[serde(default)]
    pub namespace_selector: NamespaceSelector,
    pub relabeling_configs: Option<Vec<RelabelConfig>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTargets {
    pub static_config: Option<ProbeTargetStaticConfig>,
    pub ingress: Option<ProbeTargetIngress>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(group = "monitoring.coreos.com", version = "v1", kind = "Probe", namespaced)]
#[kube(shortname = "prb")]
#[kube(status = "ConfigResourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    pub job_name: Option<String>,
    pub prober: Option<ProberSpec>,
    pub module: Option<String>,
    #[serde(default)]
    pub targets: ProbeTargets,
    pub interval: Option<Duration>,
    pub scrape_timeout: Option<Duration>,
    pub tls_config: Option<SafeTLSConfig>,
    pub bearer_token_secret: Option<SecretKeySelector>,
    pub basic_auth: Option<BasicAuth>,
    pub oauth2: Option<OAuth2>,
    pub authorization: Option<SafeAuthorization>,
    pub metric_relabelings: Option<Vec<RelabelConfig>>,
    pub scrape_protocols: Option<Vec<String>>,
    pub fallback_scrape_protocol: Option<String>,
    pub params: Option<BTreeMap<String, Vec<String>>>,
    #[serde(flatten)]
    pub limits: ScrapeLimits,
    #[serde(flatten)]
    pub native_histograms: NativeHistogramConfig,
    #[serde(rename = "scrapeClass")]
    pub scrape_class_name: Option<String>,
}
