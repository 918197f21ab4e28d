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
pub struct QueueConfig {
    pub capacity: Option<i32>,
    pub min_shards: Option<i32>,
    pub max_shards: Option<i32>,
    pub max_samples_per_send: Option<i32>,
    pub batch_send_deadline: Option<Duration>,
    pub max_retries: Option<i32>,
    pub min_backoff: Option<Duration>,
    pub max_backoff: Option<Duration>,
    pub retry_on_rate_limit: Option<bool>,
    pub sample_age_limit: Option<Duration>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataConfig {
    pub send: Option<bool>,
    pub send_interval: Option<Duration>,
    pub max_samples_per_send: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedIdentity {
    pub client_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureOAuth {
    pub client_id: String,
    pub client_secret: SecretKeySelector,
    pub tenant_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureSDK {
    pub tenant_id: Option<String>,
}

/// Azure AD authentication; exactly one of the three credential variants may be set.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAD {
    pub cloud: Option<String>,
    pub managed_identity: Option<ManagedIdentity>,
    pub oauth: Option<AzureOAuth>,
    pub sdk: Option<AzureSDK>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWriteSpec {
    pub url: String,
    pub name: Option<String>,
    pub message_version: Option<String>,
    pub send_exemplars: Option<bool>,
    pub send_native_histograms: Option<bool>,
    pub remote_timeout: Option<Duration>,
    pub headers: Option<BTreeMap<String, String>>,
    pub write_relabel_configs: Option<Vec<RelabelConfig>>,
    pub oauth2: Option<OAuth2>,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token_file: Option<String>,
    pub authorization: Option<Authorization>,
    pub sigv4: Option<Sigv4>,
    #[serde(rename = "azureAd")]
    pub azure_ad: Option<AzureAD>,
    pub tls_config: Option<TLSConfig>,
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    pub follow_redirects: Option<bool>,
    #[serde(rename = "enableHTTP2")]
    pub enable_http2: Option<bool>,
    pub queue_config: Option<QueueConfig>,
    pub metadata_config: Option<MetadataConfig>,
    #[serde(rename = "roundRobinDNS")]
    pub round_robin_dns: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReadSpec {
    pub url: String,
    pub name: Option<String>,
    pub required_matchers: Option<BTreeMap<String, String>>,
    pub remote_timeout: Option<Duration>,
    pub headers: Option<BTreeMap<String, String>>,
    pub read_recent: Option<bool>,
    pub oauth2: Option<OAuth2>,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token_file: Option<String>,
    pub authorization: Option<Authorization>,
    pub tls_config: Option<TLSConfig>,
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    pub follow_redirects: Option<bool>,
    pub filter_external_labels: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerEndpoints {
    pub namespace: Option<String>,
    pub name: String,
    pub port: IntOrString,
    pub scheme: Option<String>,
    pub path_prefix: Option<String>,
    pub tls_config: Option<TLSConfig>,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token_file: Option<String>,
    pub authorization: Option<SafeAuthorization>,
    pub sigv4: Option<Sigv4>,
    pub api_version: Option<String>,
    pub timeout: Option<Duration>,
    #[serde(rename = "enableHttp2")]
    pub enable_http2: Option<bool>,
    pub relabelings: Option<Vec<RelabelConfig>>,
    pub alert_relabelings: Option<Vec<RelabelConfig>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertingSpec {
    pub alertmanagers: Vec<AlertmanagerEndpoints>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct APIServerConfig {
    pub host: String,
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token_file: Option<String>,
    pub tls_config: Option<TLSConfig>,
    pub authorization: Option<Authorization>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TSDBSpec {
    pub out_of_order_time_window: Option<Duration>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exemplars {
    pub max_size: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusTracingConfig {
    pub client_type: Option<String>,
    pub endpoint: String,
    pub sampling_fraction: Option<String>,
    pub insecure: Option<bool>,
    pub headers: Option<BTreeMap<String, String>>,
    pub compression: Option<String>,
    pub timeout: Option<Duration>,
    pub tls_config: Option<TLSConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OTLPConfig {
    pub promote_resource_attributes: Option<Vec<String>>,
    pub translation_strategy: Option<String>,
    pub keep_identifying_resource_attributes: Option<bool>,
}

/// Fields shared by the Prometheus and PrometheusAgent workloads.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonPrometheusFields {
    pub service_monitor_selector: Option<LabelSelector>,
    pub service_monitor_namespace_selector: Option<LabelSelector>,
    pub pod_monitor_selector: Option<LabelSelector>,
    pub pod_monitor_namespace_selector: Option<LabelSelector>,
    pub probe_selector: Option<LabelSelector>,
    pub probe_namespace_selector: Option<LabelSelector>,
    pub scrape_config_selector: Option<LabelSelector>,
    pub scrape_config_namespace_selector: Option<LabelSelector>,

    pub version: Option<String>,
    pub shards: Option<i32>,
    pub replica_external_label_name: Option<String>,
    pub prometheus_external_label_name: Option<String>,

    pub scrape_interval: Option<Duration>,
    pub scrape_timeout: Option<Duration>,
    pub scrape_protocols: Option<Vec<String>>,
    pub external_labels: Option<BTreeMap<String, String>>,
    #[serde(rename = "enableOTLPReceiver")]
    pub enable_otlp_receiver: Option<bool>,
    pub enable_features: Option<Vec<String>>,
    pub remote_write: Option<Vec<RemoteWriteSpec>>,
    pub otlp: Option<OTLPConfig>,
    pub additional_scrape_configs: Option<SecretKeySelector>,
    pub apiserver_config: Option<APIServerConfig>,
    #[serde(rename = "arbitraryFSAccessThroughSMs", default)]
    pub arbitrary_fs_access_through_sms: ArbitraryFSAccessThroughSMsConfig,

    #[serde(default)]
    pub override_honor_labels: bool,
    #[serde(default)]
    pub override_honor_timestamps: bool,
    #[serde(default)]
    pub ignore_namespace_selectors: bool,
    pub enforced_namespace_label: Option<String>,
    pub enforced_sample_limit: Option<u64>,
    pub enforced_target_limit: Option<u64>,
    pub enforced_label_limit: Option<u64>,
    pub enforced_label_name_length_limit: Option<u64>,
    pub enforced_label_value_length_limit: Option<u64>,
    pub enforced_keep_dropped_targets: Option<u64>,
    pub enforced_body_size_limit: Option<String>,
    pub excluded_from_enforcement: Option<Vec<ObjectReference>>,

    pub tracing_config: Option<PrometheusTracingConfig>,
    #[serde(flatten)]
    pub limits: ScrapeLimits,
    pub scrape_classes: Option<Vec<ScrapeClass>>,
    pub service_discovery_role: Option<String>,
    pub tsdb: Option<TSDBSpec>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(group = "monitoring.coreos.com", version = "v1", kind = "Prometheus", namespaced)]
#[kube(shortname = "prom")]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    #[serde(flatten)]
    pub common: CommonPrometheusFields,

    pub evaluation_interval: Option<Duration>,
    pub rule_selector: Option<LabelSelector>,
    pub rule_namespace_selector: Option<LabelSelector>,
    pub query_log_file: Option<String>,
    pub alerting: Option<AlertingSpec>,
    pub remote_read: Option<Vec<RemoteReadSpec>>,
    pub exemplars: Option<Exemplars>,
    pub additional_alert_relabel_configs: Option<SecretKeySelector>,
    pub additional_alert_manager_configs: Option<SecretKeySelector>,
}
