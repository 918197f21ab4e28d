use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use crate::v1::*;

/// HTTP client settings shared by most service discovery mechanisms.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HTTPClientConfig {
    pub basic_auth: Option<BasicAuth>,
    pub authorization: Option<SafeAuthorization>,
    pub oauth2: Option<OAuth2>,
    pub tls_config: Option<SafeTLSConfig>,
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    pub follow_redirects: Option<bool>,
    #[serde(rename = "enableHTTP2")]
    pub enable_http2: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSDConfig {
    pub files: Vec<String>,
    pub refresh_interval: Option<Duration>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HTTPSDConfig {
    pub url: String,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDiscovery {
    #[serde(rename = "ownNamespace")]
    pub include_own_namespace: Option<bool>,
    pub names: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct K8SSelectorConfig {
    pub role: String,
    pub label: Option<String>,
    pub field: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSDConfig {
    pub api_server: Option<String>,
    pub role: String,
    pub namespaces: Option<NamespaceDiscovery>,
    pub attach_metadata: Option<AttachMetadata>,
    pub selectors: Option<Vec<K8SSelectorConfig>>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsulSDConfig {
    pub server: String,
    pub path_prefix: Option<String>,
    pub token_ref: Option<SecretKeySelector>,
    pub datacenter: Option<String>,
    pub namespace: Option<String>,
    pub partition: Option<String>,
    pub scheme: Option<String>,
    pub services: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub tag_separator: Option<String>,
    pub node_meta: Option<BTreeMap<String, String>>,
    pub allow_stale: Option<bool>,
    pub refresh_interval: Option<Duration>,
    pub filter: Option<String>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DNSSDConfig {
    pub names: Vec<String>,
    pub refresh_interval: Option<Duration>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub port: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EC2SDConfig {
    pub region: Option<String>,
    pub access_key: Option<SecretKeySelector>,
    pub secret_key: Option<SecretKeySelector>,
    #[serde(rename = "roleARN")]
    pub role_arn: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub port: Option<i32>,
    pub filters: Option<Vec<Filter>>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureSDConfig {
    pub environment: Option<String>,
    pub authentication_method: Option<String>,
    #[serde(rename = "subscriptionID")]
    pub subscription_id: String,
    #[serde(rename = "tenantID")]
    pub tenant_id: Option<String>,
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
    pub client_secret: Option<SecretKeySelector>,
    pub resource_group: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub port: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GCESDConfig {
    pub project: String,
    pub zone: String,
    pub filter: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub port: Option<i32>,
    pub tag_separator: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackSDConfig {
    pub role: String,
    pub region: String,
    pub identity_endpoint: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "userid")]
    pub user_id: Option<String>,
    pub password: Option<SecretKeySelector>,
    pub domain_name: Option<String>,
    #[serde(rename = "domainID")]
    pub domain_id: Option<String>,
    pub project_name: Option<String>,
    #[serde(rename = "projectID")]
    pub project_id: Option<String>,
    pub application_credential_name: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<SecretKeySelector>,
    pub all_tenants: Option<bool>,
    pub refresh_interval: Option<Duration>,
    pub port: Option<i32>,
    pub availability: Option<String>,
    pub tls_config: Option<SafeTLSConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalOceanSDConfig {
    pub port: Option<i32>,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KumaSDConfig {
    pub server: String,
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub fetch_timeout: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EurekaSDConfig {
    pub server: String,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerSDConfig {
    pub host: String,
    pub port: Option<i32>,
    pub host_networking_host: Option<String>,
    pub filters: Option<Vec<Filter>>,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerSwarmSDConfig {
    pub host: String,
    pub role: String,
    pub port: Option<i32>,
    pub filters: Option<Vec<Filter>>,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinodeSDConfig {
    pub region: Option<String>,
    pub port: Option<i32>,
    pub tag_separator: Option<String>,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HetznerSDConfig {
    pub role: String,
    pub port: Option<i32>,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NomadSDConfig {
    pub server: String,
    pub allow_stale: Option<bool>,
    pub namespace: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub region: Option<String>,
    pub tag_separator: Option<String>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PuppetDBSDConfig {
    pub url: String,
    pub query: String,
    pub include_parameters: Option<bool>,
    pub refresh_interval: Option<Duration>,
    pub port: Option<i32>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSailSDConfig {
    pub region: Option<String>,
    pub access_key: Option<SecretKeySelector>,
    pub secret_key: Option<SecretKeySelector>,
    #[serde(rename = "roleARN")]
    pub role_arn: Option<String>,
    pub endpoint: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub port: Option<i32>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OVHCloudSDConfig {
    pub application_key: String,
    pub application_secret: SecretKeySelector,
    pub consumer_key: SecretKeySelector,
    pub service: String,
    pub endpoint: Option<String>,
    pub refresh_interval: Option<Duration>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalewaySDConfig {
    pub access_key: String,
    pub secret_key: SecretKeySelector,
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub role: String,
    pub port: Option<i32>,
    #[serde(rename = "apiURL")]
    pub api_url: Option<String>,
    pub zone: Option<String>,
    pub name_filter: Option<String>,
    pub tags_filter: Option<Vec<String>>,
    pub refresh_interval: Option<Duration>,
    #[serde(flatten)]
    pub http: HTTPClientConfig,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IonosSDConfig {
    #[serde(rename = "datacenterID")]
    pub datacenter_id: String,
    pub authorization: SafeAuthorization,
    pub port: Option<i32>,
    pub refresh_interval: Option<Duration>,
    pub tls_config: Option<SafeTLSConfig>,
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    pub follow_redirects: Option<bool>,
    #[serde(rename = "enableHTTP2")]
    pub enable_http2: Option<bool>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(group = "monitoring.coreos.com", version = "v1alpha1", kind = "ScrapeConfig", namespaced)]
#[kube(shortname = "scfg")]
#[kube(status = "ConfigResourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ScrapeConfigSpec {
    pub job_name: Option<String>,
    pub static_configs: Option<Vec<StaticConfig>>,
    #[serde(rename = "fileSDConfigs")]
    pub file_sd_configs: Option<Vec<FileSDConfig>>,
    #[serde(rename = "httpSDConfigs")]
    pub http_sd_configs: Option<Vec<HTTPSDConfig>>,
    #[serde(rename = "kubernetesSDConfigs")]
    pub kubernetes_sd_configs: Option<Vec<KubernetesSDConfig>>,
    #[serde(rename = "consulSDConfigs")]
    pub consul_sd_configs: Option<Vec<ConsulSDConfig>>,
    #[serde(rename = "dnsSDConfigs")]
    pub dns_sd_configs: Option<Vec<DNSSDConfig>>,
    #[serde(rename = "ec2SDConfigs")]
    pub ec2_sd_configs: Option<Vec<EC2SDConfig>>,
    #[serde(rename = "azureSDConfigs")]
    pub azure_sd_configs: Option<Vec<AzureSDConfig>>,
    #[serde(rename = "gceSDConfigs")]
    pub gce_sd_configs: Option<Vec<GCESDConfig>>,
    #[serde(rename = "openstackSDConfigs")]
    pub openstack_sd_configs: Option<Vec<OpenStackSDConfig>>,
    #[serde(rename = "digitalOceanSDConfigs")]
    pub digitalocean_sd_configs: Option<Vec<DigitalOceanSDConfig>>,
    #[serde(rename = "kumaSDConfigs")]
    pub kuma_sd_configs: Option<Vec<KumaSDConfig>>,
    #[serde(rename = "eurekaSDConfigs")]
    pub eureka_sd_configs: Option<Vec<EurekaSDConfig>>,
    #[serde(rename = "dockerSDConfigs")]
    pub docker_sd_configs: Option<Vec<DockerSDConfig>>,
    #[serde(rename = "linodeSDConfigs")]
    pub linode_sd_configs: Option<Vec<LinodeSDConfig>>,
    #[serde(rename = "hetznerSDConfigs")]
    pub hetzner_sd_configs: Option<Vec<HetznerSDConfig>>,
    #[serde(rename = "nomadSDConfigs")]
    pub nomad_sd_configs: Option<Vec<NomadSDConfig>>,
    #[serde(rename = "dockerSwarmSDConfigs")]
    pub dockerswarm_sd_configs: Option<Vec<DockerSwarmSDConfig>>,
    #[serde(rename = "puppetDBSDConfigs")]
    pub puppetdb_sd_configs: Option<Vec<PuppetDBSDConfig>>,
    #[serde(rename = "lightSailSDConfigs")]
    pub lightsail_sd_configs: Option<Vec<LightSailSDConfig>>,
    #[serde(rename = "ovhcloudSDConfigs")]
    pub ovhcloud_sd_configs: Option<Vec<OVHCloudSDConfig>>,
    #[serde(rename = "scalewaySDConfigs")]
    pub scaleway_sd_configs: Option<Vec<ScalewaySDConfig>>,
    #[serde(rename = "ionosSDConfigs")]
    pub ionos_sd_configs: Option<Vec<IonosSDConfig>>,

    pub relabelings: Option<Vec<RelabelConfig>>,
    pub metrics_path: Option<String>,
    pub scrape_interval: Option<Duration>,
    pub scrape_timeout: Option<Duration>,
    pub scrape_protocols: Option<Vec<String>>,
    pub fallback_scrape_protocol: Option<String>,
    pub honor_timestamps: Option<bool>,
    pub track_timestamps_staleness: Option<bool>,
    pub honor_labels: Option<bool>,
    pub params: Option<BTreeMap<String, Vec<String>>>,
    pub scheme: Option<String>,
    pub enable_compression: Option<bool>,
    pub basic_auth: Option<BasicAuth>,
    pub authorization: Option<SafeAuthorization>,
    pub oauth2: Option<OAuth2>,
    pub tls_config: Option<SafeTLSConfig>,
    #[serde(flatten)]
    pub limits: ScrapeLimits,
    #[serde(flatten)]
    pub native_histograms: NativeHistogramConfig,
    pub metric_relabelings: Option<Vec<RelabelConfig>>,
    #[serde(flatten)]
    pub proxy: ProxyConfig,
    #[serde(rename = "scrapeClass")]
    pub scrape_class_name: Option<String>,
}
