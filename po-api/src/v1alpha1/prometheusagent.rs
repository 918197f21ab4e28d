use kube::CustomResource;
use schemars::JsonSchema;
use serde::{
    Deserialize,
    Serialize,
};

use crate::v1::CommonPrometheusFields;

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(group = "monitoring.coreos.com", version = "v1alpha1", kind = "PrometheusAgent", namespaced)]
#[kube(shortname = "promagent")]
#[serde(rename_all = "camelCase")]
pub struct PrometheusAgentSpec {
    #[serde(flatten)]
    pub common: CommonPrometheusFields,
}
