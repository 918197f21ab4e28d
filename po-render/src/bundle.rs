use std::fs::File;
use std::path::Path;

use anyhow::Context;
use po_api::v1::*;
use po_api::v1alpha1::*;
use po_core::prelude::*;
use serde::Deserialize;

/// Everything needed to render one workload without talking to a cluster.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Bundle {
    pub prometheus: Option<Prometheus>,
    pub prometheus_agent: Option<PrometheusAgent>,

    #[serde(default)]
    pub service_monitors: Vec<ServiceMonitor>,
    #[serde(default)]
    pub pod_monitors: Vec<PodMonitor>,
    #[serde(default)]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub scrape_configs: Vec<ScrapeConfig>,

    #[serde(default)]
    pub namespaces: Vec<corev1::Namespace>,
    #[serde(default)]
    pub secrets: Vec<corev1::Secret>,
    #[serde(default)]
    pub config_maps: Vec<corev1::ConfigMap>,
    #[serde(default)]
    pub rule_config_map_names: Vec<String>,
}

impl Bundle {
    pub fn load(path: &Path) -> anyhow::Result<Bundle> {
        let file = File::open(path).with_context(|| format!("could not open bundle {}", path.display()))?;
        serde_yaml::from_reader(file).with_context(|| format!("could not parse bundle {}", path.display()))
    }
}
