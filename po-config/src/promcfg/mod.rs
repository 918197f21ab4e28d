mod limits;
mod monitors;
mod relabel;
mod scrape_config;
mod server;
mod yaml;

use std::collections::BTreeMap;
use std::io::Write;

use flate2::{
    Compression,
    GzBuilder,
};
use po_core::errors::*;
use serde_yaml::{
    Mapping,
    Value,
};
use tracing::*;

pub use self::server::load_workload_assets;
use self::yaml::*;
use crate::assets::Assets;
use crate::monitor::*;
use crate::prelude::*;
use crate::scrape_class::ScrapeClasses;

err_impl! {ConfigGeneratorError,
    #[error("failed to serialize configuration: {0}")]
    Serialization(String),

    #[error("failed to compress configuration: {0}")]
    Compression(String),

    #[error("invalid additional configuration: {0}")]
    InvalidAdditionalConfig(String),

    #[error("{0} is not a Prometheus server")]
    NotAServer(String),
}

/// Settings of the generator that are not part of the workload spec.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub prometheus_label_name: String,
    pub replica_label_name: String,
    pub endpoint_slice_supported: bool,
    pub default_version: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            prometheus_label_name: DEFAULT_PROMETHEUS_LABEL_NAME.into(),
            replica_label_name: DEFAULT_REPLICA_LABEL_NAME.into(),
            endpoint_slice_supported: false,
            default_version: DEFAULT_PROMETHEUS_VERSION.into(),
        }
    }
}

/// The validated resources to render, keyed by `<namespace>/<name>`.
#[derive(Clone, Debug, Default)]
pub struct ConfigInputs {
    pub service_monitors: BTreeMap<String, ServiceMonitor>,
    pub pod_monitors: BTreeMap<String, PodMonitor>,
    pub probes: BTreeMap<String, Probe>,
    pub scrape_configs: BTreeMap<String, ScrapeConfig>,
    pub rule_config_map_names: Vec<String>,
}

/// Renders the Prometheus configuration file of a workload.  Rendering is a pure function of the
/// workload, the inputs and the resolved assets: the same arguments always produce the same bytes.
pub struct ConfigGenerator<'a, W> {
    workload: &'a W,
    version: PrometheusVersion,
    config: GeneratorConfig,
    scrape_classes: ScrapeClasses<'a>,
}

impl<'a, W: Workload> ConfigGenerator<'a, W> {
    pub fn new(workload: &'a W, config: GeneratorConfig) -> anyhow::Result<ConfigGenerator<'a, W>> {
        let cpf = workload.common();
        let version = match cpf.version.as_deref().filter(|v| !v.is_empty()) {
            Some(v) => PrometheusVersion::parse(v)?,
            None => PrometheusVersion::parse(&config.default_version)?,
        };
        let scrape_classes = ScrapeClasses::new(cpf.scrape_classes.as_deref())?;
        Ok(ConfigGenerator { workload, version, config, scrape_classes })
    }

    pub fn version(&self) -> &PrometheusVersion {
        &self.version
    }

    #[instrument(skip_all, fields(workload = %self.workload.namespaced_name(), version = %self.version))]
    pub fn render_server_config(&self, inputs: &ConfigInputs, assets: &Assets) -> anyhow::Result<String> {
        let Some(server) = self.workload.server() else {
            bail!(ConfigGeneratorError::not_a_server(&self.workload.namespaced_name()));
        };

        let mut cfg = Mapping::new();
        cfg.set("global", self.global(Some(server)));

        let mut rule_names = inputs.rule_config_map_names.clone();
        rule_names.sort();
        rule_names.dedup();
        let rule_files: Vec<Value> =
            rule_names.iter().map(|cm| Value::from(format!("{RULES_DIR}/{cm}/*.yaml"))).collect();
        cfg.set("rule_files", rule_files);

        cfg.set("scrape_configs", self.scrape_configs(inputs, assets)?);
        cfg.set("alerting", self.alerting(server, assets)?);
        self.add_remote_write(&mut cfg, assets);
        self.add_remote_read(&mut cfg, server, assets);
        self.add_storage(&mut cfg, server);
        self.add_tracing(&mut cfg);
        self.add_otlp(&mut cfg);

        debug!(jobs = job_count(&cfg), "rendered server configuration");
        serialize(cfg)
    }

    pub fn generate_server_config(&self, inputs: &ConfigInputs, assets: &Assets) -> anyhow::Result<Vec<u8>> {
        gzip(self.render_server_config(inputs, assets)?.as_bytes())
    }

    /// Agents only scrape and forward samples: no rules, alerting, remote read or storage.
    #[instrument(skip_all, fields(workload = %self.workload.namespaced_name(), version = %self.version))]
    pub fn render_agent_config(&self, inputs: &ConfigInputs, assets: &Assets) -> anyhow::Result<String> {
        let mut cfg = Mapping::new();
        cfg.set("global", self.global(None));
        cfg.set("scrape_configs", self.scrape_configs(inputs, assets)?);
        self.add_remote_write(&mut cfg, assets);
        self.add_tracing(&mut cfg);
        self.add_otlp(&mut cfg);

        debug!(jobs = job_count(&cfg), "rendered agent configuration");
        serialize(cfg)
    }

    pub fn generate_agent_config(&self, inputs: &ConfigInputs, assets: &Assets) -> anyhow::Result<Vec<u8>> {
        gzip(self.render_agent_config(inputs, assets)?.as_bytes())
    }

    fn global(&self, server: Option<&PrometheusSpec>) -> Mapping {
        let cpf = self.workload.common();
        let mut global = Mapping::new();

        if let Some(server) = server {
            let interval = server.evaluation_interval.as_deref().filter(|i| !i.is_empty());
            global.set("evaluation_interval", interval.unwrap_or(DEFAULT_EVALUATION_INTERVAL));
        }
        let interval = cpf.scrape_interval.as_deref().filter(|i| !i.is_empty());
        global.set("scrape_interval", interval.unwrap_or(DEFAULT_SCRAPE_INTERVAL));
        global.set_str("scrape_timeout", cpf.scrape_timeout.as_deref());
        if let Some(protocols) = cpf.scrape_protocols.as_ref().filter(|p| !p.is_empty()) {
            self.version
                .insert_gated(&mut global, Feature::ScrapeProtocols, "scrape_protocols", protocols.clone());
        }
        global.set("external_labels", string_map(&self.external_labels()));

        if let Some(file) = server.and_then(|s| s.query_log_file.as_deref()).filter(|f| !f.is_empty()) {
            if file.contains('/') {
                global.set("query_log_file", file);
            } else {
                global.set("query_log_file", format!("{DEFAULT_QUERY_LOG_DIR}/{file}"));
            }
        }

        limits::add_global_limits(&mut global, &cpf.limits, &self.version);
        global
    }

    fn prometheus_label_name(&self) -> String {
        let cpf = self.workload.common();
        cpf.prometheus_external_label_name
            .clone()
            .unwrap_or_else(|| self.config.prometheus_label_name.clone())
    }

    fn replica_label_name(&self) -> String {
        let cpf = self.workload.common();
        cpf.replica_external_label_name
            .clone()
            .unwrap_or_else(|| self.config.replica_label_name.clone())
    }

    /// User labels plus the reserved workload and replica labels; a reserved label is disabled by
    /// setting its name to the empty string.
    fn external_labels(&self) -> BTreeMap<String, String> {
        let cpf = self.workload.common();
        let prom_label = self.prometheus_label_name();
        let replica_label = self.replica_label_name();

        let mut labels = BTreeMap::new();
        for (k, v) in cpf.external_labels.iter().flatten() {
            if (!prom_label.is_empty() && *k == prom_label) || (!replica_label.is_empty() && *k == replica_label) {
                warn!(label = %k, "external label collides with a reserved label, dropping it");
                continue;
            }
            labels.insert(k.clone(), v.clone());
        }

        if !prom_label.is_empty() {
            labels.insert(prom_label, self.workload.namespaced_name());
        }
        if !replica_label.is_empty() {
            labels.insert(replica_label, POD_NAME_PLACEHOLDER.into());
        }
        labels
    }

    fn scrape_configs(&self, inputs: &ConfigInputs, assets: &Assets) -> anyhow::Result<Vec<Value>> {
        let mut jobs = vec![];
        for sm in inputs.service_monitors.values() {
            for (i, ep) in sm.spec.endpoints.iter().enumerate() {
                jobs.push(Value::Mapping(self.service_monitor_job(sm, i, ep, assets)));
            }
        }
        for pm in inputs.pod_monitors.values() {
            for (i, ep) in pm.spec.pod_metrics_endpoints.iter().enumerate() {
                jobs.push(Value::Mapping(self.pod_monitor_job(pm, i, ep, assets)));
            }
        }
        for probe in inputs.probes.values() {
            jobs.push(Value::Mapping(self.probe_job(probe, assets)));
        }
        for sc in inputs.scrape_configs.values() {
            jobs.push(Value::Mapping(self.scrape_config_job(sc, assets)));
        }

        let cpf = self.workload.common();
        jobs.extend(
            self.additional_config(cpf.additional_scrape_configs.as_ref(), assets)
                .context("additionalScrapeConfigs")?,
        );
        Ok(jobs)
    }

    /// Raw YAML lists stored in a Secret of the workload's namespace, appended verbatim.
    fn additional_config(&self, sel: Option<&SecretKeySelector>, assets: &Assets) -> anyhow::Result<Vec<Value>> {
        let Some(sel) = sel else { return Ok(vec![]) };
        let ns = self.workload.namespace().unwrap_or_default();
        let Some(raw) = assets.cached_secret_key(&ns, sel) else {
            if sel.optional.unwrap_or_default() {
                return Ok(vec![]);
            }
            bail!(ConfigGeneratorError::invalid_additional_config(&format!(
                "key {:?} in secret {:?} not loaded",
                sel.key, sel.name
            )));
        };
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }

        serde_yaml::from_str::<Vec<Value>>(&raw)
            .map_err(|e| ConfigGeneratorError::invalid_additional_config(&e.to_string()))
    }

    // Common header of every scrape job.
    fn add_honor_settings(
        &self,
        cfg: &mut Mapping,
        honor_labels: Option<bool>,
        honor_timestamps: Option<bool>,
        track_timestamps_staleness: Option<bool>,
    ) {
        let cpf = self.workload.common();
        if let Some(honor_labels) = honor_labels {
            cfg.set("honor_labels", honor_labels && !cpf.override_honor_labels);
        }
        cfg.set_gated(
            &self.version,
            Feature::HonorTimestamps,
            "honor_timestamps",
            honor_timestamps_value(honor_timestamps, cpf.override_honor_timestamps),
        );
        cfg.set_gated(
            &self.version,
            Feature::TrackTimestampsStaleness,
            "track_timestamps_staleness",
            track_timestamps_staleness,
        );
    }

    fn add_scrape_protocols(
        &self,
        cfg: &mut Mapping,
        protocols: Option<&[String]>,
        fallback: Option<&str>,
        class: Option<&ScrapeClass>,
    ) {
        if let Some(protocols) = protocols.filter(|p| !p.is_empty()) {
            self.version
                .insert_gated(cfg, Feature::ScrapeProtocols, "scrape_protocols", protocols.to_vec());
        }
        let fallback = fallback
            .filter(|f| !f.is_empty())
            .or_else(|| class.and_then(|c| c.fallback_scrape_protocol.as_deref()));
        cfg.set_gated(&self.version, Feature::FallbackScrapeProtocol, "fallback_scrape_protocol", fallback);
    }

    fn is_excluded<T: ConfigResource>(&self, obj: &T) -> bool {
        let cpf = self.workload.common();
        let ns = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        cpf.excluded_from_enforcement.iter().flatten().any(|r| {
            r.group.as_deref().unwrap_or(MONITORING_GROUP) == MONITORING_GROUP
                && r.resource == T::resource_name()
                && r.namespace == ns
                && r.name.as_deref().is_none_or(|n| n.is_empty() || n == name)
        })
    }

    fn enforced_namespace_label<T: ConfigResource>(&self, obj: &T) -> Option<&str> {
        let cpf = self.workload.common();
        let label = cpf.enforced_namespace_label.as_deref().filter(|l| !l.is_empty())?;
        (!self.is_excluded(obj)).then_some(label)
    }

    /// Appends the user relabelings followed by the enforced namespace label and sharding rules.
    fn finish_relabelings<T: ConfigResource>(
        &self,
        obj: &T,
        mut rules: Vec<RelabelConfig>,
        user: Option<&[RelabelConfig]>,
    ) -> Vec<Value> {
        rules.extend(user.unwrap_or_default().iter().cloned());
        if let Some(label) = self.enforced_namespace_label(obj) {
            rules.push(relabel::set_label(label, obj.namespace().unwrap_or_default()));
        }
        rules.extend(relabel::sharding_rules(self.workload.common().shards));
        relabel_configs(&rules)
    }

    /// User metric relabelings, then the scrape class ones, then the enforced namespace label.
    fn metric_relabelings<T: ConfigResource>(
        &self,
        obj: &T,
        user: Option<&[RelabelConfig]>,
        class: Option<&ScrapeClass>,
    ) -> Vec<Value> {
        let enforced = self.enforced_namespace_label(obj);
        let mut rules: Vec<RelabelConfig> = relabel::without_target(user, enforced).cloned().collect();
        rules.extend(class.and_then(|c| c.metric_relabelings.clone()).unwrap_or_default());
        if let Some(label) = enforced {
            rules.push(relabel::set_label(label, obj.namespace().unwrap_or_default()));
        }
        relabel_configs(&rules)
    }

    fn class_relabelings(&self, class: Option<&ScrapeClass>) -> Vec<RelabelConfig> {
        class.and_then(|c| c.relabelings.clone()).unwrap_or_default()
    }

    fn discovery_role(&self, requested: Option<&str>) -> &'static str {
        let role = requested.or(self.workload.common().service_discovery_role.as_deref());
        match role {
            Some(r) if r.eq_ignore_ascii_case("endpointslice") && self.config.endpoint_slice_supported => {
                "endpointslice"
            },
            _ => "endpoints",
        }
    }

    /// Namespaces watched by a Kubernetes SD block.  `None` means every namespace.
    fn sd_namespaces(&self, own_ns: &str, selector: &NamespaceSelector) -> Option<Vec<String>> {
        let cpf = self.workload.common();
        if cpf.ignore_namespace_selectors {
            return Some(vec![own_ns.into()]);
        }
        if selector.any {
            return None;
        }
        if !selector.match_names.is_empty() {
            return Some(selector.match_names.clone());
        }
        Some(vec![own_ns.into()])
    }

    fn k8s_sd_config(
        &self,
        role: &str,
        namespaces: Option<Vec<String>>,
        attach_metadata: Option<(&AttachMetadata, Feature)>,
        assets: &Assets,
    ) -> Value {
        let mut sd = Mapping::new();
        sd.set("role", role);
        if let Some(names) = namespaces {
            let mut ns = Mapping::new();
            ns.set("names", names);
            sd.set("namespaces", ns);
        }

        let cpf = self.workload.common();
        if let Some(api) = &cpf.apiserver_config {
            let ctx = server::APISERVER_CONTEXT;
            let ns = self.workload.namespace().unwrap_or_default();
            sd.set("api_server", api.host.as_str());
            add_basic_auth(&mut sd, assets, ctx);
            sd.set_str("bearer_token_file", api.bearer_token_file.as_deref());
            if let Some(auth) = &api.authorization {
                add_authorization(&mut sd, assets, ctx, auth);
            }
            add_tls_config(&mut sd, &ns, api.tls_config.as_ref(), &self.version);
        }

        if let Some((am, feature)) = attach_metadata
            && let Some(node) = am.node
        {
            let mut m = Mapping::new();
            m.set("node", node);
            self.version.insert_gated(&mut sd, feature, "attach_metadata", m);
        }
        Value::Sequence(vec![Value::Mapping(sd)])
    }

    /// Explicit authorization of the resource, else its bearer token, else the scrape class's.
    fn add_scrape_authorization(
        &self,
        cfg: &mut Mapping,
        assets: &Assets,
        ctx: &str,
        auth: Option<&SafeAuthorization>,
        class: Option<&ScrapeClass>,
    ) {
        if let Some(auth) = auth {
            add_authorization(cfg, assets, ctx, &auth.clone().into());
            return;
        }
        add_bearer_token(cfg, assets, ctx);

        let has_auth = ["authorization", "basic_auth", "oauth2", "bearer_token_file"]
            .iter()
            .any(|k| cfg.contains_key(*k));
        if !has_auth
            && let Some(class) = class
            && let Some(auth) = &class.authorization
        {
            add_authorization(cfg, assets, &server::scrape_class_context(&class.name), auth);
        }
    }
}

/// Omitted unless set or overridden; the override can only turn it off.
pub(super) fn honor_timestamps_value(user: Option<bool>, override_honor_timestamps: bool) -> Option<bool> {
    match (user, override_honor_timestamps) {
        (None, false) => None,
        (user, over) => Some(user.unwrap_or_default() && !over),
    }
}

fn job_count(cfg: &Mapping) -> usize {
    cfg.get("scrape_configs").and_then(Value::as_sequence).map(Vec::len).unwrap_or_default()
}

fn serialize(cfg: Mapping) -> anyhow::Result<String> {
    serde_yaml::to_string(&Value::Mapping(cfg)).map_err(|e| ConfigGeneratorError::serialization(&e.to_string()))
}

/// Compresses the configuration with a zero modification time so the output is reproducible.
pub fn gzip(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new().mtime(0).write(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ConfigGeneratorError::compression(&e.to_string()))?;
    encoder.finish().map_err(|e| ConfigGeneratorError::compression(&e.to_string()))
}

#[cfg(test)]
mod tests;
