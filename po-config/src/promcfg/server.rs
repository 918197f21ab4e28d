use po_api::IntOrString;
use po_core::errors::*;
use serde_yaml::{
    Mapping,
    Value,
};
use tracing::*;

use super::relabel::*;
use super::yaml::*;
use super::ConfigGenerator;
use crate::assets::{
    AssetKind,
    Assets,
};
use crate::monitor::*;
use crate::prelude::*;

pub(super) const APISERVER_CONTEXT: &str = "apiserver";
const DEFAULT_ALERTMANAGER_API_VERSION: &str = "v2";

pub(super) fn scrape_class_context(name: &str) -> String {
    format!("scrapeClass/{name}")
}

fn remote_write_context(i: usize) -> String {
    format!("remoteWrite/{i}")
}

fn remote_read_context(i: usize) -> String {
    format!("remoteRead/{i}")
}

fn alertmanager_context(i: usize) -> String {
    format!("alertmanager/{i}")
}

/// Resolves the credentials referenced by the workload itself (remote endpoints, apiserver access,
/// scrape classes, Alertmanagers and the raw additional configs) into the store.  The secrets all
/// live in the workload's namespace.
#[instrument(skip_all, fields(workload = %workload.namespaced_name()))]
pub async fn load_workload_assets<W: Workload, S: SecretSource>(workload: &W, store: &mut AssetStore<S>) -> EmptyResult {
    let ns = workload.namespace().unwrap_or_default();
    let cpf = workload.common();

    for (i, rw) in cpf.remote_write.iter().flatten().enumerate() {
        let ctx = remote_write_context(i);
        load_remote_write(store, &ns, rw, &ctx)
            .await
            .with_context(|| format!("remoteWrite[{i}]"))?;
    }

    if let Some(api) = &cpf.apiserver_config {
        store
            .add_basic_auth(&ns, api.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, APISERVER_CONTEXT))
            .await
            .context("apiserverConfig")?;
        store
            .add_authorization(&ns, api.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, APISERVER_CONTEXT))
            .await
            .context("apiserverConfig")?;
        store.add_tls_config(&ns, api.tls_config.as_ref()).await.context("apiserverConfig")?;
    }

    for class in cpf.scrape_classes.iter().flatten() {
        let ctx = scrape_class_context(&class.name);
        store
            .add_authorization(&ns, class.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .with_context(|| format!("scrapeClasses[{}]", class.name))?;
    }

    if let Some(tc) = &cpf.tracing_config {
        store.add_tls_config(&ns, tc.tls_config.as_ref()).await.context("tracingConfig")?;
    }

    load_additional_config(store, &ns, cpf.additional_scrape_configs.as_ref())
        .await
        .context("additionalScrapeConfigs")?;

    let Some(server) = workload.server() else { return Ok(()) };

    for (i, rr) in server.remote_read.iter().flatten().enumerate() {
        let ctx = remote_read_context(i);
        store
            .add_basic_auth(&ns, rr.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, &ctx))
            .await
            .with_context(|| format!("remoteRead[{i}]"))?;
        store
            .add_oauth2(&ns, rr.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, &ctx))
            .await
            .with_context(|| format!("remoteRead[{i}]"))?;
        store
            .add_authorization(&ns, rr.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .with_context(|| format!("remoteRead[{i}]"))?;
        store
            .add_tls_config(&ns, rr.tls_config.as_ref())
            .await
            .with_context(|| format!("remoteRead[{i}]"))?;
        store
            .add_proxy_config(&ns, &rr.proxy, &AssetKey::new(AssetKind::ProxyHeader, &ctx))
            .await
            .with_context(|| format!("remoteRead[{i}]"))?;
    }

    for (i, am) in server.alerting.iter().flat_map(|a| a.alertmanagers.iter()).enumerate() {
        let ctx = alertmanager_context(i);
        let am_ns = am.namespace.as_deref().filter(|n| !n.is_empty()).unwrap_or(ns.as_str());
        store
            .add_basic_auth(&ns, am.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, &ctx))
            .await
            .with_context(|| format!("alertmanagers[{i}]"))?;
        store
            .add_safe_authorization(&ns, am.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .with_context(|| format!("alertmanagers[{i}]"))?;
        store
            .add_sigv4(&ns, am.sigv4.as_ref(), &AssetKey::new(AssetKind::SigV4, &ctx))
            .await
            .with_context(|| format!("alertmanagers[{i}]"))?;
        store
            .add_tls_config(am_ns, am.tls_config.as_ref())
            .await
            .with_context(|| format!("alertmanagers[{i}]"))?;
    }

    load_additional_config(store, &ns, server.additional_alert_relabel_configs.as_ref())
        .await
        .context("additionalAlertRelabelConfigs")?;
    load_additional_config(store, &ns, server.additional_alert_manager_configs.as_ref())
        .await
        .context("additionalAlertManagerConfigs")?;
    Ok(())
}

async fn load_remote_write<S: SecretSource>(
    store: &mut AssetStore<S>,
    ns: &str,
    rw: &RemoteWriteSpec,
    ctx: &str,
) -> EmptyResult {
    store
        .add_basic_auth(ns, rw.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, ctx))
        .await?;
    store
        .add_oauth2(ns, rw.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, ctx))
        .await?;
    store
        .add_authorization(ns, rw.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, ctx))
        .await?;
    store
        .add_sigv4(ns, rw.sigv4.as_ref(), &AssetKey::new(AssetKind::SigV4, ctx))
        .await?;
    store
        .add_azure_ad(ns, rw.azure_ad.as_ref(), &AssetKey::new(AssetKind::AzureAD, ctx))
        .await?;
    store.add_tls_config(ns, rw.tls_config.as_ref()).await?;
    store
        .add_proxy_config(ns, &rw.proxy, &AssetKey::new(AssetKind::ProxyHeader, ctx))
        .await
}

// A missing optional secret renders as an empty list.
async fn load_additional_config<S: SecretSource>(
    store: &mut AssetStore<S>,
    ns: &str,
    sel: Option<&SecretKeySelector>,
) -> EmptyResult {
    let Some(sel) = sel else { return Ok(()) };
    match store.get_secret_key(ns, sel).await {
        Ok(_) => Ok(()),
        Err(err) if sel.optional.unwrap_or_default() => {
            debug!("optional secret {:?} not loaded: {err:#}", sel.name);
            Ok(())
        },
        Err(err) => Err(err),
    }
}

fn add_sigv4(cfg: &mut Mapping, assets: &Assets, ctx: &str, sigv4: Option<&Sigv4>, version: &PrometheusVersion) {
    let Some(sigv4) = sigv4 else { return };

    let mut m = Mapping::new();
    m.set_str("region", sigv4.region.as_deref());
    if let Some(creds) = assets.sigv4(&AssetKey::new(AssetKind::SigV4, ctx)) {
        m.set("access_key", creds.access_key.as_str());
        m.set("secret_key", creds.secret_key.as_str());
    }
    m.set_str("profile", sigv4.profile.as_deref());
    m.set_str("role_arn", sigv4.role_arn.as_deref());
    m.set_opt("use_fips_sts_endpoint", sigv4.use_fips_sts_endpoint);
    version.insert_gated(cfg, Feature::Sigv4, "sigv4", m);
}

fn add_azure_ad(cfg: &mut Mapping, assets: &Assets, ctx: &str, azure: Option<&AzureAD>, version: &PrometheusVersion) {
    let Some(azure) = azure else { return };

    let mut m = Mapping::new();
    m.set_str("cloud", azure.cloud.as_deref());
    if let Some(mi) = &azure.managed_identity {
        let mut managed = Mapping::new();
        managed.set_str("client_id", mi.client_id.as_deref());
        m.set("managed_identity", managed);
    }
    if let Some(oauth) = &azure.oauth {
        let mut o = Mapping::new();
        o.set("client_id", oauth.client_id.as_str());
        o.set_opt("client_secret", assets.bearer_token(&AssetKey::new(AssetKind::AzureAD, ctx)));
        o.set("tenant_id", oauth.tenant_id.as_str());
        version.insert_gated(&mut m, Feature::AzureADOAuth, "oauth", o);
    }
    if let Some(sdk) = &azure.sdk {
        let mut s = Mapping::new();
        s.set_str("tenant_id", sdk.tenant_id.as_deref());
        version.insert_gated(&mut m, Feature::AzureADSDK, "sdk", s);
    }
    version.insert_gated(cfg, Feature::AzureAD, "azuread", m);
}

fn protobuf_message(message_version: &str) -> Option<&'static str> {
    match message_version {
        "V1" => Some("prometheus.WriteRequest"),
        "V2" => Some("io.prometheus.write.v2.Request"),
        _ => None,
    }
}

impl<W: Workload> ConfigGenerator<'_, W> {
    pub(super) fn alerting(&self, server: &PrometheusSpec, assets: &Assets) -> anyhow::Result<Mapping> {
        let mut alert_relabel_configs = vec![];
        let replica_label = self.replica_label_name();
        if !replica_label.is_empty() {
            alert_relabel_configs.push(relabel_config(&RelabelConfig {
                regex: Some(replica_label),
                action: Some("labeldrop".into()),
                ..Default::default()
            }));
        }
        alert_relabel_configs.extend(
            self.additional_config(server.additional_alert_relabel_configs.as_ref(), assets)
                .context("additionalAlertRelabelConfigs")?,
        );

        let mut alertmanagers: Vec<Value> = server
            .alerting
            .iter()
            .flat_map(|a| a.alertmanagers.iter())
            .enumerate()
            .map(|(i, am)| Value::Mapping(self.alertmanager(i, am, assets)))
            .collect();
        alertmanagers.extend(
            self.additional_config(server.additional_alert_manager_configs.as_ref(), assets)
                .context("additionalAlertManagerConfigs")?,
        );

        let mut alerting = Mapping::new();
        alerting.set("alert_relabel_configs", alert_relabel_configs);
        alerting.set("alertmanagers", alertmanagers);
        Ok(alerting)
    }

    fn alertmanager(&self, i: usize, am: &AlertmanagerEndpoints, assets: &Assets) -> Mapping {
        let ctx = alertmanager_context(i);
        let workload_ns = self.workload.namespace().unwrap_or_default();
        let am_ns = am.namespace.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| workload_ns.clone());
        let role = self.discovery_role(None);

        let mut cfg = Mapping::new();
        cfg.set("path_prefix", am.path_prefix.as_deref().filter(|p| !p.is_empty()).unwrap_or("/"));
        cfg.set("scheme", am.scheme.as_deref().filter(|s| !s.is_empty()).unwrap_or("http"));
        cfg.set_str("timeout", am.timeout.as_deref());
        let api_version = am
            .api_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_ALERTMANAGER_API_VERSION)
            .to_lowercase();
        self.version
            .insert_gated(&mut cfg, Feature::AlertmanagerApiVersion, "api_version", api_version);
        cfg.set_gated(&self.version, Feature::EnableHTTP2, "enable_http2", am.enable_http2);
        add_tls_config(&mut cfg, &am_ns, am.tls_config.as_ref(), &self.version);
        cfg.set("kubernetes_sd_configs", self.k8s_sd_config(role, Some(vec![am_ns]), None, assets));

        cfg.set_str("bearer_token_file", am.bearer_token_file.as_deref());
        if self.version.supports(Feature::AlertmanagerBasicAuth) {
            add_basic_auth(&mut cfg, assets, &ctx);
            if let Some(auth) = &am.authorization {
                add_authorization(&mut cfg, assets, &ctx, &auth.clone().into());
            }
        }
        add_sigv4(&mut cfg, assets, &ctx, am.sigv4.as_ref(), &self.version);

        let mut rules = vec![keep(&["__meta_kubernetes_service_name"], am.name.as_str())];
        rules.push(match &am.port {
            IntOrString::String(name) => keep(&[format!("__meta_kubernetes_{role}_port_name").as_str()], name.as_str()),
            IntOrString::Int(n) => keep(&["__meta_kubernetes_pod_container_port_number"], n.to_string()),
        });
        rules.extend(am.relabelings.iter().flatten().cloned());
        cfg.set("relabel_configs", relabel_configs(&rules));

        if let Some(rcs) = am.alert_relabelings.as_ref().filter(|r| !r.is_empty()) {
            self.version.insert_gated(
                &mut cfg,
                Feature::AlertmanagerAlertRelabelConfigs,
                "alert_relabel_configs",
                relabel_configs(rcs),
            );
        }
        cfg
    }

    pub(super) fn add_remote_write(&self, cfg: &mut Mapping, assets: &Assets) {
        let cpf = self.workload.common();
        let ns = self.workload.namespace().unwrap_or_default();
        let remote_writes: Vec<Value> = cpf
            .remote_write
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, rw)| Value::Mapping(self.remote_write(&ns, i, rw, assets)))
            .collect();
        cfg.set_seq("remote_write", remote_writes);
    }

    fn remote_write(&self, ns: &str, i: usize, rw: &RemoteWriteSpec, assets: &Assets) -> Mapping {
        let ctx = remote_write_context(i);
        let version = &self.version;

        let mut cfg = Mapping::new();
        cfg.set("url", rw.url.as_str());
        cfg.set_gated(version, Feature::RemoteName, "name", rw.name.as_deref().filter(|n| !n.is_empty()));
        cfg.set_gated(
            version,
            Feature::RemoteWriteMessageVersion,
            "protobuf_message",
            rw.message_version.as_deref().and_then(protobuf_message),
        );
        cfg.set_gated(version, Feature::SendExemplars, "send_exemplars", rw.send_exemplars);
        cfg.set_gated(version, Feature::SendNativeHistograms, "send_native_histograms", rw.send_native_histograms);
        cfg.set_str("remote_timeout", rw.remote_timeout.as_deref());
        if let Some(headers) = rw.headers.as_ref().filter(|h| !h.is_empty()) {
            version.insert_gated(&mut cfg, Feature::RemoteWriteHeaders, "headers", string_map(headers));
        }
        cfg.set_seq("write_relabel_configs", relabel_configs(rw.write_relabel_configs.iter().flatten()));

        if version.supports(Feature::RemoteWriteOAuth2) {
            add_oauth2(&mut cfg, ns, assets, &ctx, rw.oauth2.as_ref(), version);
        }
        add_basic_auth(&mut cfg, assets, &ctx);
        cfg.set_str("bearer_token_file", rw.bearer_token_file.as_deref());
        if let Some(auth) = &rw.authorization
            && version.supports(Feature::RemoteWriteAuthorization)
        {
            add_authorization(&mut cfg, assets, &ctx, auth);
        }
        add_sigv4(&mut cfg, assets, &ctx, rw.sigv4.as_ref(), version);
        add_azure_ad(&mut cfg, assets, &ctx, rw.azure_ad.as_ref(), version);
        add_tls_config(&mut cfg, ns, rw.tls_config.as_ref(), version);
        add_proxy(&mut cfg, assets, &ctx, &rw.proxy, version);
        cfg.set_gated(version, Feature::FollowRedirects, "follow_redirects", rw.follow_redirects);
        cfg.set_gated(version, Feature::EnableHTTP2, "enable_http2", rw.enable_http2);

        if let Some(qc) = &rw.queue_config {
            let mut q = Mapping::new();
            q.set_opt("capacity", qc.capacity);
            q.set_opt("min_shards", qc.min_shards);
            q.set_opt("max_shards", qc.max_shards);
            q.set_opt("max_samples_per_send", qc.max_samples_per_send);
            q.set_str("batch_send_deadline", qc.batch_send_deadline.as_deref());
            if qc.max_retries.is_some() {
                warn!(remote_write = %rw.url, "queueConfig.maxRetries is no longer supported by Prometheus, ignoring it");
            }
            q.set_str("min_backoff", qc.min_backoff.as_deref());
            q.set_str("max_backoff", qc.max_backoff.as_deref());
            q.set_gated(version, Feature::RetryOnRateLimit, "retry_on_http_429", qc.retry_on_rate_limit);
            q.set_gated(version, Feature::SampleAgeLimit, "sample_age_limit", qc.sample_age_limit.as_deref());
            cfg.set("queue_config", q);
        }

        if let Some(mc) = &rw.metadata_config {
            let mut m = Mapping::new();
            m.set_opt("send", mc.send);
            m.set_str("send_interval", mc.send_interval.as_deref());
            m.set_opt("max_samples_per_send", mc.max_samples_per_send);
            version.insert_gated(&mut cfg, Feature::RemoteWriteMetadata, "metadata_config", m);
        }
        cfg.set_gated(version, Feature::RoundRobinDNS, "round_robin_dns", rw.round_robin_dns);
        cfg
    }

    pub(super) fn add_remote_read(&self, cfg: &mut Mapping, server: &PrometheusSpec, assets: &Assets) {
        let ns = self.workload.namespace().unwrap_or_default();
        let version = &self.version;

        let mut remote_reads = vec![];
        for (i, rr) in server.remote_read.iter().flatten().enumerate() {
            let ctx = remote_read_context(i);
            let mut m = Mapping::new();
            m.set("url", rr.url.as_str());
            m.set_gated(version, Feature::RemoteName, "name", rr.name.as_deref().filter(|n| !n.is_empty()));
            m.set_str("remote_timeout", rr.remote_timeout.as_deref());
            if let Some(headers) = rr.headers.as_ref().filter(|h| !h.is_empty()) {
                version.insert_gated(&mut m, Feature::RemoteReadHeaders, "headers", string_map(headers));
            }
            if let Some(matchers) = rr.required_matchers.as_ref().filter(|r| !r.is_empty()) {
                m.set("required_matchers", string_map(matchers));
            }
            m.set_opt("read_recent", rr.read_recent);

            if version.supports(Feature::RemoteWriteOAuth2) {
                add_oauth2(&mut m, &ns, assets, &ctx, rr.oauth2.as_ref(), version);
            }
            add_basic_auth(&mut m, assets, &ctx);
            m.set_str("bearer_token_file", rr.bearer_token_file.as_deref());
            if let Some(auth) = &rr.authorization
                && version.supports(Feature::RemoteWriteAuthorization)
            {
                add_authorization(&mut m, assets, &ctx, auth);
            }
            add_tls_config(&mut m, &ns, rr.tls_config.as_ref(), version);
            add_proxy(&mut m, assets, &ctx, &rr.proxy, version);
            m.set_gated(version, Feature::FollowRedirects, "follow_redirects", rr.follow_redirects);
            m.set_gated(
                version,
                Feature::FilterExternalLabels,
                "filter_external_labels",
                rr.filter_external_labels,
            );
            remote_reads.push(Value::Mapping(m));
        }
        cfg.set_seq("remote_read", remote_reads);
    }

    pub(super) fn add_storage(&self, cfg: &mut Mapping, server: &PrometheusSpec) {
        let cpf = self.workload.common();
        let mut storage = Mapping::new();

        if let Some(window) = cpf.tsdb.as_ref().and_then(|t| t.out_of_order_time_window.as_deref()) {
            let mut tsdb = Mapping::new();
            tsdb.set("out_of_order_time_window", window);
            self.version
                .insert_gated(&mut storage, Feature::OutOfOrderTimeWindow, "tsdb", tsdb);
        }
        if let Some(max_size) = server.exemplars.as_ref().and_then(|e| e.max_size) {
            let mut exemplars = Mapping::new();
            exemplars.set("max_exemplars", max_size);
            self.version
                .insert_gated(&mut storage, Feature::ExemplarStorage, "exemplars", exemplars);
        }

        if !storage.is_empty() {
            cfg.set("storage", storage);
        }
    }

    pub(super) fn add_tracing(&self, cfg: &mut Mapping) {
        let Some(tc) = &self.workload.common().tracing_config else { return };
        let ns = self.workload.namespace().unwrap_or_default();

        let mut m = Mapping::new();
        m.set_str("client_type", tc.client_type.as_deref());
        m.set("endpoint", tc.endpoint.as_str());
        m.set_opt("sampling_fraction", tc.sampling_fraction.as_deref().map(float_or_string));
        m.set_opt("insecure", tc.insecure);
        if let Some(headers) = tc.headers.as_ref().filter(|h| !h.is_empty()) {
            m.set("headers", string_map(headers));
        }
        m.set_str("compression", tc.compression.as_deref());
        m.set_str("timeout", tc.timeout.as_deref());
        add_tls_config(&mut m, &ns, tc.tls_config.as_ref(), &self.version);

        if !self.version.insert_gated(cfg, Feature::Tracing, "tracing", m) {
            warn!(
                version = %self.version,
                "tracing configuration requires Prometheus >= {}",
                PrometheusVersion::minimum_for(Feature::Tracing)
            );
        }
    }

    pub(super) fn add_otlp(&self, cfg: &mut Mapping) {
        let Some(otlp) = &self.workload.common().otlp else { return };

        let mut m = Mapping::new();
        if let Some(attrs) = otlp.promote_resource_attributes.as_ref().filter(|a| !a.is_empty()) {
            m.set("promote_resource_attributes", attrs.clone());
        }
        m.set_gated(
            &self.version,
            Feature::OTLPTranslationStrategy,
            "translation_strategy",
            otlp.translation_strategy.as_deref().filter(|t| !t.is_empty()),
        );
        m.set_gated(
            &self.version,
            Feature::KeepIdentifyingResourceAttributes,
            "keep_identifying_resource_attributes",
            otlp.keep_identifying_resource_attributes,
        );
        self.version.insert_gated(cfg, Feature::OTLPConfig, "otlp", m);
    }
}
