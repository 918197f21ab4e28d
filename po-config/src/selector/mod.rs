mod scrape_config;

use std::collections::BTreeMap;
use std::ops::Deref;

use k8s_openapi::chrono::Utc;
use metrics::gauge;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use po_core::errors::*;
use po_core::k8s::validate_label_selector;
use tracing::*;

use crate::assets::AssetKind;
use crate::monitor::*;
use crate::prelude::*;
use crate::validation::*;

/// Lists every namespace of the cluster; used to evaluate namespace selectors.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait NamespaceLister {
    fn list_namespaces(&self) -> anyhow::Result<Vec<corev1::Namespace>>;
}

impl NamespaceLister for Vec<corev1::Namespace> {
    fn list_namespaces(&self) -> anyhow::Result<Vec<corev1::Namespace>> {
        Ok(self.clone())
    }
}

/// Builds a listing function over an in-memory set of objects: it returns the objects of one
/// namespace that match a label selector, the way an informer cache would.
pub fn list_from<T: ConfigResource>(
    objs: &[T],
) -> impl Fn(&str, &metav1::LabelSelector) -> anyhow::Result<Vec<T>> + '_ {
    move |ns, sel| {
        let mut res = vec![];
        for obj in objs.iter().filter(|o| o.namespace().as_deref() == Some(ns)) {
            if obj.matches(sel)? {
                res.push(obj.clone());
            }
        }
        Ok(res)
    }
}

/// A selected configuration resource together with the outcome of its validation.
#[derive(Clone, Debug)]
pub struct TypedConfigurationResource<T> {
    pub resource: T,
    pub error: Option<String>,
    pub reason: Option<String>,
    pub generation: Option<i64>,
}

impl<T> TypedConfigurationResource<T> {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn conditions(&self) -> Vec<ConfigResourceCondition> {
        let status = if self.is_valid() { CONDITION_TRUE } else { CONDITION_FALSE };
        vec![ConfigResourceCondition {
            type_: ACCEPTED_CONDITION.into(),
            status: status.into(),
            last_transition_time: Some(metav1::Time(Utc::now())),
            reason: self.reason.clone(),
            message: self.error.clone(),
            observed_generation: self.generation,
        }]
    }
}

/// The resources selected by a workload, keyed by `<namespace>/<name>`.
#[derive(Clone, Debug)]
pub struct TypedResourcesSelection<T>(BTreeMap<String, TypedConfigurationResource<T>>);

impl<T> Default for TypedResourcesSelection<T> {
    fn default() -> Self {
        TypedResourcesSelection(BTreeMap::new())
    }
}

impl<T> Deref for TypedResourcesSelection<T> {
    type Target = BTreeMap<String, TypedConfigurationResource<T>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: ConfigResource> TypedResourcesSelection<T> {
    /// Only the resources which passed validation.
    pub fn valid_resources(&self) -> BTreeMap<String, T> {
        self.0
            .iter()
            .filter(|(_, r)| r.is_valid())
            .map(|(k, r)| (k.clone(), r.resource.clone()))
            .collect()
    }

    pub fn rejected(&self) -> usize {
        self.0.values().filter(|r| !r.is_valid()).count()
    }

    fn add(&mut self, key: String, resource: T, check: EmptyResult) {
        let generation = resource.meta().generation;
        let (error, reason) = match check {
            Ok(()) => (None, None),
            Err(err) => {
                let msg = format!("{err:#}");
                warn!(
                    resource = %T::resource_name(),
                    namespace = %resource.namespace().unwrap_or_default(),
                    name = %resource.name_any(),
                    reason = INVALID_CONFIGURATION_REASON,
                    error = %msg,
                    "skipping object"
                );
                (Some(msg), Some(INVALID_CONFIGURATION_REASON.to_string()))
            },
        };
        self.0.insert(key, TypedConfigurationResource { resource, error, reason, generation });
    }
}

/// Selects the configuration resources of a workload and validates them, resolving every
/// credential they reference into the asset store.  A resource failing any check is rejected
/// as a whole; the other resources are unaffected.
///
/// One selector is used per reconciliation; it is not safe for concurrent use.
pub struct ResourceSelector<'a, W, S> {
    workload: &'a W,
    version: PrometheusVersion,
    store: &'a mut AssetStore<S>,
    namespaces: &'a dyn NamespaceLister,
}

impl<'a, W: Workload, S: SecretSource> ResourceSelector<'a, W, S> {
    pub fn new(
        workload: &'a W,
        store: &'a mut AssetStore<S>,
        namespaces: &'a dyn NamespaceLister,
    ) -> anyhow::Result<ResourceSelector<'a, W, S>> {
        let version = PrometheusVersion::from_spec(workload.common().version.as_deref())?;
        Ok(ResourceSelector { workload, version, store, namespaces })
    }

    pub fn version(&self) -> &PrometheusVersion {
        &self.version
    }

    #[instrument(skip_all, fields(workload = %self.workload.namespaced_name()))]
    pub async fn select_service_monitors(
        &mut self,
        list_fn: impl Fn(&str, &metav1::LabelSelector) -> anyhow::Result<Vec<ServiceMonitor>>,
    ) -> anyhow::Result<TypedResourcesSelection<ServiceMonitor>> {
        let cpf = self.workload.common();
        let candidates = self.list_candidates(
            cpf.service_monitor_selector.as_ref(),
            cpf.service_monitor_namespace_selector.as_ref(),
            list_fn,
        )?;

        let mut selection = TypedResourcesSelection::default();
        for (key, sm) in candidates {
            let check = self.check_service_monitor(&sm).await;
            selection.add(key, sm, check);
        }
        self.record(&selection);
        Ok(selection)
    }

    #[instrument(skip_all, fields(workload = %self.workload.namespaced_name()))]
    pub async fn select_pod_monitors(
        &mut self,
        list_fn: impl Fn(&str, &metav1::LabelSelector) -> anyhow::Result<Vec<PodMonitor>>,
    ) -> anyhow::Result<TypedResourcesSelection<PodMonitor>> {
        let cpf = self.workload.common();
        let candidates = self.list_candidates(
            cpf.pod_monitor_selector.as_ref(),
            cpf.pod_monitor_namespace_selector.as_ref(),
            list_fn,
        )?;

        let mut selection = TypedResourcesSelection::default();
        for (key, pm) in candidates {
            let check = self.check_pod_monitor(&pm).await;
            selection.add(key, pm, check);
        }
        self.record(&selection);
        Ok(selection)
    }

    #[instrument(skip_all, fields(workload = %self.workload.namespaced_name()))]
    pub async fn select_probes(
        &mut self,
        list_fn: impl Fn(&str, &metav1::LabelSelector) -> anyhow::Result<Vec<Probe>>,
    ) -> anyhow::Result<TypedResourcesSelection<Probe>> {
        let cpf = self.workload.common();
        let candidates =
            self.list_candidates(cpf.probe_selector.as_ref(), cpf.probe_namespace_selector.as_ref(), list_fn)?;

        let mut selection = TypedResourcesSelection::default();
        for (key, probe) in candidates {
            let check = self.check_probe(&probe).await;
            selection.add(key, probe, check);
        }
        self.record(&selection);
        Ok(selection)
    }

    #[instrument(skip_all, fields(workload = %self.workload.namespaced_name()))]
    pub async fn select_scrape_configs(
        &mut self,
        list_fn: impl Fn(&str, &metav1::LabelSelector) -> anyhow::Result<Vec<ScrapeConfig>>,
    ) -> anyhow::Result<TypedResourcesSelection<ScrapeConfig>> {
        let cpf = self.workload.common();
        let candidates = self.list_candidates(
            cpf.scrape_config_selector.as_ref(),
            cpf.scrape_config_namespace_selector.as_ref(),
            list_fn,
        )?;

        let mut selection = TypedResourcesSelection::default();
        for (key, sc) in candidates {
            let check = self.check_scrape_config(&sc).await;
            selection.add(key, sc, check);
        }
        self.record(&selection);
        Ok(selection)
    }

    // Without a namespace selector only the workload's own namespace is searched; objects
    // matched through several namespaces are deduplicated by `<namespace>/<name>`.
    fn list_candidates<T: ConfigResource>(
        &self,
        selector: Option<&metav1::LabelSelector>,
        ns_selector: Option<&metav1::LabelSelector>,
        list_fn: impl Fn(&str, &metav1::LabelSelector) -> anyhow::Result<Vec<T>>,
    ) -> anyhow::Result<BTreeMap<String, T>> {
        let Some(selector) = selector else {
            debug!("no {} selector, nothing selected", T::resource_name());
            return Ok(BTreeMap::new());
        };
        validate_label_selector(selector)?;

        let namespaces = match ns_selector {
            None => vec![self.workload.namespace().unwrap_or_default()],
            Some(ns_selector) => {
                validate_label_selector(ns_selector)?;
                let mut matched = vec![];
                for ns in self.namespaces.list_namespaces()? {
                    if ns.matches(ns_selector)? {
                        matched.push(ns.name_any());
                    }
                }
                matched
            },
        };
        debug!(namespaces = %namespaces.join(","), "selecting {}", T::resource_name());

        let mut objects = BTreeMap::new();
        for ns in &namespaces {
            let listed = list_fn(ns, selector).with_context(|| format!("failed to list objects in namespace {ns}"))?;
            for obj in listed {
                objects.insert(obj.namespaced_name(), obj);
            }
        }
        Ok(objects)
    }

    fn record<T: ConfigResource>(&self, selection: &TypedResourcesSelection<T>) {
        let resource = T::resource_name();
        let workload = self.workload.namespaced_name();
        let rejected = selection.rejected();
        debug!(selected = selection.len(), rejected, "selected {resource}");

        gauge!(SELECTED_RESOURCES_METRIC, "resource" => resource.clone(), "prometheus" => workload.clone())
            .set(selection.len() as f64);
        gauge!(REJECTED_RESOURCES_METRIC, "resource" => resource, "prometheus" => workload).set(rejected as f64);
    }

    async fn check_service_monitor(&mut self, sm: &ServiceMonitor) -> EmptyResult {
        let workload = self.workload;
        let cpf = workload.common();

        validate_label_selector(&sm.spec.selector)?;
        for (i, ep) in sm.spec.endpoints.iter().enumerate() {
            self.check_endpoint(cpf, sm, i, ep)
                .await
                .with_context(|| format!("endpoints[{i}]"))?;
        }

        validate_scrape_class_exists(cpf.scrape_classes.as_deref(), sm.spec.scrape_class_name.as_deref())
            .context("scrapeClassName")
    }

    async fn check_endpoint(
        &mut self,
        cpf: &CommonPrometheusFields,
        sm: &ServiceMonitor,
        i: usize,
        ep: &Endpoint,
    ) -> EmptyResult {
        let ns = sm.namespace().unwrap_or_default();
        let ctx = endpoint_context(sm, i);

        if cpf.arbitrary_fs_access_through_sms.deny {
            test_for_arbitrary_fs_access(ep.bearer_token_file.as_deref(), ep.tls_config.as_ref())?;
        }
        self.store
            .add_bearer_token(&ns, ep.bearer_token_secret.as_ref(), &AssetKey::new(AssetKind::BearerToken, &ctx))
            .await
            .context("bearerTokenSecret")?;
        self.store
            .add_basic_auth(&ns, ep.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, &ctx))
            .await
            .context("basicAuth")?;
        self.store.add_tls_config(&ns, ep.tls_config.as_ref()).await.context("tlsConfig")?;
        self.store
            .add_oauth2(&ns, ep.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, &ctx))
            .await
            .context("oauth2")?;
        self.store
            .add_safe_authorization(&ns, ep.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .context("authorization")?;

        validate_scrape_interval_and_timeout(
            cpf.scrape_interval.as_deref(),
            ep.interval.as_deref(),
            ep.scrape_timeout.as_deref(),
        )?;
        self.validate_relabelings(ep.relabelings.as_deref()).context("relabelConfigs")?;
        self.validate_relabelings(ep.metric_relabelings.as_deref())
            .context("metricRelabelConfigs")?;
        self.add_proxy(&ns, &ep.proxy, &ctx).await.context("proxyConfig")
    }

    async fn check_pod_monitor(&mut self, pm: &PodMonitor) -> EmptyResult {
        let workload = self.workload;
        let cpf = workload.common();

        validate_label_selector(&pm.spec.selector).context("failed to parse label selector")?;
        for (i, ep) in pm.spec.pod_metrics_endpoints.iter().enumerate() {
            self.check_pod_metrics_endpoint(cpf, pm, i, ep)
                .await
                .with_context(|| format!("endpoint[{i}]"))?;
        }

        validate_scrape_class_exists(cpf.scrape_classes.as_deref(), pm.spec.scrape_class_name.as_deref())
            .context("scrapeClassName")
    }

    async fn check_pod_metrics_endpoint(
        &mut self,
        cpf: &CommonPrometheusFields,
        pm: &PodMonitor,
        i: usize,
        ep: &PodMetricsEndpoint,
    ) -> EmptyResult {
        let ns = pm.namespace().unwrap_or_default();
        let ctx = endpoint_context(pm, i);

        self.store
            .add_bearer_token(&ns, ep.bearer_token_secret.as_ref(), &AssetKey::new(AssetKind::BearerToken, &ctx))
            .await
            .context("bearerTokenSecret")?;
        self.store
            .add_basic_auth(&ns, ep.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, &ctx))
            .await
            .context("basicAuth")?;
        self.store.add_safe_tls_config(&ns, ep.tls_config.as_ref()).await.context("tlsConfig")?;
        self.store
            .add_oauth2(&ns, ep.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, &ctx))
            .await
            .context("oauth2")?;
        self.store
            .add_safe_authorization(&ns, ep.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .context("authorization")?;

        validate_scrape_interval_and_timeout(
            cpf.scrape_interval.as_deref(),
            ep.interval.as_deref(),
            ep.scrape_timeout.as_deref(),
        )?;
        self.validate_relabelings(ep.relabelings.as_deref()).context("relabelConfigs")?;
        self.validate_relabelings(ep.metric_relabelings.as_deref())
            .context("metricRelabelConfigs")?;
        self.add_proxy(&ns, &ep.proxy, &ctx).await.context("proxyConfig")
    }

    async fn check_probe(&mut self, probe: &Probe) -> EmptyResult {
        let workload = self.workload;
        let cpf = workload.common();
        let ns = probe.namespace().unwrap_or_default();
        let ctx = resource_context(probe);
        let spec = &probe.spec;

        validate_scrape_class_exists(cpf.scrape_classes.as_deref(), spec.scrape_class_name.as_deref())
            .context("scrapeClassName")?;
        ensure!(
            spec.targets.static_config.is_some() || spec.targets.ingress.is_some(),
            ValidationError::invalid_service_discovery(
                "at least one of .spec.targets.staticConfig and .spec.targets.ingress is required"
            )
        );

        self.store
            .add_bearer_token(&ns, spec.bearer_token_secret.as_ref(), &AssetKey::new(AssetKind::BearerToken, &ctx))
            .await
            .context("bearerTokenSecret")?;
        self.store
            .add_basic_auth(&ns, spec.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, &ctx))
            .await
            .context("basicAuth")?;
        self.store.add_safe_tls_config(&ns, spec.tls_config.as_ref()).await.context("tlsConfig")?;
        self.store
            .add_safe_authorization(&ns, spec.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .context("authorization")?;
        self.store
            .add_oauth2(&ns, spec.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, &ctx))
            .await
            .context("oauth2")?;

        validate_scrape_interval_and_timeout(
            cpf.scrape_interval.as_deref(),
            spec.interval.as_deref(),
            spec.scrape_timeout.as_deref(),
        )?;
        self.validate_relabelings(spec.metric_relabelings.as_deref())
            .context("metricRelabelConfigs")?;
        if let Some(static_config) = &spec.targets.static_config {
            self.validate_relabelings(static_config.relabeling_configs.as_deref())
                .context("targets.staticConfig.relabelConfigs")?;
        }
        if let Some(ingress) = &spec.targets.ingress {
            validate_label_selector(&ingress.selector).context("targets.ingress.selector")?;
            self.validate_relabelings(ingress.relabeling_configs.as_deref())
                .context("targets.ingress.relabelConfigs")?;
        }

        let prober = spec.prober.clone().unwrap_or_default();
        let proxy = ProxyConfig { proxy_url: prober.proxy_url.clone(), ..Default::default() };
        self.add_proxy(&ns, &proxy, &ctx).await.context("proxy configuration")?;
        validate_prober_url(&prober.url)
    }

    fn validate_relabelings(&self, rcs: Option<&[RelabelConfig]>) -> EmptyResult {
        LabelConfigValidator::new(&self.version).validate(rcs)
    }

    async fn add_proxy(&mut self, ns: &str, proxy: &ProxyConfig, ctx: &str) -> EmptyResult {
        validate_proxy_config(proxy, &self.version)?;
        self.store
            .add_proxy_config(ns, proxy, &AssetKey::new(AssetKind::ProxyHeader, ctx))
            .await
    }
}

#[cfg(test)]
mod tests;
