use po_api::v1alpha1::HTTPClientConfig;
use serde_yaml::{
    Mapping,
    Value,
};

use super::relabel::*;
use super::yaml::*;
use super::{
    ConfigGenerator,
    limits,
};
use crate::assets::{
    AssetKind,
    Assets,
};
use crate::monitor::*;
use crate::prelude::*;
use crate::scrape_class::merge_tls;

fn sd_blocks<T>(configs: Option<&[T]>, mut render: impl FnMut(usize, &T) -> Mapping) -> Vec<Value> {
    configs
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, c)| Value::Mapping(render(i, c)))
        .collect()
}

fn filters(filters: Option<&[Filter]>) -> Option<Vec<Value>> {
    let filters = filters.filter(|f| !f.is_empty())?;
    Some(
        filters
            .iter()
            .map(|f| {
                let mut m = Mapping::new();
                m.set("name", f.name.as_str());
                m.set("values", f.values.clone());
                Value::Mapping(m)
            })
            .collect(),
    )
}

impl<W: Workload> ConfigGenerator<'_, W> {
    pub(super) fn scrape_config_job(&self, sc: &ScrapeConfig, assets: &Assets) -> Mapping {
        let ns = sc.namespace().unwrap_or_default();
        let ctx = resource_context(sc);
        let spec = &sc.spec;
        let class = self.scrape_classes.resolve(spec.scrape_class_name.as_deref());

        let mut cfg = Mapping::new();
        cfg.set("job_name", sc.namespaced_name());
        self.add_honor_settings(&mut cfg, spec.honor_labels, spec.honor_timestamps, spec.track_timestamps_staleness);

        let mut rules = vec![job_name_init()];
        rules.extend(self.class_relabelings(class));
        if let Some(job_name) = spec.job_name.as_deref().filter(|j| !j.is_empty()) {
            rules.push(set_label("job", job_name));
        }
        cfg.set("relabel_configs", self.finish_relabelings(sc, rules, spec.relabelings.as_deref()));

        cfg.set_str("metrics_path", spec.metrics_path.as_deref());
        cfg.set_str("scrape_interval", spec.scrape_interval.as_deref());
        cfg.set_str("scrape_timeout", spec.scrape_timeout.as_deref());
        self.add_scrape_protocols(
            &mut cfg,
            spec.scrape_protocols.as_deref(),
            spec.fallback_scrape_protocol.as_deref(),
            class,
        );
        if let Some(params) = spec.params.as_ref().filter(|p| !p.is_empty()) {
            cfg.set("params", params_map(params));
        }
        cfg.set_str("scheme", spec.scheme.as_deref().map(str::to_lowercase).as_deref());
        cfg.set_gated(&self.version, Feature::EnableCompression, "enable_compression", spec.enable_compression);
        add_proxy(&mut cfg, assets, &ctx, &spec.proxy, &self.version);

        add_basic_auth(&mut cfg, assets, &ctx);
        add_oauth2(&mut cfg, &ns, assets, &ctx, spec.oauth2.as_ref(), &self.version);
        self.add_scrape_authorization(&mut cfg, assets, &ctx, spec.authorization.as_ref(), class);
        let tls = spec.tls_config.clone().map(TLSConfig::from);
        add_tls_config(&mut cfg, &ns, merge_tls(tls, class).as_ref(), &self.version);

        self.add_service_discovery(&mut cfg, sc, assets);

        limits::add_limits(&mut cfg, &spec.limits, self.workload.common(), self.is_excluded(sc), &self.version);
        limits::add_native_histograms(&mut cfg, &spec.native_histograms, &self.version);
        cfg.set_seq(
            "metric_relabel_configs",
            self.metric_relabelings(sc, spec.metric_relabelings.as_deref(), class),
        );
        cfg
    }

    fn add_http_client_config(&self, cfg: &mut Mapping, ns: &str, assets: &Assets, ctx: &str, http: &HTTPClientConfig) {
        add_basic_auth(cfg, assets, ctx);
        if let Some(auth) = &http.authorization {
            add_authorization(cfg, assets, ctx, &auth.clone().into());
        }
        add_oauth2(cfg, ns, assets, ctx, http.oauth2.as_ref(), &self.version);
        add_safe_tls_config(cfg, ns, http.tls_config.as_ref(), &self.version);
        add_proxy(cfg, assets, ctx, &http.proxy, &self.version);
        cfg.set_gated(&self.version, Feature::FollowRedirects, "follow_redirects", http.follow_redirects);
        cfg.set_gated(&self.version, Feature::EnableHTTP2, "enable_http2", http.enable_http2);
    }

    // Mechanisms that need a newer Prometheus are dropped entirely when unsupported.
    fn add_sd(&self, cfg: &mut Mapping, key: &str, feature: Option<Feature>, blocks: Vec<Value>) {
        if blocks.is_empty() {
            return;
        }
        match feature {
            Some(f) => {
                self.version.insert_gated(cfg, f, key, blocks);
            },
            None => cfg.set(key, blocks),
        }
    }

    fn add_service_discovery(&self, cfg: &mut Mapping, sc: &ScrapeConfig, assets: &Assets) {
        let ns = sc.namespace().unwrap_or_default();
        let spec = &sc.spec;
        let secret = |sel: &SecretKeySelector| assets.cached_secret_key(&ns, sel);

        let static_configs = sd_blocks(spec.static_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set("targets", c.targets.clone());
            if let Some(labels) = c.labels.as_ref().filter(|l| !l.is_empty()) {
                m.set("labels", string_map(labels));
            }
            m
        });
        self.add_sd(cfg, "static_configs", None, static_configs);

        let file_sd = sd_blocks(spec.file_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set("files", c.files.clone());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m
        });
        self.add_sd(cfg, "file_sd_configs", None, file_sd);

        let http_sd = sd_blocks(spec.http_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("url", c.url.as_str());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "httpSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "http_sd_configs", Some(Feature::HTTPSD), http_sd);

        let k8s_sd = sd_blocks(spec.kubernetes_sd_configs.as_deref(), |i, c| {
            let role = c.role.to_lowercase();
            let mut m = Mapping::new();
            m.set_str("api_server", c.api_server.as_deref());
            m.set("role", role.as_str());
            if let Some(namespaces) = &c.namespaces {
                let mut n = Mapping::new();
                n.set_opt("own_namespace", namespaces.include_own_namespace);
                if let Some(names) = namespaces.names.as_ref().filter(|n| !n.is_empty()) {
                    n.set("names", names.clone());
                }
                m.set("namespaces", n);
            }
            if let Some(node) = c.attach_metadata.as_ref().and_then(|am| am.node) {
                let feature = if role == "pod" {
                    Feature::PodMonitorAttachMetadata
                } else {
                    Feature::ServiceMonitorAttachMetadata
                };
                let mut am = Mapping::new();
                am.set("node", node);
                self.version.insert_gated(&mut m, feature, "attach_metadata", am);
            }
            let selectors: Vec<Value> = c
                .selectors
                .iter()
                .flatten()
                .map(|s| {
                    let mut sel = Mapping::new();
                    sel.set("role", s.role.to_lowercase());
                    sel.set_str("label", s.label.as_deref());
                    sel.set_str("field", s.field.as_deref());
                    Value::Mapping(sel)
                })
                .collect();
            m.set_seq("selectors", selectors);
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "kubernetesSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "kubernetes_sd_configs", None, k8s_sd);

        let consul_sd = sd_blocks(spec.consul_sd_configs.as_deref(), |i, c| {
            let ctx = sd_context(sc, "consulSDConfigs", i);
            let mut m = Mapping::new();
            m.set("server", c.server.as_str());
            m.set_gated(&self.version, Feature::ConsulPathPrefix, "path_prefix", c.path_prefix.as_deref());
            m.set_opt("token", assets.bearer_token(&AssetKey::new(AssetKind::BearerToken, &ctx)));
            m.set_str("datacenter", c.datacenter.as_deref());
            m.set_gated(&self.version, Feature::ConsulNamespace, "namespace", c.namespace.as_deref());
            m.set_str("partition", c.partition.as_deref());
            m.set_str("scheme", c.scheme.as_deref());
            m.set_opt("services", c.services.clone());
            m.set_opt("tags", c.tags.clone());
            m.set_str("tag_separator", c.tag_separator.as_deref());
            if let Some(node_meta) = c.node_meta.as_ref().filter(|n| !n.is_empty()) {
                m.set("node_meta", string_map(node_meta));
            }
            m.set_opt("allow_stale", c.allow_stale);
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_gated(&self.version, Feature::ConsulFilter, "filter", c.filter.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &ctx, &c.http);
            m
        });
        self.add_sd(cfg, "consul_sd_configs", None, consul_sd);

        let dns_sd = sd_blocks(spec.dns_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set("names", c.names.clone());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_str("type", c.type_.as_deref());
            m.set_opt("port", c.port);
            m
        });
        self.add_sd(cfg, "dns_sd_configs", None, dns_sd);

        let ec2_sd = sd_blocks(spec.ec2_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set_str("region", c.region.as_deref());
            m.set_opt("access_key", c.access_key.as_ref().and_then(secret));
            m.set_opt("secret_key", c.secret_key.as_ref().and_then(secret));
            m.set_str("role_arn", c.role_arn.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_opt("port", c.port);
            m.set_opt("filters", filters(c.filters.as_deref()));
            m
        });
        self.add_sd(cfg, "ec2_sd_configs", None, ec2_sd);

        let azure_sd = sd_blocks(spec.azure_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set_str("environment", c.environment.as_deref());
            m.set_str("authentication_method", c.authentication_method.as_deref());
            m.set("subscription_id", c.subscription_id.as_str());
            m.set_str("tenant_id", c.tenant_id.as_deref());
            m.set_str("client_id", c.client_id.as_deref());
            m.set_opt("client_secret", c.client_secret.as_ref().and_then(secret));
            m.set_gated(&self.version, Feature::AzureSDResourceGroup, "resource_group", c.resource_group.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_opt("port", c.port);
            m
        });
        self.add_sd(cfg, "azure_sd_configs", None, azure_sd);

        let gce_sd = sd_blocks(spec.gce_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set("project", c.project.as_str());
            m.set("zone", c.zone.as_str());
            m.set_str("filter", c.filter.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_opt("port", c.port);
            m.set_str("tag_separator", c.tag_separator.as_deref());
            m
        });
        self.add_sd(cfg, "gce_sd_configs", None, gce_sd);

        let openstack_sd = sd_blocks(spec.openstack_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set("role", c.role.to_lowercase());
            m.set("region", c.region.as_str());
            m.set_str("identity_endpoint", c.identity_endpoint.as_deref());
            m.set_str("username", c.username.as_deref());
            m.set_str("userid", c.user_id.as_deref());
            m.set_opt("password", c.password.as_ref().and_then(secret));
            m.set_str("domain_name", c.domain_name.as_deref());
            m.set_str("domain_id", c.domain_id.as_deref());
            m.set_str("project_name", c.project_name.as_deref());
            m.set_str("project_id", c.project_id.as_deref());
            m.set_str("application_credential_name", c.application_credential_name.as_deref());
            m.set_str("application_credential_id", c.application_credential_id.as_deref());
            m.set_opt(
                "application_credential_secret",
                c.application_credential_secret.as_ref().and_then(secret),
            );
            m.set_opt("all_tenants", c.all_tenants);
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_opt("port", c.port);
            m.set_str("availability", c.availability.as_deref());
            add_safe_tls_config(&mut m, &ns, c.tls_config.as_ref(), &self.version);
            m
        });
        self.add_sd(cfg, "openstack_sd_configs", None, openstack_sd);

        let digitalocean_sd = sd_blocks(spec.digitalocean_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set_opt("port", c.port);
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "digitalOceanSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "digitalocean_sd_configs", Some(Feature::DigitalOceanSD), digitalocean_sd);

        let kuma_sd = sd_blocks(spec.kuma_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("server", c.server.as_str());
            m.set_str("client_id", c.client_id.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_str("fetch_timeout", c.fetch_timeout.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "kumaSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "kuma_sd_configs", None, kuma_sd);

        let eureka_sd = sd_blocks(spec.eureka_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("server", c.server.as_str());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "eurekaSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "eureka_sd_configs", None, eureka_sd);

        let docker_sd = sd_blocks(spec.docker_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("host", c.host.as_str());
            m.set_opt("port", c.port);
            m.set_str("host_networking_host", c.host_networking_host.as_deref());
            m.set_opt("filters", filters(c.filters.as_deref()));
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "dockerSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "docker_sd_configs", None, docker_sd);

        let linode_sd = sd_blocks(spec.linode_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set_str("region", c.region.as_deref());
            m.set_opt("port", c.port);
            m.set_str("tag_separator", c.tag_separator.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "linodeSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "linode_sd_configs", Some(Feature::LinodeSD), linode_sd);

        let hetzner_sd = sd_blocks(spec.hetzner_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("role", c.role.to_lowercase());
            m.set_opt("port", c.port);
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "hetznerSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "hetzner_sd_configs", None, hetzner_sd);

        let nomad_sd = sd_blocks(spec.nomad_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("server", c.server.as_str());
            m.set_opt("allow_stale", c.allow_stale);
            m.set_str("namespace", c.namespace.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_str("region", c.region.as_deref());
            m.set_str("tag_separator", c.tag_separator.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "nomadSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "nomad_sd_configs", None, nomad_sd);

        let dockerswarm_sd = sd_blocks(spec.dockerswarm_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("host", c.host.as_str());
            m.set("role", c.role.to_lowercase());
            m.set_opt("port", c.port);
            m.set_opt("filters", filters(c.filters.as_deref()));
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "dockerswarmSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "dockerswarm_sd_configs", Some(Feature::DockerSwarmSD), dockerswarm_sd);

        let puppetdb_sd = sd_blocks(spec.puppetdb_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("url", c.url.as_str());
            m.set("query", c.query.as_str());
            m.set_opt("include_parameters", c.include_parameters);
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_opt("port", c.port);
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "puppetDBSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "puppetdb_sd_configs", Some(Feature::PuppetDBSD), puppetdb_sd);

        let lightsail_sd = sd_blocks(spec.lightsail_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set_str("region", c.region.as_deref());
            m.set_opt("access_key", c.access_key.as_ref().and_then(secret));
            m.set_opt("secret_key", c.secret_key.as_ref().and_then(secret));
            m.set_str("role_arn", c.role_arn.as_deref());
            m.set_str("endpoint", c.endpoint.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m.set_opt("port", c.port);
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "lightSailSDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "lightsail_sd_configs", Some(Feature::LightSailSD), lightsail_sd);

        let ovhcloud_sd = sd_blocks(spec.ovhcloud_sd_configs.as_deref(), |_, c| {
            let mut m = Mapping::new();
            m.set("application_key", c.application_key.as_str());
            m.set_opt("application_secret", secret(&c.application_secret));
            m.set_opt("consumer_key", secret(&c.consumer_key));
            m.set("service", c.service.to_lowercase());
            m.set_str("endpoint", c.endpoint.as_deref());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            m
        });
        self.add_sd(cfg, "ovhcloud_sd_configs", Some(Feature::OVHCloudSD), ovhcloud_sd);

        let scaleway_sd = sd_blocks(spec.scaleway_sd_configs.as_deref(), |i, c| {
            let mut m = Mapping::new();
            m.set("access_key", c.access_key.as_str());
            m.set_opt("secret_key", secret(&c.secret_key));
            m.set("project_id", c.project_id.as_str());
            m.set("role", c.role.to_lowercase());
            m.set_opt("port", c.port);
            m.set_str("api_url", c.api_url.as_deref());
            m.set_str("zone", c.zone.as_deref());
            m.set_str("name_filter", c.name_filter.as_deref());
            m.set_opt("tags_filter", c.tags_filter.clone());
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            self.add_http_client_config(&mut m, &ns, assets, &sd_context(sc, "ScalewaySDConfigs", i), &c.http);
            m
        });
        self.add_sd(cfg, "scaleway_sd_configs", Some(Feature::ScalewaySD), scaleway_sd);

        let ionos_sd = sd_blocks(spec.ionos_sd_configs.as_deref(), |i, c| {
            let ctx = sd_context(sc, "IonosSDConfigs", i);
            let mut m = Mapping::new();
            m.set("datacenter_id", c.datacenter_id.as_str());
            add_authorization(&mut m, assets, &ctx, &c.authorization.clone().into());
            m.set_opt("port", c.port);
            m.set_str("refresh_interval", c.refresh_interval.as_deref());
            add_safe_tls_config(&mut m, &ns, c.tls_config.as_ref(), &self.version);
            add_proxy(&mut m, assets, &ctx, &c.proxy, &self.version);
            m.set_gated(&self.version, Feature::FollowRedirects, "follow_redirects", c.follow_redirects);
            m.set_gated(&self.version, Feature::EnableHTTP2, "enable_http2", c.enable_http2);
            m
        });
        self.add_sd(cfg, "ionos_sd_configs", Some(Feature::IonosSD), ionos_sd);
    }
}
