use po_api::v1alpha1::HTTPClientConfig;
use url::Url;

use super::*;

const K8S_ROLES: &str = "pod, service, endpoints, endpointslice, node or ingress";
const FILE_SD_EXTENSIONS: &[&str] = &[".json", ".yml", ".yaml"];

// Which selector roles each Kubernetes SD role accepts.
fn allowed_selector_roles(role: &str) -> Option<&'static [&'static str]> {
    match role {
        "pod" => Some(&["pod"]),
        "service" => Some(&["service"]),
        "endpointslice" => Some(&["pod", "service", "endpointslice"]),
        "endpoints" => Some(&["pod", "service", "endpoints"]),
        "node" => Some(&["node"]),
        "ingress" => Some(&["ingress"]),
        _ => None,
    }
}

impl<W: Workload, S: SecretSource> ResourceSelector<'_, W, S> {
    pub(super) async fn check_scrape_config(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let workload = self.workload;
        let cpf = workload.common();
        let ns = sc.namespace().unwrap_or_default();
        let ctx = resource_context(sc);
        let spec = &sc.spec;

        validate_scrape_class_exists(cpf.scrape_classes.as_deref(), spec.scrape_class_name.as_deref())
            .context("scrapeClassName")?;
        self.validate_relabelings(spec.relabelings.as_deref()).context("relabelConfigs")?;

        self.store
            .add_basic_auth(&ns, spec.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, &ctx))
            .await
            .context("basicAuth")?;
        self.store
            .add_safe_authorization(&ns, spec.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, &ctx))
            .await
            .context("authorization")?;
        self.store
            .add_oauth2(&ns, spec.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, &ctx))
            .await
            .context("oauth2")?;
        self.store.add_safe_tls_config(&ns, spec.tls_config.as_ref()).await.context("tlsConfig")?;

        validate_scrape_interval_and_timeout(
            cpf.scrape_interval.as_deref(),
            spec.scrape_interval.as_deref(),
            spec.scrape_timeout.as_deref(),
        )?;
        self.add_proxy(&ns, &spec.proxy, &ctx).await?;
        self.validate_relabelings(spec.metric_relabelings.as_deref())
            .context("metricRelabelConfigs")?;

        validate_static_configs(sc).context("staticConfigs")?;
        validate_file_sd_configs(sc).context("fileSDConfigs")?;
        self.validate_http_sd_configs(sc).await.context("httpSDConfigs")?;
        self.validate_kubernetes_sd_configs(sc).await.context("kubernetesSDConfigs")?;
        self.validate_consul_sd_configs(sc).await.context("consulSDConfigs")?;
        validate_dns_sd_configs(sc).context("dnsSDConfigs")?;
        self.validate_ec2_sd_configs(sc).await.context("ec2SDConfigs")?;
        self.validate_azure_sd_configs(sc).await.context("azureSDConfigs")?;
        self.validate_openstack_sd_configs(sc).await.context("openstackSDConfigs")?;
        self.validate_digitalocean_sd_configs(sc).await.context("digitalOceanSDConfigs")?;
        self.validate_kuma_sd_configs(sc).await.context("kumaSDConfigs")?;
        self.validate_eureka_sd_configs(sc).await.context("eurekaSDConfigs")?;
        self.validate_docker_sd_configs(sc).await.context("dockerSDConfigs")?;
        self.validate_linode_sd_configs(sc).await.context("linodeSDConfigs")?;
        self.validate_hetzner_sd_configs(sc).await.context("hetznerSDConfigs")?;
        self.validate_nomad_sd_configs(sc).await.context("nomadSDConfigs")?;
        self.validate_dockerswarm_sd_configs(sc).await.context("dockerswarmSDConfigs")?;
        self.validate_puppetdb_sd_configs(sc).await.context("puppetDBSDConfigs")?;
        self.validate_lightsail_sd_configs(sc).await.context("lightSailSDConfigs")?;
        self.validate_ovhcloud_sd_configs(sc).await.context("OVHCloudSDConfigs")?;
        self.validate_scaleway_sd_configs(sc).await.context("ScalewaySDConfigs")?;
        self.validate_ionos_sd_configs(sc).await.context("IonosSDConfigs")?;
        Ok(())
    }

    fn require(&self, feature: Feature, what: &str) -> EmptyResult {
        ensure!(
            self.version.supports(feature),
            ValidationError::unsupported_feature(&format!(
                "{what} is only supported for Prometheus version >= {}",
                PrometheusVersion::minimum_for(feature)
            ))
        );
        Ok(())
    }

    async fn add_http_client_config(&mut self, ns: &str, http: &HTTPClientConfig, ctx: &str) -> EmptyResult {
        self.store
            .add_basic_auth(ns, http.basic_auth.as_ref(), &AssetKey::new(AssetKind::BasicAuth, ctx))
            .await?;
        self.store
            .add_safe_authorization(ns, http.authorization.as_ref(), &AssetKey::new(AssetKind::Authorization, ctx))
            .await?;
        self.store
            .add_oauth2(ns, http.oauth2.as_ref(), &AssetKey::new(AssetKind::OAuth2, ctx))
            .await?;
        self.store.add_safe_tls_config(ns, http.tls_config.as_ref()).await?;
        self.add_proxy(ns, &http.proxy, ctx).await
    }

    async fn validate_http_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.http_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::HTTPSD, "HTTP SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            Url::parse(&cfg.url).with_context(|| format!("[{i}]"))?;
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "httpSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_kubernetes_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.kubernetes_sd_configs.iter().flatten().enumerate() {
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "kubernetesSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
            check_kubernetes_sd_config(cfg).with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_consul_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.consul_sd_configs.iter().flatten().enumerate() {
            if cfg.path_prefix.is_some() {
                self.require(Feature::ConsulPathPrefix, "field `config.PathPrefix`")?;
            }
            if cfg.namespace.is_some() {
                self.require(Feature::ConsulNamespace, "field `config.Namespace`")?;
            }
            if cfg.filter.is_some() {
                self.require(Feature::ConsulFilter, "field `config.Filter`")?;
            }

            let ctx = sd_context(sc, "consulSDConfigs", i);
            self.add_http_client_config(&ns, &cfg.http, &ctx)
                .await
                .with_context(|| format!("[{i}]"))?;
            self.store
                .add_bearer_token(&ns, cfg.token_ref.as_ref(), &AssetKey::new(AssetKind::BearerToken, &ctx))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_ec2_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.ec2_sd_configs.iter().flatten().enumerate() {
            for sel in [&cfg.access_key, &cfg.secret_key].into_iter().flatten() {
                self.store
                    .get_secret_key(&ns, sel)
                    .await
                    .with_context(|| format!("[{i}]"))?;
            }
        }
        Ok(())
    }

    async fn validate_azure_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.azure_sd_configs.iter().flatten().enumerate() {
            let method = cfg.authentication_method.as_deref().unwrap_or_default();
            if method == "SDK" {
                self.require(Feature::AzureSDSDKAuthentication, "SDK authentication")
                    .with_context(|| format!("[{i}]"))?;
            }
            if cfg.resource_group.is_some() {
                self.require(Feature::AzureSDResourceGroup, "ResourceGroup")
                    .with_context(|| format!("[{i}]"))?;
            }

            // OAuth is the default authentication method
            if method == "ManagedIdentity" || method == "SDK" {
                continue;
            }

            let missing = |field: &str| {
                ValidationError::invalid_service_discovery(&format!("[{i}]: configuration requires a {field}"))
            };
            if cfg.tenant_id.as_deref().unwrap_or_default().is_empty() {
                bail!(missing("tenantID"));
            }
            if cfg.client_id.as_deref().unwrap_or_default().is_empty() {
                bail!(missing("clientID"));
            }
            let Some(secret) = &cfg.client_secret else {
                bail!(missing("clientSecret"));
            };
            self.store.get_secret_key(&ns, secret).await.with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_openstack_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.openstack_sd_configs.iter().flatten().enumerate() {
            if cfg.role.eq_ignore_ascii_case("loadbalancer") {
                self.require(Feature::OpenStackLoadBalancerRole, "The loadbalancer role")
                    .with_context(|| format!("[{i}]"))?;
            }
            for sel in [&cfg.password, &cfg.application_credential_secret].into_iter().flatten() {
                self.store
                    .get_secret_key(&ns, sel)
                    .await
                    .with_context(|| format!("[{i}]"))?;
            }
            self.store
                .add_safe_tls_config(&ns, cfg.tls_config.as_ref())
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_digitalocean_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.digitalocean_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::DigitalOceanSD, "service discovery for Digital Ocean")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "digitalOceanSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_kuma_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.kuma_sd_configs.iter().flatten().enumerate() {
            validate_server(&cfg.server).with_context(|| format!("[{i}]"))?;
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "kumaSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_eureka_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.eureka_sd_configs.iter().flatten().enumerate() {
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "eurekaSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_docker_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.docker_sd_configs.iter().flatten().enumerate() {
            Url::parse(&cfg.host).with_context(|| format!("[{i}]"))?;
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "dockerSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_linode_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.linode_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::LinodeSD, "linode SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "linodeSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_hetzner_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.hetzner_sd_configs.iter().flatten().enumerate() {
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "hetznerSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_nomad_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        for (i, cfg) in sc.spec.nomad_sd_configs.iter().flatten().enumerate() {
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "nomadSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_dockerswarm_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.dockerswarm_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::DockerSwarmSD, "dockerswarm SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            Url::parse(&cfg.host).with_context(|| format!("[{i}]"))?;
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "dockerswarmSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_puppetdb_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.puppetdb_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::PuppetDBSD, "puppetDB SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            let url = Url::parse(&cfg.url).with_context(|| format!("[{i}]"))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                bail!(ValidationError::invalid_service_discovery(&format!(
                    "[{i}]: URL scheme must be 'http' or 'https'"
                )));
            }
            if url.host_str().unwrap_or_default().is_empty() {
                bail!(ValidationError::invalid_service_discovery(&format!("[{i}]: host is missing in URL")));
            }
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "puppetDBSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_lightsail_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.lightsail_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::LightSailSD, "lightSail SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            for sel in [&cfg.access_key, &cfg.secret_key].into_iter().flatten() {
                self.store
                    .get_secret_key(&ns, sel)
                    .await
                    .with_context(|| format!("[{i}]"))?;
            }
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "lightSailSDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_ovhcloud_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.ovhcloud_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::OVHCloudSD, "OVHCloud SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            for sel in [&cfg.application_secret, &cfg.consumer_key] {
                self.store
                    .get_secret_key(&ns, sel)
                    .await
                    .with_context(|| format!("[{i}]"))?;
            }
        }
        Ok(())
    }

    async fn validate_scaleway_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.scaleway_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::ScalewaySD, "ScaleWay SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            self.store
                .get_secret_key(&ns, &cfg.secret_key)
                .await
                .with_context(|| format!("[{i}]"))?;
            self.add_http_client_config(&ns, &cfg.http, &sd_context(sc, "ScalewaySDConfigs", i))
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }

    async fn validate_ionos_sd_configs(&mut self, sc: &ScrapeConfig) -> EmptyResult {
        let ns = sc.namespace().unwrap_or_default();
        let configs = sc.spec.ionos_sd_configs.as_deref().unwrap_or_default();
        if !configs.is_empty() {
            self.require(Feature::IonosSD, "IONOS SD configuration")?;
        }

        for (i, cfg) in configs.iter().enumerate() {
            let ctx = sd_context(sc, "IonosSDConfigs", i);
            self.store
                .add_safe_authorization(&ns, Some(&cfg.authorization), &AssetKey::new(AssetKind::Authorization, &ctx))
                .await
                .with_context(|| format!("[{i}]"))?;
            self.add_proxy(&ns, &cfg.proxy, &ctx).await.with_context(|| format!("[{i}]"))?;
            self.store
                .add_safe_tls_config(&ns, cfg.tls_config.as_ref())
                .await
                .with_context(|| format!("[{i}]"))?;
        }
        Ok(())
    }
}

fn validate_static_configs(sc: &ScrapeConfig) -> EmptyResult {
    for (i, cfg) in sc.spec.static_configs.iter().flatten().enumerate() {
        for name in cfg.labels.iter().flatten().map(|(k, _)| k) {
            if !is_valid_label_name(name) {
                bail!(ValidationError::invalid_label(&format!("[{i}]: invalid label in map {name}")));
            }
        }
    }
    Ok(())
}

fn validate_file_sd_configs(sc: &ScrapeConfig) -> EmptyResult {
    for (i, cfg) in sc.spec.file_sd_configs.iter().flatten().enumerate() {
        for file in &cfg.files {
            if !FILE_SD_EXTENSIONS.iter().any(|ext| file.ends_with(ext)) {
                bail!(ValidationError::invalid_service_discovery(&format!(
                    "[{i}]: path {file:?} is not valid for file discovery, it must end in .json, .yml or .yaml"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dns_sd_configs(sc: &ScrapeConfig) -> EmptyResult {
    for (i, cfg) in sc.spec.dns_sd_configs.iter().flatten().enumerate() {
        if let Some(record_type) = &cfg.type_
            && record_type != "SRV"
            && cfg.port.is_none()
        {
            bail!(ValidationError::invalid_service_discovery(&format!(
                "[{i}]: port required for record type {record_type:?}"
            )));
        }
    }
    Ok(())
}

fn check_kubernetes_sd_config(cfg: &KubernetesSDConfig) -> EmptyResult {
    if cfg.api_server.is_some()
        && cfg.namespaces.as_ref().and_then(|n| n.include_own_namespace).unwrap_or_default()
    {
        bail!(ValidationError::invalid_service_discovery(
            "cannot use 'apiServer' and 'namespaces.ownNamespace' simultaneously"
        ));
    }

    let role = cfg.role.to_lowercase();
    for selector in cfg.selectors.iter().flatten() {
        let Some(allowed) = allowed_selector_roles(&role) else {
            bail!(ValidationError::invalid_service_discovery(&format!(
                "invalid role: {:?}, expecting one of: {K8S_ROLES}",
                cfg.role
            )));
        };
        if !allowed.contains(&selector.role.to_lowercase().as_str()) {
            bail!(ValidationError::invalid_service_discovery(&format!(
                "{} role supports only {} selectors",
                cfg.role,
                allowed.join(", ")
            )));
        }
    }
    Ok(())
}
