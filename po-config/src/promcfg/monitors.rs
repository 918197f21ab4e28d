use po_api::IntOrString;
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
use crate::assets::Assets;
use crate::monitor::*;
use crate::prelude::*;
use crate::scrape_class::merge_tls;

const SERVICE_META: &str = "__meta_kubernetes_service";
const POD_META: &str = "__meta_kubernetes_pod";
const INGRESS_META: &str = "__meta_kubernetes_ingress";

impl<W: Workload> ConfigGenerator<'_, W> {
    pub(super) fn service_monitor_job(&self, sm: &ServiceMonitor, i: usize, ep: &Endpoint, assets: &Assets) -> Mapping {
        let ns = sm.namespace().unwrap_or_default();
        let ctx = endpoint_context(sm, i);
        let spec = &sm.spec;
        let class = self.scrape_classes.resolve(spec.scrape_class_name.as_deref());

        let mut cfg = Mapping::new();
        cfg.set("job_name", format!("{}/{i}", sm.namespaced_name()));
        self.add_honor_settings(
            &mut cfg,
            Some(ep.honor_labels.unwrap_or_default()),
            ep.honor_timestamps,
            ep.track_timestamps_staleness,
        );

        let role = self.discovery_role(spec.service_discovery_role.as_deref());
        let attach_metadata = spec.attach_metadata.as_ref().or(class.and_then(|c| c.attach_metadata.as_ref()));
        cfg.set(
            "kubernetes_sd_configs",
            self.k8s_sd_config(
                role,
                self.sd_namespaces(&ns, &spec.namespace_selector),
                attach_metadata.map(|am| (am, Feature::ServiceMonitorAttachMetadata)),
                assets,
            ),
        );

        cfg.set_str("scrape_interval", ep.interval.as_deref());
        cfg.set_str("scrape_timeout", ep.scrape_timeout.as_deref());
        self.add_scrape_protocols(
            &mut cfg,
            spec.scrape_protocols.as_deref(),
            spec.fallback_scrape_protocol.as_deref(),
            class,
        );
        cfg.set_str("metrics_path", ep.path.as_deref());
        add_proxy(&mut cfg, assets, &ctx, &ep.proxy, &self.version);
        if let Some(params) = ep.params.as_ref().filter(|p| !p.is_empty()) {
            cfg.set("params", params_map(params));
        }
        cfg.set_str("scheme", ep.scheme.as_deref().map(str::to_lowercase).as_deref());
        cfg.set_gated(&self.version, Feature::FollowRedirects, "follow_redirects", ep.follow_redirects);
        cfg.set_gated(&self.version, Feature::EnableHTTP2, "enable_http2", ep.enable_http2);

        add_tls_config(&mut cfg, &ns, merge_tls(ep.tls_config.clone(), class).as_ref(), &self.version);
        cfg.set_str("bearer_token_file", ep.bearer_token_file.as_deref());
        add_basic_auth(&mut cfg, assets, &ctx);
        add_oauth2(&mut cfg, &ns, assets, &ctx, ep.oauth2.as_ref(), &self.version);
        self.add_scrape_authorization(&mut cfg, assets, &ctx, ep.authorization.as_ref(), class);

        cfg.set("relabel_configs", self.service_monitor_relabelings(sm, ep, role, class));
        limits::add_limits(&mut cfg, &spec.limits, self.workload.common(), self.is_excluded(sm), &self.version);
        limits::add_native_histograms(&mut cfg, &spec.native_histograms, &self.version);
        cfg.set_seq(
            "metric_relabel_configs",
            self.metric_relabelings(sm, ep.metric_relabelings.as_deref(), class),
        );
        cfg
    }

    fn service_monitor_relabelings(
        &self,
        sm: &ServiceMonitor,
        ep: &Endpoint,
        role: &str,
        class: Option<&ScrapeClass>,
    ) -> Vec<Value> {
        let spec = &sm.spec;
        // The job label is captured before any class rule can rewrite it
        let mut rules = vec![job_name_init()];
        rules.extend(self.class_relabelings(class));
        rules.extend(selector_rules(SERVICE_META, &spec.selector));

        let endpoint_meta = format!("__meta_kubernetes_{role}");
        if let Some(port) = ep.port.as_deref().filter(|p| !p.is_empty()) {
            rules.push(keep(&[format!("{endpoint_meta}_port_name").as_str()], port));
        } else if let Some(target_port) = &ep.target_port {
            rules.push(container_port_rule(target_port));
        }

        let kind_label = format!("{endpoint_meta}_address_target_kind");
        let name_label = format!("{endpoint_meta}_address_target_name");
        rules.push(target_kind(&kind_label, &name_label, "Node", "node"));
        rules.push(target_kind(&kind_label, &name_label, "Pod", "pod"));
        rules.push(copy_to(&["__meta_kubernetes_namespace"], "namespace"));
        rules.push(copy_to(&["__meta_kubernetes_service_name"], "service"));
        rules.push(copy_to(&["__meta_kubernetes_pod_name"], "pod"));
        rules.push(copy_to(&["__meta_kubernetes_pod_container_name"], "container"));
        if ep.filter_running.unwrap_or(true) {
            rules.push(drop_matching(&["__meta_kubernetes_pod_phase"], "(Failed|Succeeded)"));
        }

        for label in spec.target_labels.iter().flatten() {
            let source = format!("{SERVICE_META}_label_{}", sanitize_label_name(label));
            rules.push(copy_if_set(&source, &sanitize_label_name(label)));
        }
        for label in spec.pod_target_labels.iter().flatten() {
            let source = format!("{POD_META}_label_{}", sanitize_label_name(label));
            rules.push(copy_if_set(&source, &sanitize_label_name(label)));
        }

        rules.push(RelabelConfig {
            replacement: Some("${1}".into()),
            ..copy_to(&["__meta_kubernetes_service_name"], "job")
        });
        if let Some(job_label) = spec.job_label.as_deref().filter(|l| !l.is_empty()) {
            let source = format!("{SERVICE_META}_label_{}", sanitize_label_name(job_label));
            rules.push(copy_if_set(&source, "job"));
        }

        if let Some(port) = ep.port.as_deref().filter(|p| !p.is_empty()) {
            rules.push(set_label("endpoint", port));
        } else if let Some(target_port) = &ep.target_port {
            rules.push(set_label("endpoint", int_or_string(target_port)));
        }

        self.finish_relabelings(sm, rules, ep.relabelings.as_deref())
    }

    pub(super) fn pod_monitor_job(
        &self,
        pm: &PodMonitor,
        i: usize,
        ep: &PodMetricsEndpoint,
        assets: &Assets,
    ) -> Mapping {
        let ns = pm.namespace().unwrap_or_default();
        let ctx = endpoint_context(pm, i);
        let spec = &pm.spec;
        let class = self.scrape_classes.resolve(spec.scrape_class_name.as_deref());

        let mut cfg = Mapping::new();
        cfg.set("job_name", format!("{}/{i}", pm.namespaced_name()));
        self.add_honor_settings(
            &mut cfg,
            Some(ep.honor_labels.unwrap_or_default()),
            ep.honor_timestamps,
            ep.track_timestamps_staleness,
        );

        let attach_metadata = spec.attach_metadata.as_ref().or(class.and_then(|c| c.attach_metadata.as_ref()));
        cfg.set(
            "kubernetes_sd_configs",
            self.k8s_sd_config(
                "pod",
                self.sd_namespaces(&ns, &spec.namespace_selector),
                attach_metadata.map(|am| (am, Feature::PodMonitorAttachMetadata)),
                assets,
            ),
        );

        cfg.set_str("scrape_interval", ep.interval.as_deref());
        cfg.set_str("scrape_timeout", ep.scrape_timeout.as_deref());
        self.add_scrape_protocols(
            &mut cfg,
            spec.scrape_protocols.as_deref(),
            spec.fallback_scrape_protocol.as_deref(),
            class,
        );
        cfg.set_str("metrics_path", ep.path.as_deref());
        add_proxy(&mut cfg, assets, &ctx, &ep.proxy, &self.version);
        if let Some(params) = ep.params.as_ref().filter(|p| !p.is_empty()) {
            cfg.set("params", params_map(params));
        }
        cfg.set_str("scheme", ep.scheme.as_deref().map(str::to_lowercase).as_deref());
        cfg.set_gated(&self.version, Feature::FollowRedirects, "follow_redirects", ep.follow_redirects);
        cfg.set_gated(&self.version, Feature::EnableHTTP2, "enable_http2", ep.enable_http2);

        let tls = ep.tls_config.clone().map(TLSConfig::from);
        add_tls_config(&mut cfg, &ns, merge_tls(tls, class).as_ref(), &self.version);
        add_basic_auth(&mut cfg, assets, &ctx);
        add_oauth2(&mut cfg, &ns, assets, &ctx, ep.oauth2.as_ref(), &self.version);
        self.add_scrape_authorization(&mut cfg, assets, &ctx, ep.authorization.as_ref(), class);

        cfg.set("relabel_configs", self.pod_monitor_relabelings(pm, ep, class));
        limits::add_limits(&mut cfg, &spec.limits, self.workload.common(), self.is_excluded(pm), &self.version);
        limits::add_native_histograms(&mut cfg, &spec.native_histograms, &self.version);
        cfg.set_seq(
            "metric_relabel_configs",
            self.metric_relabelings(pm, ep.metric_relabelings.as_deref(), class),
        );
        cfg
    }

    fn pod_monitor_relabelings(&self, pm: &PodMonitor, ep: &PodMetricsEndpoint, class: Option<&ScrapeClass>) -> Vec<Value> {
        let spec = &pm.spec;
        let mut rules = vec![job_name_init()];
        rules.extend(self.class_relabelings(class));
        rules.extend(selector_rules(POD_META, &spec.selector));

        let endpoint_label = if let Some(port) = ep.port.as_deref().filter(|p| !p.is_empty()) {
            rules.push(keep(&["__meta_kubernetes_pod_container_port_name"], port));
            Some(port.to_string())
        } else if let Some(port) = ep.port_number {
            rules.push(keep(&["__meta_kubernetes_pod_container_port_number"], port.to_string()));
            Some(port.to_string())
        } else if let Some(target_port) = &ep.target_port {
            rules.push(container_port_rule(target_port));
            Some(int_or_string(target_port))
        } else {
            None
        };

        if ep.filter_running.unwrap_or(true) {
            rules.push(drop_matching(&["__meta_kubernetes_pod_phase"], "(Failed|Succeeded)"));
        }
        rules.push(copy_to(&["__meta_kubernetes_namespace"], "namespace"));
        rules.push(copy_to(&["__meta_kubernetes_pod_container_name"], "container"));
        rules.push(copy_to(&["__meta_kubernetes_pod_name"], "pod"));

        for label in spec.pod_target_labels.iter().flatten() {
            let source = format!("{POD_META}_label_{}", sanitize_label_name(label));
            rules.push(copy_if_set(&source, &sanitize_label_name(label)));
        }

        rules.push(set_label("job", pm.namespaced_name()));
        if let Some(job_label) = spec.job_label.as_deref().filter(|l| !l.is_empty()) {
            let source = format!("{POD_META}_label_{}", sanitize_label_name(job_label));
            rules.push(copy_if_set(&source, "job"));
        }
        if let Some(endpoint) = endpoint_label {
            rules.push(set_label("endpoint", endpoint));
        }

        self.finish_relabelings(pm, rules, ep.relabelings.as_deref())
    }

    pub(super) fn probe_job(&self, probe: &Probe, assets: &Assets) -> Mapping {
        let ns = probe.namespace().unwrap_or_default();
        let ctx = resource_context(probe);
        let spec = &probe.spec;
        let class = self.scrape_classes.resolve(spec.scrape_class_name.as_deref());
        let prober = spec.prober.clone().unwrap_or_default();

        let mut cfg = Mapping::new();
        cfg.set("job_name", probe.namespaced_name());
        self.add_honor_settings(&mut cfg, None, None, None);

        cfg.set_str("scrape_interval", spec.interval.as_deref());
        cfg.set_str("scrape_timeout", spec.scrape_timeout.as_deref());
        self.add_scrape_protocols(
            &mut cfg,
            spec.scrape_protocols.as_deref(),
            spec.fallback_scrape_protocol.as_deref(),
            class,
        );
        cfg.set(
            "metrics_path",
            prober.path.as_deref().filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PROBE_PATH),
        );
        cfg.set_str("scheme", prober.scheme.as_deref());

        let mut params = spec.params.clone().unwrap_or_default();
        if let Some(module) = spec.module.as_deref().filter(|m| !m.is_empty()) {
            params.insert("module".into(), vec![module.into()]);
        }
        if !params.is_empty() {
            cfg.set("params", params_map(&params));
        }

        let proxy = ProxyConfig { proxy_url: prober.proxy_url.clone(), ..Default::default() };
        add_proxy(&mut cfg, assets, &ctx, &proxy, &self.version);

        let mut rules = vec![job_name_init()];
        rules.extend(self.class_relabelings(class));
        if let Some(job_name) = spec.job_name.as_deref().filter(|j| !j.is_empty()) {
            rules.push(set_label("job", job_name));
        }

        let user_rules = if let Some(static_config) = &spec.targets.static_config {
            let mut labels = static_config.labels.clone().unwrap_or_default();
            labels.entry("namespace".into()).or_insert_with(|| ns.clone());

            let mut target_group = Mapping::new();
            target_group.set("targets", static_config.targets.clone());
            target_group.set("labels", string_map(&labels));
            cfg.set("static_configs", vec![Value::Mapping(target_group)]);

            rules.push(copy_to(&["__address__"], "__param_target"));
            rules.push(copy_to(&["__param_target"], "instance"));
            rules.push(set_label("__address__", prober.url.as_str()));
            static_config.relabeling_configs.as_deref()
        } else if let Some(ingress) = &spec.targets.ingress {
            cfg.set(
                "kubernetes_sd_configs",
                self.k8s_sd_config("ingress", self.sd_namespaces(&ns, &ingress.namespace_selector), None, assets),
            );

            rules.extend(selector_rules(INGRESS_META, &ingress.selector));
            rules.push(RelabelConfig {
                source_labels: Some(vec![
                    "__meta_kubernetes_ingress_scheme".into(),
                    "__address__".into(),
                    "__meta_kubernetes_ingress_path".into(),
                ]),
                separator: Some(";".into()),
                regex: Some("(.+);(.+);(.+)".into()),
                target_label: Some("__param_target".into()),
                replacement: Some("${1}://${2}${3}".into()),
                ..Default::default()
            });
            rules.push(copy_to(&["__meta_kubernetes_namespace"], "namespace"));
            rules.push(copy_to(&["__meta_kubernetes_ingress_name"], "ingress"));
            rules.extend(ingress.relabeling_configs.iter().flatten().cloned());
            rules.push(copy_to(&["__param_target"], "instance"));
            rules.push(set_label("__address__", prober.url.as_str()));
            None
        } else {
            None
        };

        let tls = spec.tls_config.clone().map(TLSConfig::from);
        add_tls_config(&mut cfg, &ns, merge_tls(tls, class).as_ref(), &self.version);
        add_basic_auth(&mut cfg, assets, &ctx);
        add_oauth2(&mut cfg, &ns, assets, &ctx, spec.oauth2.as_ref(), &self.version);
        self.add_scrape_authorization(&mut cfg, assets, &ctx, spec.authorization.as_ref(), class);

        cfg.set("relabel_configs", self.finish_relabelings(probe, rules, user_rules));
        limits::add_limits(&mut cfg, &spec.limits, self.workload.common(), self.is_excluded(probe), &self.version);
        limits::add_native_histograms(&mut cfg, &spec.native_histograms, &self.version);
        cfg.set_seq(
            "metric_relabel_configs",
            self.metric_relabelings(probe, spec.metric_relabelings.as_deref(), class),
        );
        cfg
    }
}

fn int_or_string(port: &IntOrString) -> String {
    match port {
        IntOrString::Int(n) => n.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

fn container_port_rule(target_port: &IntOrString) -> RelabelConfig {
    match target_port {
        IntOrString::Int(n) => keep(&["__meta_kubernetes_pod_container_port_number"], n.to_string()),
        IntOrString::String(s) => keep(&["__meta_kubernetes_pod_container_port_name"], s.as_str()),
    }
}
