use kube::Resource;

use crate::prelude::*;

/// A workload that runs Prometheus and consumes configuration resources: Prometheus or
/// PrometheusAgent.
pub trait Workload: Resource<DynamicType = ()> {
    fn common(&self) -> &CommonPrometheusFields;

    /// The server-only fields; agents have none.
    fn server(&self) -> Option<&PrometheusSpec> {
        None
    }
}

impl Workload for Prometheus {
    fn common(&self) -> &CommonPrometheusFields {
        &self.spec.common
    }

    fn server(&self) -> Option<&PrometheusSpec> {
        Some(&self.spec)
    }
}

impl Workload for PrometheusAgent {
    fn common(&self) -> &CommonPrometheusFields {
        &self.spec.common
    }
}

/// A resource describing what and how to scrape: ServiceMonitor, PodMonitor, Probe or
/// ScrapeConfig.
pub trait ConfigResource: Resource<DynamicType = ()> + Clone {
    /// Prefix of job names and credential keys, e.g. `serviceMonitor`.
    const KIND_KEY: &'static str;

    fn scrape_class_name(&self) -> Option<&str>;
    fn bindings(&self) -> &[WorkloadBinding];

    fn resource_name() -> String {
        Self::plural(&()).into_owned()
    }
}

macro_rules! config_resource {
    ($kind:ident, $key:literal) => {
        impl ConfigResource for $kind {
            const KIND_KEY: &'static str = $key;

            fn scrape_class_name(&self) -> Option<&str> {
                self.spec.scrape_class_name.as_deref()
            }

            fn bindings(&self) -> &[WorkloadBinding] {
                self.status.as_ref().map(|s| s.bindings.as_slice()).unwrap_or_default()
            }
        }
    };
}

config_resource!(ServiceMonitor, "serviceMonitor");
config_resource!(PodMonitor, "podMonitor");
config_resource!(Probe, "probe");
config_resource!(ScrapeConfig, "scrapeConfig");

/// Credential key prefix for a whole resource, e.g. `probe/default/blackbox`.
pub fn resource_context<T: ConfigResource>(obj: &T) -> String {
    format!("{}/{}", T::KIND_KEY, obj.namespaced_name())
}

/// Credential key prefix for one endpoint of a resource, e.g. `serviceMonitor/default/app/0`.
pub fn endpoint_context<T: ConfigResource>(obj: &T, index: usize) -> String {
    format!("{}/{index}", resource_context(obj))
}

/// Credential key prefix for one service discovery block of a ScrapeConfig.
pub fn sd_context(sc: &ScrapeConfig, mechanism: &str, index: usize) -> String {
    format!("{}/{mechanism}/{index}", resource_context(sc))
}
