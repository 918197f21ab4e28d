use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::Api;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use tracing::*;

use crate::prelude::*;

/// Where the asset store reads Secrets and ConfigMaps from.  `None` means the object does not
/// exist; errors are reserved for failures talking to the backend.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait SecretSource {
    async fn get_secret(&self, ns: &str, name: &str) -> anyhow::Result<Option<corev1::Secret>>;
    async fn get_config_map(&self, ns: &str, name: &str) -> anyhow::Result<Option<corev1::ConfigMap>>;
}

pub struct KubeSecretSource {
    client: kube::Client,
}

impl KubeSecretSource {
    pub fn new(client: kube::Client) -> KubeSecretSource {
        KubeSecretSource { client }
    }
}

#[async_trait]
impl SecretSource for KubeSecretSource {
    async fn get_secret(&self, ns: &str, name: &str) -> anyhow::Result<Option<corev1::Secret>> {
        debug!("fetching secret {ns}/{name}");
        let api: Api<corev1::Secret> = Api::namespaced(self.client.clone(), ns);
        Ok(api.get_opt(name).await?)
    }

    async fn get_config_map(&self, ns: &str, name: &str) -> anyhow::Result<Option<corev1::ConfigMap>> {
        debug!("fetching configmap {ns}/{name}");
        let api: Api<corev1::ConfigMap> = Api::namespaced(self.client.clone(), ns);
        Ok(api.get_opt(name).await?)
    }
}

/// Serves Secrets and ConfigMaps from a fixed set of objects, e.g. loaded from a bundle file.
#[derive(Default)]
pub struct InMemorySecretSource {
    secrets: BTreeMap<String, corev1::Secret>,
    config_maps: BTreeMap<String, corev1::ConfigMap>,
}

impl InMemorySecretSource {
    pub fn new(secrets: Vec<corev1::Secret>, config_maps: Vec<corev1::ConfigMap>) -> InMemorySecretSource {
        InMemorySecretSource {
            secrets: secrets.into_iter().map(|s| (s.namespaced_name(), s)).collect(),
            config_maps: config_maps.into_iter().map(|cm| (cm.namespaced_name(), cm)).collect(),
        }
    }
}

#[async_trait]
impl SecretSource for InMemorySecretSource {
    async fn get_secret(&self, ns: &str, name: &str) -> anyhow::Result<Option<corev1::Secret>> {
        Ok(self.secrets.get(&format!("{ns}/{name}")).cloned())
    }

    async fn get_config_map(&self, ns: &str, name: &str) -> anyhow::Result<Option<corev1::ConfigMap>> {
        Ok(self.config_maps.get(&format!("{ns}/{name}")).cloned())
    }
}
