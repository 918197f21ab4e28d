use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use po_core::errors::*;
use tracing::*;

use super::{
    AssetStoreError,
    KubeSecretSource,
    SecretSource,
};
use crate::prelude::*;
use crate::validation::*;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AssetKind {
    BasicAuth,
    BearerToken,
    OAuth2,
    Authorization,
    SigV4,
    AzureAD,
    ProxyHeader,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetKind::BasicAuth => "basicauth",
            AssetKind::BearerToken => "bearertoken",
            AssetKind::OAuth2 => "oauth2",
            AssetKind::Authorization => "auth",
            AssetKind::SigV4 => "sigv4",
            AssetKind::AzureAD => "azuread",
            AssetKind::ProxyHeader => "proxyconnectheader",
        };
        write!(f, "{s}")
    }
}

/// Logical name of a credential, e.g. the basic auth of the first endpoint of a ServiceMonitor.
/// The selector and the config generator build the same key for the same field.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AssetKey {
    pub kind: AssetKind,
    pub context: String,
}

impl AssetKey {
    pub fn new(kind: AssetKind, context: impl Into<String>) -> AssetKey {
        AssetKey { kind, context: context.into() }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.context)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ObjectKind {
    ConfigMap,
    Secret,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::ConfigMap => write!(f, "configmap"),
            ObjectKind::Secret => write!(f, "secret"),
        }
    }
}

/// Identifies a TLS file written to the certificates directory.  Two references to the same
/// object key always produce the same TlsAssetKey.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TlsAssetKey {
    pub source: ObjectKind,
    pub namespace: String,
    pub name: String,
    pub key: String,
}

impl TlsAssetKey {
    pub fn from_secret_selector(ns: &str, sel: &SecretKeySelector) -> TlsAssetKey {
        TlsAssetKey {
            source: ObjectKind::Secret,
            namespace: ns.into(),
            name: sel.name.clone(),
            key: sel.key.clone(),
        }
    }

    pub fn from_selector(ns: &str, soc: &SecretOrConfigMap) -> Option<TlsAssetKey> {
        if let Some(sel) = &soc.secret {
            return Some(TlsAssetKey::from_secret_selector(ns, sel));
        }
        soc.config_map.as_ref().map(|sel| TlsAssetKey {
            source: ObjectKind::ConfigMap,
            namespace: ns.into(),
            name: sel.name.clone(),
            key: sel.key.clone(),
        })
    }

    /// Location of the file inside the Prometheus container.
    pub fn path(&self) -> String {
        format!("{TLS_ASSETS_DIR}/{self}")
    }
}

impl fmt::Display for TlsAssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.source, self.namespace, self.name, self.key)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OAuth2Credentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SigV4Credentials {
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Asset {
    BasicAuth(BasicAuthCredentials),
    Token(String),
    OAuth2(OAuth2Credentials),
    SigV4(SigV4Credentials),
    ProxyHeaders(BTreeMap<String, Vec<String>>),
}

type ObjectRef = (String, String);

/// Everything resolved during one reconciliation: the fetched objects (including the ones that
/// turned out not to exist) and the credentials extracted from them.
#[derive(Default)]
pub struct Assets {
    secrets: BTreeMap<ObjectRef, Option<corev1::Secret>>,
    config_maps: BTreeMap<ObjectRef, Option<corev1::ConfigMap>>,
    assets: BTreeMap<AssetKey, Asset>,
    tls_assets: BTreeMap<TlsAssetKey, String>,
}

impl Assets {
    pub fn basic_auth(&self, key: &AssetKey) -> Option<&BasicAuthCredentials> {
        match self.assets.get(key) {
            Some(Asset::BasicAuth(creds)) => Some(creds),
            _ => None,
        }
    }

    /// Bearer tokens, authorization credentials and Azure client secrets are all plain tokens.
    pub fn bearer_token(&self, key: &AssetKey) -> Option<&str> {
        match self.assets.get(key) {
            Some(Asset::Token(token)) => Some(token),
            _ => None,
        }
    }

    pub fn oauth2(&self, key: &AssetKey) -> Option<&OAuth2Credentials> {
        match self.assets.get(key) {
            Some(Asset::OAuth2(creds)) => Some(creds),
            _ => None,
        }
    }

    pub fn sigv4(&self, key: &AssetKey) -> Option<&SigV4Credentials> {
        match self.assets.get(key) {
            Some(Asset::SigV4(creds)) => Some(creds),
            _ => None,
        }
    }

    pub fn proxy_headers(&self, key: &AssetKey) -> Option<&BTreeMap<String, Vec<String>>> {
        match self.assets.get(key) {
            Some(Asset::ProxyHeaders(headers)) => Some(headers),
            _ => None,
        }
    }

    pub fn tls_assets(&self) -> &BTreeMap<TlsAssetKey, String> {
        &self.tls_assets
    }

    /// Looks up a secret key among the objects already fetched, without calling the API.
    pub fn cached_secret_key(&self, ns: &str, sel: &SecretKeySelector) -> Option<String> {
        let secret = self.secrets.get(&(ns.into(), sel.name.clone()))?.as_ref()?;
        secret_data(secret, &sel.key)
    }

    pub fn cached_config_map_key(&self, ns: &str, sel: &ConfigMapKeySelector) -> Option<String> {
        let cm = self.config_maps.get(&(ns.into(), sel.name.clone()))?.as_ref()?;
        config_map_data(cm, &sel.key)
    }

    pub fn cached_key(&self, ns: &str, soc: &SecretOrConfigMap) -> Option<String> {
        match (&soc.secret, &soc.config_map) {
            (Some(sel), _) => self.cached_secret_key(ns, sel),
            (None, Some(sel)) => self.cached_config_map_key(ns, sel),
            (None, None) => None,
        }
    }
}

fn secret_data(secret: &corev1::Secret, key: &str) -> Option<String> {
    if let Some(value) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return Some(String::from_utf8_lossy(&value.0).into_owned());
    }
    secret.string_data.as_ref().and_then(|d| d.get(key)).cloned()
}

fn config_map_data(cm: &corev1::ConfigMap, key: &str) -> Option<String> {
    if let Some(value) = cm.data.as_ref().and_then(|d| d.get(key)) {
        return Some(value.clone());
    }
    cm.binary_data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| String::from_utf8_lossy(&v.0).into_owned())
}

fn check_ca_certificate(ca: &str) -> EmptyResult {
    let block = ::pem::parse(ca.as_bytes())
        .map_err(|e| AssetStoreError::invalid_certificate(&format!("failed to decode CA certificate: {e}")))?;
    x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| AssetStoreError::invalid_certificate(&format!("failed to parse CA certificate: {e}")))?;
    Ok(())
}

fn check_key_pair(cert: &str, key: &str) -> EmptyResult {
    let cert_block = ::pem::parse(cert.as_bytes())
        .map_err(|e| AssetStoreError::invalid_certificate(&format!("failed to decode client certificate: {e}")))?;
    x509_parser::parse_x509_certificate(cert_block.contents())
        .map_err(|e| AssetStoreError::invalid_certificate(&format!("failed to parse client certificate: {e}")))?;

    let key_block = ::pem::parse(key.as_bytes())
        .map_err(|e| AssetStoreError::invalid_certificate(&format!("failed to decode client key: {e}")))?;
    ensure!(
        key_block.tag().ends_with("PRIVATE KEY"),
        AssetStoreError::invalid_certificate(&format!("unexpected PEM block {:?} for client key", key_block.tag()))
    );
    Ok(())
}

/// Resolves the Secret and ConfigMap references of the configuration resources into plain
/// values.  One store is created per reconciliation and each object is read at most once,
/// including objects that don't exist.
///
/// The store is not safe for concurrent use.
pub struct AssetStore<S = KubeSecretSource> {
    source: S,
    assets: Assets,
}

impl<S> Deref for AssetStore<S> {
    type Target = Assets;

    fn deref(&self) -> &Assets {
        &self.assets
    }
}

impl<S: SecretSource> AssetStore<S> {
    pub fn new(source: S) -> AssetStore<S> {
        AssetStore { source, assets: Assets::default() }
    }

    pub fn into_assets(self) -> Assets {
        self.assets
    }

    pub async fn get_secret_key(&mut self, ns: &str, sel: &SecretKeySelector) -> anyhow::Result<String> {
        let obj_ref = (ns.to_string(), sel.name.clone());
        if !self.assets.secrets.contains_key(&obj_ref) {
            let secret = self
                .source
                .get_secret(ns, &sel.name)
                .await
                .with_context(|| format!("unable to get secret {:?}", sel.name))?;
            self.assets.secrets.insert(obj_ref.clone(), secret);
        }

        let Some(secret) = self.assets.secrets.get(&obj_ref).and_then(Option::as_ref) else {
            bail!(AssetStoreError::secret_not_found(&sel.name));
        };
        secret_data(secret, &sel.key).ok_or_else(|| {
            AssetStoreError::key_not_found(&format!("key {:?} in secret {:?} not found", sel.key, sel.name))
        })
    }

    pub async fn get_config_map_key(&mut self, ns: &str, sel: &ConfigMapKeySelector) -> anyhow::Result<String> {
        let obj_ref = (ns.to_string(), sel.name.clone());
        if !self.assets.config_maps.contains_key(&obj_ref) {
            let cm = self
                .source
                .get_config_map(ns, &sel.name)
                .await
                .with_context(|| format!("unable to get configmap {:?}", sel.name))?;
            self.assets.config_maps.insert(obj_ref.clone(), cm);
        }

        let Some(cm) = self.assets.config_maps.get(&obj_ref).and_then(Option::as_ref) else {
            bail!(AssetStoreError::config_map_not_found(&sel.name));
        };
        config_map_data(cm, &sel.key).ok_or_else(|| {
            AssetStoreError::key_not_found(&format!("key {:?} in configmap {:?} not found", sel.key, sel.name))
        })
    }

    pub async fn get_key(&mut self, ns: &str, soc: &SecretOrConfigMap) -> anyhow::Result<String> {
        match (&soc.secret, &soc.config_map) {
            (Some(sel), None) => self.get_secret_key(ns, sel).await,
            (None, Some(sel)) => self.get_config_map_key(ns, sel).await,
            (Some(_), Some(_)) => bail!(AssetStoreError::invalid_selector("cannot specify both Secret and ConfigMap")),
            (None, None) => bail!(AssetStoreError::invalid_selector("either Secret or ConfigMap must be specified")),
        }
    }

    #[instrument(skip_all, fields(ns = ns))]
    pub async fn add_tls_config(&mut self, ns: &str, tls: Option<&TLSConfig>) -> EmptyResult {
        let Some(tls) = tls else { return Ok(()) };
        validate_tls_config(tls).context("failed to validate TLS configuration")?;
        self.add_tls_assets(ns, &tls.safe).await
    }

    #[instrument(skip_all, fields(ns = ns))]
    pub async fn add_safe_tls_config(&mut self, ns: &str, tls: Option<&SafeTLSConfig>) -> EmptyResult {
        let Some(tls) = tls else { return Ok(()) };
        validate_safe_tls_config(tls).context("failed to validate TLS configuration")?;
        self.add_tls_assets(ns, tls).await
    }

    async fn add_tls_assets(&mut self, ns: &str, tls: &SafeTLSConfig) -> EmptyResult {
        if let Some(ca_sel) = &tls.ca {
            let ca = self.get_key(ns, ca_sel).await.context("failed to get CA")?;
            check_ca_certificate(&ca)?;
            if let Some(key) = TlsAssetKey::from_selector(ns, ca_sel) {
                self.assets.tls_assets.insert(key, ca);
            }
        }

        let cert = match &tls.cert {
            Some(sel) => Some((sel, self.get_key(ns, sel).await.context("failed to get cert")?)),
            None => None,
        };
        let key = match &tls.key_secret {
            Some(sel) => Some((sel, self.get_secret_key(ns, sel).await.context("failed to get key")?)),
            None => None,
        };

        if let (Some((_, cert)), Some((_, key))) = (&cert, &key) {
            check_key_pair(cert, key).context("failed to load X509 key pair")?;
        }

        if let Some((sel, cert)) = cert
            && let Some(asset_key) = TlsAssetKey::from_selector(ns, sel)
        {
            self.assets.tls_assets.insert(asset_key, cert);
        }
        if let Some((sel, key)) = key {
            self.assets.tls_assets.insert(TlsAssetKey::from_secret_selector(ns, sel), key);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_basic_auth(&mut self, ns: &str, ba: Option<&BasicAuth>, key: &AssetKey) -> EmptyResult {
        let Some(ba) = ba else { return Ok(()) };

        let username = match &ba.username {
            Some(sel) => self.get_secret_key(ns, sel).await.context("failed to get basic auth username")?,
            None => String::new(),
        };
        let password = match &ba.password {
            Some(sel) => self.get_secret_key(ns, sel).await.context("failed to get basic auth password")?,
            None => String::new(),
        };

        self.assets
            .assets
            .insert(key.clone(), Asset::BasicAuth(BasicAuthCredentials { username, password }));
        Ok(())
    }

    /// An unset selector, or one with an empty name, means no bearer token is configured.
    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_bearer_token(&mut self, ns: &str, sel: Option<&SecretKeySelector>, key: &AssetKey) -> EmptyResult {
        let Some(sel) = sel.filter(|s| !s.name.is_empty()) else { return Ok(()) };

        let token = self.get_secret_key(ns, sel).await.context("failed to get bearer token")?;
        self.assets.assets.insert(key.clone(), Asset::Token(token));
        Ok(())
    }

    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_oauth2(&mut self, ns: &str, oauth2: Option<&OAuth2>, key: &AssetKey) -> EmptyResult {
        let Some(oauth2) = oauth2 else { return Ok(()) };

        let client_id = self.get_key(ns, &oauth2.client_id).await.context("failed to get oauth2 client id")?;
        let client_secret = self
            .get_secret_key(ns, &oauth2.client_secret)
            .await
            .context("failed to get oauth2 client secret")?;

        self.add_safe_tls_config(ns, oauth2.tls_config.as_ref())
            .await
            .context("failed to process oauth2 TLS config")?;
        let proxy_key = AssetKey::new(AssetKind::ProxyHeader, format!("{}/oauth2", key.context));
        self.add_proxy_config(ns, &oauth2.proxy, &proxy_key).await?;

        self.assets
            .assets
            .insert(key.clone(), Asset::OAuth2(OAuth2Credentials { client_id, client_secret }));
        Ok(())
    }

    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_safe_authorization(
        &mut self,
        ns: &str,
        auth: Option<&SafeAuthorization>,
        key: &AssetKey,
    ) -> EmptyResult {
        let Some(auth) = auth else { return Ok(()) };
        validate_safe_authorization(auth)?;
        self.add_authorization_credentials(ns, auth, key).await
    }

    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_authorization(&mut self, ns: &str, auth: Option<&Authorization>, key: &AssetKey) -> EmptyResult {
        let Some(auth) = auth else { return Ok(()) };
        validate_authorization(auth)?;
        self.add_authorization_credentials(ns, &auth.safe, key).await
    }

    async fn add_authorization_credentials(
        &mut self,
        ns: &str,
        auth: &SafeAuthorization,
        key: &AssetKey,
    ) -> EmptyResult {
        let Some(sel) = &auth.credentials else { return Ok(()) };

        let credentials = self
            .get_secret_key(ns, sel)
            .await
            .context("failed to get authorization credentials")?;
        self.assets.assets.insert(key.clone(), Asset::Token(credentials));
        Ok(())
    }

    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_sigv4(&mut self, ns: &str, sigv4: Option<&Sigv4>, key: &AssetKey) -> EmptyResult {
        let Some(sigv4) = sigv4 else { return Ok(()) };
        validate_sigv4(sigv4)?;

        let (Some(access_sel), Some(secret_sel)) = (&sigv4.access_key, &sigv4.secret_key) else {
            return Ok(());
        };
        let access_key = self
            .get_secret_key(ns, access_sel)
            .await
            .context("failed to get sigv4 access key")?;
        let secret_key = self
            .get_secret_key(ns, secret_sel)
            .await
            .context("failed to get sigv4 secret key")?;

        self.assets
            .assets
            .insert(key.clone(), Asset::SigV4(SigV4Credentials { access_key, secret_key }));
        Ok(())
    }

    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_azure_ad(&mut self, ns: &str, azure: Option<&AzureAD>, key: &AssetKey) -> EmptyResult {
        let Some(azure) = azure else { return Ok(()) };
        validate_azure_ad(azure)?;

        let Some(oauth) = &azure.oauth else { return Ok(()) };
        let secret = self
            .get_secret_key(ns, &oauth.client_secret)
            .await
            .context("failed to get azure oauth client secret")?;
        self.assets.assets.insert(key.clone(), Asset::Token(secret));
        Ok(())
    }

    /// Resolves the proxy connect headers into header name -> values.
    #[instrument(skip_all, fields(ns = ns, key = %key))]
    pub async fn add_proxy_config(&mut self, ns: &str, proxy: &ProxyConfig, key: &AssetKey) -> EmptyResult {
        let Some(headers) = proxy.proxy_connect_header.as_ref().filter(|h| !h.is_empty()) else {
            return Ok(());
        };

        let mut resolved = BTreeMap::new();
        for (header, selectors) in headers {
            let mut values = Vec::with_capacity(selectors.len());
            for sel in selectors {
                let value = self
                    .get_secret_key(ns, sel)
                    .await
                    .with_context(|| format!("failed to get proxyConnectHeader {header:?}"))?;
                values.push(value);
            }
            resolved.insert(header.clone(), values);
        }

        debug!("resolved {} proxy connect headers", resolved.len());
        self.assets.assets.insert(key.clone(), Asset::ProxyHeaders(resolved));
        Ok(())
    }
}
