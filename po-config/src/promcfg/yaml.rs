use std::collections::BTreeMap;

use serde_yaml::{
    Mapping,
    Value,
};

use crate::assets::{
    AssetKind,
    Assets,
    TlsAssetKey,
};
use crate::prelude::*;

/// Insertion helpers for config fragments; `None` and empty values are skipped.
pub(super) trait MappingExt {
    fn set<V: Into<Value>>(&mut self, key: &str, value: V);
    fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>);
    fn set_str(&mut self, key: &str, value: Option<&str>);
    fn set_seq(&mut self, key: &str, values: Vec<Value>);
    fn set_gated<V: Into<Value>>(&mut self, version: &PrometheusVersion, feature: Feature, key: &str, value: Option<V>);
}

impl MappingExt for Mapping {
    fn set<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.insert(key.into(), value.into());
    }

    fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    fn set_str(&mut self, key: &str, value: Option<&str>) {
        self.set_opt(key, value.filter(|v| !v.is_empty()));
    }

    fn set_seq(&mut self, key: &str, values: Vec<Value>) {
        if !values.is_empty() {
            self.set(key, Value::Sequence(values));
        }
    }

    fn set_gated<V: Into<Value>>(&mut self, version: &PrometheusVersion, feature: Feature, key: &str, value: Option<V>) {
        if let Some(value) = value {
            version.insert_gated(self, feature, key, value);
        }
    }
}

pub(super) fn string_map(map: &BTreeMap<String, String>) -> Mapping {
    map.iter().map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str()))).collect()
}

pub(super) fn params_map(params: &BTreeMap<String, Vec<String>>) -> Mapping {
    params
        .iter()
        .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.clone())))
        .collect()
}

/// Numbers written as strings in the custom resources (sampling fractions, bucket factors) are
/// emitted as floats when they parse.
pub(super) fn float_or_string(s: &str) -> Value {
    match s.parse::<f64>() {
        Ok(f) => Value::from(f),
        Err(_) => Value::from(s),
    }
}

pub(super) fn relabel_config(rc: &RelabelConfig) -> Value {
    let mut cfg = Mapping::new();
    if let Some(sources) = rc.source_labels.as_ref().filter(|s| !s.is_empty()) {
        cfg.set("source_labels", sources.clone());
    }
    cfg.set_str("separator", rc.separator.as_deref());
    cfg.set_str("target_label", rc.target_label.as_deref());
    cfg.set_str("regex", rc.regex.as_deref());
    cfg.set_opt("modulus", rc.modulus.filter(|m| *m != 0));
    cfg.set_opt("replacement", rc.replacement.as_deref());
    cfg.set_opt("action", rc.action.as_deref().filter(|a| !a.is_empty()).map(str::to_lowercase));
    Value::Mapping(cfg)
}

pub(super) fn relabel_configs<'a>(rcs: impl IntoIterator<Item = &'a RelabelConfig>) -> Vec<Value> {
    rcs.into_iter().map(relabel_config).collect()
}

fn tls_version(v: TLSVersion) -> &'static str {
    match v {
        TLSVersion::TLS10 => "TLS10",
        TLSVersion::TLS11 => "TLS11",
        TLSVersion::TLS12 => "TLS12",
        TLSVersion::TLS13 => "TLS13",
    }
}

/// Secret and ConfigMap references become paths under the certificates directory; plain file
/// fields are passed through.
pub(super) fn tls_config(ns: &str, tls: &TLSConfig, version: &PrometheusVersion) -> Mapping {
    let safe = &tls.safe;
    let ca = safe
        .ca
        .as_ref()
        .and_then(|sel| TlsAssetKey::from_selector(ns, sel))
        .map(|k| k.path())
        .or_else(|| tls.ca_file.clone());
    let cert = safe
        .cert
        .as_ref()
        .and_then(|sel| TlsAssetKey::from_selector(ns, sel))
        .map(|k| k.path())
        .or_else(|| tls.cert_file.clone());
    let key = safe
        .key_secret
        .as_ref()
        .map(|sel| TlsAssetKey::from_secret_selector(ns, sel).path())
        .or_else(|| tls.key_file.clone());

    let mut cfg = Mapping::new();
    cfg.set_opt("insecure_skip_verify", safe.insecure_skip_verify);
    cfg.set_str("ca_file", ca.as_deref());
    cfg.set_str("cert_file", cert.as_deref());
    cfg.set_str("key_file", key.as_deref());
    cfg.set_str("server_name", safe.server_name.as_deref());
    cfg.set_gated(version, Feature::TLSMinVersion, "min_version", safe.min_version.map(tls_version));
    cfg.set_gated(version, Feature::TLSMaxVersion, "max_version", safe.max_version.map(tls_version));
    cfg
}

pub(super) fn add_tls_config(cfg: &mut Mapping, ns: &str, tls: Option<&TLSConfig>, version: &PrometheusVersion) {
    if let Some(tls) = tls {
        cfg.set("tls_config", tls_config(ns, tls, version));
    }
}

pub(super) fn add_safe_tls_config(
    cfg: &mut Mapping,
    ns: &str,
    tls: Option<&SafeTLSConfig>,
    version: &PrometheusVersion,
) {
    add_tls_config(cfg, ns, tls.cloned().map(TLSConfig::from).as_ref(), version);
}

pub(super) fn add_basic_auth(cfg: &mut Mapping, assets: &Assets, ctx: &str) {
    if let Some(creds) = assets.basic_auth(&AssetKey::new(AssetKind::BasicAuth, ctx)) {
        let mut ba = Mapping::new();
        ba.set("username", creds.username.as_str());
        ba.set("password", creds.password.as_str());
        cfg.set("basic_auth", ba);
    }
}

pub(super) fn add_bearer_token(cfg: &mut Mapping, assets: &Assets, ctx: &str) {
    if let Some(token) = assets.bearer_token(&AssetKey::new(AssetKind::BearerToken, ctx)) {
        let mut auth = Mapping::new();
        auth.set("credentials", token);
        cfg.set("authorization", auth);
    }
}

pub(super) fn add_authorization(cfg: &mut Mapping, assets: &Assets, ctx: &str, auth: &Authorization) {
    let auth_type = auth.safe.type_.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let mut m = Mapping::new();
    m.set("type", auth_type.unwrap_or("Bearer"));
    match assets.bearer_token(&AssetKey::new(AssetKind::Authorization, ctx)) {
        Some(credentials) => m.set("credentials", credentials),
        None => m.set_str("credentials_file", auth.credentials_file.as_deref()),
    }
    cfg.set("authorization", m);
}

pub(super) fn add_proxy(
    cfg: &mut Mapping,
    assets: &Assets,
    ctx: &str,
    proxy: &ProxyConfig,
    version: &PrometheusVersion,
) {
    cfg.set_str("proxy_url", proxy.proxy_url.as_deref());
    if !version.supports(Feature::ProxyExtensions) {
        return;
    }

    cfg.set_str("no_proxy", proxy.no_proxy.as_deref());
    cfg.set_opt("proxy_from_environment", proxy.proxy_from_environment);
    if let Some(headers) = assets.proxy_headers(&AssetKey::new(AssetKind::ProxyHeader, ctx)) {
        let headers: Mapping = headers
            .iter()
            .map(|(name, values)| (Value::from(name.as_str()), Value::from(values.clone())))
            .collect();
        cfg.set("proxy_connect_header", headers);
    }
}

pub(super) fn add_oauth2(
    cfg: &mut Mapping,
    ns: &str,
    assets: &Assets,
    ctx: &str,
    oauth2: Option<&OAuth2>,
    version: &PrometheusVersion,
) {
    let Some(oauth2) = oauth2 else { return };
    let Some(creds) = assets.oauth2(&AssetKey::new(AssetKind::OAuth2, ctx)) else { return };

    let mut m = Mapping::new();
    m.set("client_id", creds.client_id.as_str());
    m.set("client_secret", creds.client_secret.as_str());
    m.set("token_url", oauth2.token_url.as_str());
    if let Some(scopes) = oauth2.scopes.as_ref().filter(|s| !s.is_empty()) {
        m.set("scopes", scopes.clone());
    }
    if let Some(params) = oauth2.endpoint_params.as_ref().filter(|p| !p.is_empty()) {
        m.set("endpoint_params", string_map(params));
    }
    add_safe_tls_config(&mut m, ns, oauth2.tls_config.as_ref(), version);
    add_proxy(&mut m, assets, &format!("{ctx}/oauth2"), &oauth2.proxy, version);
    cfg.set("oauth2", m);
}
