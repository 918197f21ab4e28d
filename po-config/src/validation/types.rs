use std::net::IpAddr;

use lazy_static::lazy_static;
use po_core::errors::*;
use url::Url;

use super::ValidationError;
use crate::prelude::*;

lazy_static! {
    static ref DNS1123_SUBDOMAIN_RE: Regex =
        Regex::new(r"^([a-zA-Z0-9_]{1}[a-zA-Z0-9_-]{0,62}){1}(\.[a-zA-Z0-9_]{1}[a-zA-Z0-9_-]{0,62})*[\._]?$").unwrap();
}

const MAX_DNS_NAME_LENGTH: usize = 255;

pub fn validate_secret_or_config_map(soc: &SecretOrConfigMap) -> EmptyResult {
    ensure!(
        soc.secret.is_none() || soc.config_map.is_none(),
        ValidationError::invalid_secret_or_config_map("cannot specify both Secret and ConfigMap")
    );
    Ok(())
}

pub fn validate_safe_tls_config(tls: &SafeTLSConfig) -> EmptyResult {
    if let Some(ca) = &tls.ca {
        validate_secret_or_config_map(ca).context("ca")?;
    }

    if let Some(cert) = &tls.cert {
        validate_secret_or_config_map(cert).context("cert")?;
        ensure!(
            tls.key_secret.is_some(),
            ValidationError::invalid_tls_config("client cert specified without client key")
        );
    } else {
        ensure!(
            tls.key_secret.is_none(),
            ValidationError::invalid_tls_config("client key specified without client cert")
        );
    }

    if let (Some(min), Some(max)) = (tls.min_version, tls.max_version) {
        ensure!(
            min <= max,
            ValidationError::invalid_tls_config("maxVersion must more than or equal to minVersion")
        );
    }
    Ok(())
}

pub fn validate_tls_config(tls: &TLSConfig) -> EmptyResult {
    let set = |f: &Option<String>| f.as_deref().is_some_and(|f| !f.is_empty());
    let safe = &tls.safe;

    if set(&tls.ca_file) && safe.ca.is_some() {
        bail!(ValidationError::invalid_tls_config("cannot specify both 'caFile' and 'ca'"));
    }
    if set(&tls.cert_file) && safe.cert.is_some() {
        bail!(ValidationError::invalid_tls_config("cannot specify both 'certFile' and 'cert'"));
    }
    if set(&tls.key_file) && safe.key_secret.is_some() {
        bail!(ValidationError::invalid_tls_config("cannot specify both 'keyFile' and 'keySecret'"));
    }

    let has_cert = set(&tls.cert_file) || safe.cert.is_some();
    let has_key = set(&tls.key_file) || safe.key_secret.is_some();
    if has_cert && !has_key {
        bail!(ValidationError::invalid_tls_config("cannot specify client cert without client key"));
    }
    if has_key && !has_cert {
        bail!(ValidationError::invalid_tls_config("cannot specify client key without client cert"));
    }

    if let Some(ca) = &safe.ca {
        validate_secret_or_config_map(ca).context("ca")?;
    }
    if let Some(cert) = &safe.cert {
        validate_secret_or_config_map(cert).context("cert")?;
    }
    if let (Some(min), Some(max)) = (safe.min_version, safe.max_version) {
        ensure!(
            min <= max,
            ValidationError::invalid_tls_config("maxVersion must more than or equal to minVersion")
        );
    }
    Ok(())
}

pub fn validate_safe_authorization(auth: &SafeAuthorization) -> EmptyResult {
    if auth.type_.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("basic")) {
        bail!(ValidationError::invalid_authorization(
            "authorization type cannot be set to \"basic\", use \"basicAuth\" instead"
        ));
    }
    ensure!(
        auth.credentials.is_some(),
        ValidationError::invalid_authorization("authorization credentials are required")
    );
    Ok(())
}

pub fn validate_authorization(auth: &Authorization) -> EmptyResult {
    let has_file = auth.credentials_file.as_deref().is_some_and(|f| !f.is_empty());
    if auth.safe.credentials.is_some() && has_file {
        bail!(ValidationError::invalid_authorization(
            "authorization can not specify both \"credentials\" and \"credentialsFile\""
        ));
    }
    if auth.safe.type_.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("basic")) {
        bail!(ValidationError::invalid_authorization(
            "authorization type cannot be set to \"basic\", use \"basicAuth\" instead"
        ));
    }
    Ok(())
}

/// Checks the consistency of the proxy fields and that the Prometheus version understands them.
pub fn validate_proxy_config(proxy: &ProxyConfig, version: &PrometheusVersion) -> EmptyResult {
    if proxy.is_empty() {
        return Ok(());
    }

    let from_env = proxy.proxy_from_environment.unwrap_or_default();
    let url_set = proxy.proxy_url.as_deref().is_some_and(|u| !u.is_empty());
    let no_proxy_set = proxy.no_proxy.as_deref().is_some_and(|n| !n.is_empty());
    let headers = proxy.proxy_connect_header.as_ref().filter(|h| !h.is_empty());

    if headers.is_some() && !from_env && !url_set {
        bail!(ValidationError::invalid_proxy_config(
            "if proxyConnectHeader is configured, proxyUrl or proxyFromEnvironment must also be configured"
        ));
    }
    if from_env && url_set {
        bail!(ValidationError::invalid_proxy_config(
            "if proxyFromEnvironment is configured, proxyUrl must not be configured"
        ));
    }
    if from_env && no_proxy_set {
        bail!(ValidationError::invalid_proxy_config(
            "if proxyFromEnvironment is configured, noProxy must not be configured"
        ));
    }
    if !url_set && no_proxy_set {
        bail!(ValidationError::invalid_proxy_config("if noProxy is configured, proxyUrl must also be configured"));
    }

    for (header, selectors) in headers.into_iter().flatten() {
        if selectors.is_empty() {
            bail!(ValidationError::invalid_proxy_config(&format!(
                "proxyConnetHeader[{header}]: selector must not be empty"
            )));
        }
        for (i, sel) in selectors.iter().enumerate() {
            if *sel == SecretKeySelector::default() {
                bail!(ValidationError::invalid_proxy_config(&format!(
                    "proxyConnectHeader[{header}][{i}]: selector must be defined"
                )));
            }
        }
    }

    if let Some(proxy_url) = proxy.proxy_url.as_deref().filter(|u| !u.is_empty()) {
        Url::parse(proxy_url)
            .map_err(|e| ValidationError::invalid_proxy_config(&format!("invalid proxyUrl {proxy_url:?}: {e}")))?;
    }

    let uses_extensions = proxy.proxy_from_environment.is_some() || proxy.no_proxy.is_some() || headers.is_some();
    if uses_extensions && !version.supports(Feature::ProxyExtensions) {
        bail!(ValidationError::unsupported_feature(&format!(
            "'noProxy', 'proxyFromEnvironment' and 'proxyConnectHeader' are only supported from Prometheus version {}",
            PrometheusVersion::minimum_for(Feature::ProxyExtensions)
        )));
    }
    Ok(())
}

/// The prober URL is `host` or `host:port`; the host is an IP address or a DNS name.
pub fn validate_prober_url(prober_url: &str) -> EmptyResult {
    let check = || -> EmptyResult {
        let mut parts = prober_url.split(':');
        let host = parts.next().unwrap_or_default();
        let port = parts.next();
        if parts.next().is_some() {
            bail!(ValidationError::invalid_prober_url(&format!("invalid host: {prober_url:?}")));
        }

        let valid_host = host.parse::<IpAddr>().is_ok()
            || (host.len() <= MAX_DNS_NAME_LENGTH && DNS1123_SUBDOMAIN_RE.is_match(host));
        ensure!(valid_host, ValidationError::invalid_prober_url(&format!("invalid host: {host:?}")));

        if let Some(port) = port {
            let valid_port = port.parse::<u32>().is_ok_and(|p| (1..=65535).contains(&p));
            ensure!(valid_port, ValidationError::invalid_prober_url(&format!("invalid port: {port:?}")));
        }
        Ok(())
    };

    check().map_err(|e| {
        ValidationError::invalid_prober_url(&format!(
            "{prober_url:?} url specified in proberSpec is invalid, it should be of the format `hostname` or `hostname:port`: {e}"
        ))
    })
}

/// Service discovery servers are full URLs including a scheme.
pub fn validate_server(server: &str) -> EmptyResult {
    match Url::parse(server) {
        Ok(u) if !u.scheme().is_empty() => Ok(()),
        _ => bail!(ValidationError::invalid_service_discovery(&format!(
            "must not be empty and have a scheme: {server}"
        ))),
    }
}

/// Exactly one of managed identity, OAuth or SDK authentication must be configured.
pub fn validate_azure_ad(azure: &AzureAD) -> EmptyResult {
    let configured = [azure.managed_identity.is_some(), azure.oauth.is_some(), azure.sdk.is_some()]
        .iter()
        .filter(|c| **c)
        .count();
    match configured {
        0 => bail!(ValidationError::invalid_authorization(
            "must provide Azure Managed Identity or Azure OAuth or Azure SDK in the Azure AD config"
        )),
        1 => Ok(()),
        _ => bail!(ValidationError::invalid_authorization(
            "cannot provide more than one of Azure Managed Identity, Azure OAuth or Azure SDK in the Azure AD config"
        )),
    }
}

pub fn validate_sigv4(sigv4: &Sigv4) -> EmptyResult {
    ensure!(
        sigv4.access_key.is_some() == sigv4.secret_key.is_some(),
        ValidationError::invalid_authorization("both accessKey and secretKey should be provided")
    );
    Ok(())
}
