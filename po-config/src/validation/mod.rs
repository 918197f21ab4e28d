mod relabel;
mod types;

use po_core::duration::parse_duration;
use po_core::errors::*;
pub use relabel::*;
pub use types::*;

use crate::prelude::*;

err_impl! {ValidationError,
    #[error("{0}")]
    InvalidRelabelConfig(String),

    #[error("{0}")]
    InvalidTlsConfig(String),

    #[error("{0}")]
    InvalidAuthorization(String),

    #[error("{0}")]
    InvalidProxyConfig(String),

    #[error("{0}")]
    InvalidSecretOrConfigMap(String),

    #[error("{0}")]
    InvalidScrapeInterval(String),

    #[error("{0}")]
    ArbitraryFsAccess(String),

    #[error("{0}")]
    InvalidProberUrl(String),

    #[error("{0}")]
    InvalidScrapeClass(String),

    #[error("{0}")]
    InvalidServiceDiscovery(String),

    #[error("{0}")]
    InvalidLabel(String),

    #[error("{0}")]
    UnsupportedFeature(String),
}

/// Checks that the scrape timeout does not exceed the scrape interval, falling back to the
/// workload's global interval (and then the default interval) when the endpoint sets none.
pub fn validate_scrape_interval_and_timeout(
    global_interval: Option<&str>,
    interval: Option<&str>,
    timeout: Option<&str>,
) -> EmptyResult {
    let timeout = match timeout {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(()),
    };

    let interval = match interval {
        Some(i) if !i.is_empty() => i,
        _ => global_interval.filter(|i| !i.is_empty()).unwrap_or(DEFAULT_SCRAPE_INTERVAL),
    };

    let si = parse_duration(interval)
        .map_err(|e| ValidationError::invalid_scrape_interval(&format!("invalid scrapeInterval {interval:?}: {e}")))?;
    let st = parse_duration(timeout)
        .map_err(|e| ValidationError::invalid_scrape_interval(&format!("invalid scrapeTimeout: {timeout:?}: {e}")))?;

    ensure!(
        st <= si,
        ValidationError::invalid_scrape_interval(&format!(
            "scrapeTimeout {timeout:?} greater than scrapeInterval {interval:?}"
        ))
    );
    Ok(())
}

/// Rejects endpoints that read from the Prometheus container's file system.
pub fn test_for_arbitrary_fs_access(bearer_token_file: Option<&str>, tls: Option<&TLSConfig>) -> EmptyResult {
    if bearer_token_file.is_some_and(|f| !f.is_empty()) {
        bail!(ValidationError::arbitrary_fs_access(
            "it accesses file system via bearer token file which Prometheus specification prohibits"
        ));
    }

    if let Some(tls) = tls {
        let uses_files = [&tls.ca_file, &tls.cert_file, &tls.key_file]
            .iter()
            .any(|f| f.as_deref().is_some_and(|f| !f.is_empty()));
        if uses_files {
            bail!(ValidationError::arbitrary_fs_access(
                "it accesses file system via tls config which Prometheus specification prohibits"
            ));
        }
    }
    Ok(())
}

pub fn validate_scrape_class_exists(classes: Option<&[ScrapeClass]>, name: Option<&str>) -> EmptyResult {
    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => return Ok(()),
    };

    if classes.unwrap_or_default().iter().any(|c| c.name == name) {
        return Ok(());
    }
    bail!(ValidationError::invalid_scrape_class(&format!(
        "scrapeClass {name:?} not found in Prometheus scrapeClasses"
    )))
}

#[cfg(test)]
mod tests;
