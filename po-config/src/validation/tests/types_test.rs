use std::collections::BTreeMap;

use super::*;

fn secret(name: &str, key: &str) -> SecretKeySelector {
    SecretKeySelector { name: name.into(), key: key.into(), optional: None }
}

fn from_secret(name: &str, key: &str) -> SecretOrConfigMap {
    SecretOrConfigMap { secret: Some(secret(name, key)), config_map: None }
}

fn v(version: &str) -> PrometheusVersion {
    PrometheusVersion::parse(version).unwrap()
}

#[rstest]
fn test_secret_or_config_map_both() {
    let soc = SecretOrConfigMap {
        secret: Some(secret("a", "b")),
        config_map: Some(ConfigMapKeySelector { name: "a".into(), key: "b".into(), optional: None }),
    };
    let err = validate_secret_or_config_map(&soc).unwrap_err();
    assert_eq!(err.to_string(), "cannot specify both Secret and ConfigMap");
}

#[rstest]
#[case::cert_no_key(SafeTLSConfig { cert: Some(from_secret("tls", "tls.crt")), ..Default::default() }, "client cert specified without client key")]
#[case::key_no_cert(SafeTLSConfig { key_secret: Some(secret("tls", "tls.key")), ..Default::default() }, "client key specified without client cert")]
#[case::versions(SafeTLSConfig { min_version: Some(TLSVersion::TLS13), max_version: Some(TLSVersion::TLS12), ..Default::default() }, "maxVersion must more than or equal to minVersion")]
fn test_safe_tls_config_invalid(#[case] tls: SafeTLSConfig, #[case] msg: &str) {
    let err = validate_safe_tls_config(&tls).unwrap_err().downcast::<ValidationError>().unwrap();
    assert!(matches!(err, ValidationError::InvalidTlsConfig(_)));
    assert_eq!(err.to_string(), msg);
}

#[rstest]
fn test_safe_tls_config_ca_context() {
    let tls = SafeTLSConfig {
        ca: Some(SecretOrConfigMap {
            secret: Some(secret("a", "b")),
            config_map: Some(ConfigMapKeySelector { name: "a".into(), key: "b".into(), optional: None }),
        }),
        ..Default::default()
    };
    let err = validate_safe_tls_config(&tls).unwrap_err();
    assert_eq!(format!("{err:#}"), "ca: cannot specify both Secret and ConfigMap");
}

#[rstest]
fn test_safe_tls_config_valid() {
    let tls = SafeTLSConfig {
        ca: Some(from_secret("tls", "ca.crt")),
        cert: Some(from_secret("tls", "tls.crt")),
        key_secret: Some(secret("tls", "tls.key")),
        min_version: Some(TLSVersion::TLS12),
        max_version: Some(TLSVersion::TLS13),
        ..Default::default()
    };
    validate_safe_tls_config(&tls).unwrap();
}

#[rstest]
#[case::ca(TLSConfig { ca_file: Some("/ca".into()), safe: SafeTLSConfig { ca: Some(from_secret("a", "b")), ..Default::default() }, ..Default::default() }, "cannot specify both 'caFile' and 'ca'")]
#[case::cert(TLSConfig { cert_file: Some("/crt".into()), key_file: Some("/key".into()), safe: SafeTLSConfig { cert: Some(from_secret("a", "b")), ..Default::default() }, ..Default::default() }, "cannot specify both 'certFile' and 'cert'")]
#[case::key(TLSConfig { key_file: Some("/key".into()), safe: SafeTLSConfig { key_secret: Some(secret("a", "b")), ..Default::default() }, ..Default::default() }, "cannot specify both 'keyFile' and 'keySecret'")]
#[case::cert_only(TLSConfig { cert_file: Some("/crt".into()), ..Default::default() }, "cannot specify client cert without client key")]
#[case::key_only(TLSConfig { key_file: Some("/key".into()), ..Default::default() }, "cannot specify client key without client cert")]
fn test_tls_config_invalid(#[case] tls: TLSConfig, #[case] msg: &str) {
    let err = validate_tls_config(&tls).unwrap_err();
    assert_eq!(err.to_string(), msg);
}

#[rstest]
fn test_tls_config_mixed_sources() {
    let tls = TLSConfig {
        cert_file: Some("/etc/tls.crt".into()),
        safe: SafeTLSConfig { key_secret: Some(secret("tls", "tls.key")), ..Default::default() },
        ..Default::default()
    };
    validate_tls_config(&tls).unwrap();
}

#[rstest]
#[case::basic(SafeAuthorization { type_: Some("Basic".into()), credentials: Some(secret("a", "b")) }, "authorization type cannot be set to \"basic\", use \"basicAuth\" instead")]
#[case::no_credentials(SafeAuthorization { type_: Some("Bearer".into()), credentials: None }, "authorization credentials are required")]
fn test_safe_authorization_invalid(#[case] auth: SafeAuthorization, #[case] msg: &str) {
    let err = validate_safe_authorization(&auth).unwrap_err().downcast::<ValidationError>().unwrap();
    assert!(matches!(err, ValidationError::InvalidAuthorization(_)));
    assert_eq!(err.to_string(), msg);
}

#[rstest]
fn test_authorization_exclusive_credentials() {
    let auth = Authorization {
        safe: SafeAuthorization { type_: None, credentials: Some(secret("a", "b")) },
        credentials_file: Some("/token".into()),
    };
    assert!(validate_authorization(&auth).is_err());

    let file_only = Authorization { credentials_file: Some("/token".into()), ..Default::default() };
    validate_authorization(&file_only).unwrap();
}

fn header(selectors: Vec<SecretKeySelector>) -> Option<BTreeMap<String, Vec<SecretKeySelector>>> {
    Some(BTreeMap::from([("Proxy-Authorization".to_string(), selectors)]))
}

#[rstest]
#[case::header_without_url(ProxyConfig { proxy_connect_header: header(vec![secret("a", "b")]), ..Default::default() }, "if proxyConnectHeader is configured, proxyUrl or proxyFromEnvironment must also be configured")]
#[case::env_and_url(ProxyConfig { proxy_from_environment: Some(true), proxy_url: Some("http://proxy:3128".into()), ..Default::default() }, "if proxyFromEnvironment is configured, proxyUrl must not be configured")]
#[case::env_and_no_proxy(ProxyConfig { proxy_from_environment: Some(true), no_proxy: Some("10.0.0.0/8".into()), ..Default::default() }, "if proxyFromEnvironment is configured, noProxy must not be configured")]
#[case::no_proxy_alone(ProxyConfig { no_proxy: Some("10.0.0.0/8".into()), ..Default::default() }, "if noProxy is configured, proxyUrl must also be configured")]
#[case::empty_selectors(ProxyConfig { proxy_url: Some("http://proxy:3128".into()), proxy_connect_header: header(vec![]), ..Default::default() }, "proxyConnetHeader[Proxy-Authorization]: selector must not be empty")]
#[case::undefined_selector(ProxyConfig { proxy_url: Some("http://proxy:3128".into()), proxy_connect_header: header(vec![SecretKeySelector::default()]), ..Default::default() }, "proxyConnectHeader[Proxy-Authorization][0]: selector must be defined")]
fn test_proxy_config_invalid(#[case] proxy: ProxyConfig, #[case] msg: &str) {
    let err = validate_proxy_config(&proxy, &v("v3.0.0")).unwrap_err();
    assert_eq!(err.to_string(), msg);
}

#[rstest]
#[case::old("v2.42.0", true)]
#[case::new("v2.43.0", false)]
fn test_proxy_config_version(#[case] version: &str, #[case] fails: bool) {
    let proxy = ProxyConfig { proxy_from_environment: Some(true), ..Default::default() };
    assert_eq!(validate_proxy_config(&proxy, &v(version)).is_err(), fails);

    // proxyUrl on its own predates the extensions
    let plain = ProxyConfig { proxy_url: Some("http://proxy:3128".into()), ..Default::default() };
    validate_proxy_config(&plain, &v(version)).unwrap();
}

#[rstest]
#[case::host("blackbox-exporter")]
#[case::host_port("blackbox-exporter.monitoring.svc:9115")]
#[case::ipv4("10.0.0.1:9115")]
fn test_prober_url_valid(#[case] url: &str) {
    validate_prober_url(url).unwrap();
}

#[rstest]
#[case::http_scheme("http://blackbox-exporter:9115", "invalid host")]
#[case::ftp_scheme("ftp://blackbox-exporter", "invalid port: \"//blackbox-exporter\"")]
#[case::bad_port("blackbox-exporter:99999", "invalid port: \"99999\"")]
#[case::zero_port("blackbox-exporter:0", "invalid port")]
#[case::bad_host("black box", "invalid host: \"black box\"")]
fn test_prober_url_invalid(#[case] url: &str, #[case] cause: &str) {
    let err = validate_prober_url(url).unwrap_err().downcast::<ValidationError>().unwrap();
    let msg = err.to_string();
    assert!(
        msg.starts_with(&format!(
            "{url:?} url specified in proberSpec is invalid, it should be of the format `hostname` or `hostname:port`:"
        )),
        "{msg}"
    );
    assert!(msg.contains(cause), "{msg}");
}

#[rstest]
#[case::https("https://kuma-control-plane:5676", true)]
#[case::no_scheme("kuma-control-plane", false)]
#[case::empty("", false)]
fn test_validate_server(#[case] server: &str, #[case] valid: bool) {
    assert_eq!(validate_server(server).is_ok(), valid);
}
