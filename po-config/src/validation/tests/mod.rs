mod types_test;

use rstest::*;

use super::*;

#[rstest]
#[case::no_timeout(None, Some("10s"), None)]
#[case::equal(None, Some("30s"), Some("30s"))]
#[case::global_fallback(Some("1m"), None, Some("45s"))]
#[case::default_fallback(None, None, Some("30s"))]
#[case::compares_durations(None, Some("90s"), Some("1m"))]
fn test_validate_scrape_interval_and_timeout(
    #[case] global: Option<&str>,
    #[case] interval: Option<&str>,
    #[case] timeout: Option<&str>,
) {
    validate_scrape_interval_and_timeout(global, interval, timeout).unwrap();
}

#[rstest]
#[case::timeout_too_long(None, Some("10s"), Some("20s"), "scrapeTimeout \"20s\" greater than scrapeInterval \"10s\"")]
#[case::global_too_short(Some("15s"), None, Some("20s"), "greater than scrapeInterval \"15s\"")]
#[case::default_too_short(None, None, Some("1m"), "greater than scrapeInterval \"30s\"")]
#[case::bad_timeout(None, Some("10s"), Some("ten"), "invalid scrapeTimeout: \"ten\"")]
#[case::bad_interval(None, Some("often"), Some("1s"), "invalid scrapeInterval \"often\"")]
fn test_validate_scrape_interval_and_timeout_invalid(
    #[case] global: Option<&str>,
    #[case] interval: Option<&str>,
    #[case] timeout: Option<&str>,
    #[case] msg: &str,
) {
    let err = validate_scrape_interval_and_timeout(global, interval, timeout)
        .unwrap_err()
        .downcast::<ValidationError>()
        .unwrap();
    assert!(matches!(err, ValidationError::InvalidScrapeInterval(_)));
    assert!(err.to_string().contains(msg), "{err}");
}

#[rstest]
fn test_arbitrary_fs_access_bearer_token_file() {
    let err = test_for_arbitrary_fs_access(Some("/var/run/secrets/token"), None).unwrap_err();
    assert!(err.to_string().contains("bearer token file"));
}

#[rstest]
#[case::ca_file(TLSConfig { ca_file: Some("/etc/ca.crt".into()), ..Default::default() })]
#[case::cert_file(TLSConfig { cert_file: Some("/etc/tls.crt".into()), ..Default::default() })]
#[case::key_file(TLSConfig { key_file: Some("/etc/tls.key".into()), ..Default::default() })]
fn test_arbitrary_fs_access_tls(#[case] tls: TLSConfig) {
    let err = test_for_arbitrary_fs_access(None, Some(&tls))
        .unwrap_err()
        .downcast::<ValidationError>()
        .unwrap();
    assert!(matches!(err, ValidationError::ArbitraryFsAccess(_)));
}

#[rstest]
fn test_arbitrary_fs_access_secrets_allowed() {
    let tls = TLSConfig {
        safe: SafeTLSConfig {
            ca: Some(SecretOrConfigMap {
                secret: Some(SecretKeySelector { name: "tls".into(), key: "ca.crt".into(), optional: None }),
                config_map: None,
            }),
            ..Default::default()
        },
        ..Default::default()
    };
    test_for_arbitrary_fs_access(Some(""), Some(&tls)).unwrap();
}

#[rstest]
fn test_validate_scrape_class_exists() {
    let classes = vec![ScrapeClass { name: "istio".into(), ..Default::default() }];
    validate_scrape_class_exists(Some(classes.as_slice()), Some("istio")).unwrap();
    validate_scrape_class_exists(Some(classes.as_slice()), None).unwrap();
    validate_scrape_class_exists(None, Some("")).unwrap();

    let err = validate_scrape_class_exists(Some(classes.as_slice()), Some("mtls")).unwrap_err();
    assert_eq!(err.to_string(), "scrapeClass \"mtls\" not found in Prometheus scrapeClasses");
}
