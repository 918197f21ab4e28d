use std::collections::BTreeMap;

use super::*;

fn source_with_secret(secret: corev1::Secret) -> MockSecretSource {
    let mut source = MockSecretSource::new();
    source.expect_get_secret().times(1).returning(move |ns, name| {
        assert_eq!(ns, TEST_NAMESPACE);
        Ok((name == secret.name_any()).then(|| secret.clone()))
    });
    source
}

fn basic_auth(user_key: &str, pass_key: &str) -> BasicAuth {
    BasicAuth {
        username: Some(secret_selector(TEST_SECRET, user_key)),
        password: Some(secret_selector(TEST_SECRET, pass_key)),
    }
}

fn tls_config(ca: SecretOrConfigMap, with_client_cert: bool) -> SafeTLSConfig {
    SafeTLSConfig {
        ca: Some(ca),
        cert: with_client_cert.then(|| SecretOrConfigMap {
            secret: Some(secret_selector(TEST_SECRET, "tls.crt")),
            config_map: None,
        }),
        key_secret: with_client_cert.then(|| secret_selector(TEST_SECRET, "tls.key")),
        ..Default::default()
    }
}

fn ca_from_config_map() -> SecretOrConfigMap {
    SecretOrConfigMap {
        secret: None,
        config_map: Some(config_map_selector(TEST_CONFIG_MAP, "ca.crt")),
    }
}

#[rstest]
#[tokio::test]
async fn test_add_basic_auth() {
    let secret = test_secret(TEST_SECRET, &[("username", "admin"), ("password", "hunter2")]);
    let mut store = AssetStore::new(source_with_secret(secret));
    let key = AssetKey::new(AssetKind::BasicAuth, "serviceMonitor/default/test/0");

    store
        .add_basic_auth(TEST_NAMESPACE, Some(&basic_auth("username", "password")), &key)
        .await
        .unwrap();

    assert_eq!(
        store.basic_auth(&key),
        Some(&BasicAuthCredentials { username: "admin".into(), password: "hunter2".into() })
    );
}

#[rstest]
#[tokio::test]
async fn test_add_basic_auth_missing_key() {
    let secret = test_secret(TEST_SECRET, &[("username", "admin")]);
    let mut store = AssetStore::new(source_with_secret(secret));
    let key = AssetKey::new(AssetKind::BasicAuth, "serviceMonitor/default/test/0");

    let err = store
        .add_basic_auth(TEST_NAMESPACE, Some(&basic_auth("username", "pass")), &key)
        .await
        .unwrap_err();

    assert_eq!(
        format!("{err:#}"),
        "failed to get basic auth password: key \"pass\" in secret \"foo\" not found"
    );
    assert!(matches!(err.downcast::<AssetStoreError>().unwrap(), AssetStoreError::KeyNotFound(_)));
    assert_none!(store.basic_auth(&key));
}

#[rstest]
#[tokio::test]
async fn test_missing_secret_is_fetched_once() {
    let mut source = MockSecretSource::new();
    source.expect_get_secret().times(1).returning(|_, _| Ok(None));
    let mut store = AssetStore::new(source);

    for _ in 0..3 {
        let err = store
            .get_secret_key(TEST_NAMESPACE, &secret_selector("missing", "token"))
            .await
            .unwrap_err()
            .downcast::<AssetStoreError>()
            .unwrap();
        assert!(matches!(err, AssetStoreError::SecretNotFound(_)));
    }
}

#[rstest]
#[tokio::test]
async fn test_source_error_is_propagated() {
    let mut source = MockSecretSource::new();
    source
        .expect_get_secret()
        .times(1)
        .returning(|_, _| Err(anyhow!("connection refused")));
    let mut store = AssetStore::new(source);

    let err = store
        .add_bearer_token(
            TEST_NAMESPACE,
            Some(&secret_selector(TEST_SECRET, "token")),
            &AssetKey::new(AssetKind::BearerToken, "x"),
        )
        .await
        .unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "failed to get bearer token: unable to get secret \"foo\": connection refused"
    );
}

#[rstest]
#[tokio::test]
async fn test_add_bearer_token_empty_name() {
    // no expectations: any call to the source panics
    let mut store = AssetStore::new(MockSecretSource::new());
    let key = AssetKey::new(AssetKind::BearerToken, "serviceMonitor/default/test/0");

    store
        .add_bearer_token(TEST_NAMESPACE, Some(&secret_selector("", "token")), &key)
        .await
        .unwrap();
    store.add_bearer_token(TEST_NAMESPACE, None, &key).await.unwrap();
    assert_none!(store.bearer_token(&key));
}

#[rstest]
#[tokio::test]
async fn test_shared_secret_fetched_once() {
    let secret = test_secret(TEST_SECRET, &[("token", "abc"), ("username", "u"), ("password", "p")]);
    let mut store = AssetStore::new(source_with_secret(secret));

    for i in 0..3 {
        let token_key = AssetKey::new(AssetKind::BearerToken, format!("serviceMonitor/default/test/{i}"));
        store
            .add_bearer_token(TEST_NAMESPACE, Some(&secret_selector(TEST_SECRET, "token")), &token_key)
            .await
            .unwrap();
        assert_eq!(store.bearer_token(&token_key), Some("abc"));
    }
    store
        .add_basic_auth(
            TEST_NAMESPACE,
            Some(&basic_auth("username", "password")),
            &AssetKey::new(AssetKind::BasicAuth, "x"),
        )
        .await
        .unwrap();
}

#[rstest]
#[tokio::test]
async fn test_add_tls_config() {
    let mut source = MockSecretSource::new();
    source.expect_get_config_map().times(1).returning(|_, _| {
        Ok(Some(test_config_map(TEST_CONFIG_MAP, &[("ca.crt", TEST_CA_CERT)])))
    });
    source.expect_get_secret().times(1).returning(|_, _| {
        Ok(Some(test_secret(TEST_SECRET, &[("tls.crt", TEST_CLIENT_CERT), ("tls.key", TEST_CLIENT_KEY)])))
    });
    let mut store = AssetStore::new(source);

    let tls = tls_config(ca_from_config_map(), true);
    store.add_safe_tls_config(TEST_NAMESPACE, Some(&tls)).await.unwrap();
    // the same CA referenced a second time resolves to the same asset
    store.add_safe_tls_config(TEST_NAMESPACE, Some(&tls)).await.unwrap();

    let names: Vec<_> = store.tls_assets().keys().map(|k| k.to_string()).collect();
    assert_eq!(names, vec![
        "configmap_default_bar_ca.crt",
        "secret_default_foo_tls.crt",
        "secret_default_foo_tls.key",
    ]);

    let ca_key = TlsAssetKey::from_selector(TEST_NAMESPACE, &ca_from_config_map()).unwrap();
    assert_eq!(ca_key.path(), "/etc/prometheus/certs/configmap_default_bar_ca.crt");
    assert_eq!(store.tls_assets()[&ca_key], TEST_CA_CERT);
}

#[rstest]
#[case::not_pem("not a certificate", "failed to decode CA certificate")]
#[case::not_x509("-----BEGIN CERTIFICATE-----\naGVsbG8=\n-----END CERTIFICATE-----\n", "failed to parse CA certificate")]
#[tokio::test]
async fn test_add_tls_config_invalid_ca(#[case] ca: &'static str, #[case] msg: &str) {
    let mut source = MockSecretSource::new();
    source
        .expect_get_config_map()
        .returning(move |_, _| Ok(Some(test_config_map(TEST_CONFIG_MAP, &[("ca.crt", ca)]))));
    let mut store = AssetStore::new(source);

    let err = store
        .add_safe_tls_config(TEST_NAMESPACE, Some(&tls_config(ca_from_config_map(), false)))
        .await
        .unwrap_err()
        .downcast::<AssetStoreError>()
        .unwrap();
    assert!(matches!(err, AssetStoreError::InvalidCertificate(_)));
    assert_starts_with!(err.to_string(), msg);
    assert!(store.tls_assets().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_add_tls_config_bad_key_pair() {
    let mut source = MockSecretSource::new();
    source.expect_get_config_map().returning(|_, _| {
        Ok(Some(test_config_map(TEST_CONFIG_MAP, &[("ca.crt", TEST_CA_CERT)])))
    });
    source.expect_get_secret().returning(|_, _| {
        Ok(Some(test_secret(TEST_SECRET, &[("tls.crt", TEST_CLIENT_CERT), ("tls.key", TEST_CLIENT_CERT)])))
    });
    let mut store = AssetStore::new(source);

    let err = store
        .add_safe_tls_config(TEST_NAMESPACE, Some(&tls_config(ca_from_config_map(), true)))
        .await
        .unwrap_err();
    assert_starts_with!(format!("{err:#}"), "failed to load X509 key pair");
}

#[rstest]
#[tokio::test]
async fn test_add_tls_config_invalid() {
    let mut store = AssetStore::new(MockSecretSource::new());
    let tls = SafeTLSConfig {
        key_secret: Some(secret_selector(TEST_SECRET, "tls.key")),
        ..Default::default()
    };

    let err = store.add_safe_tls_config(TEST_NAMESPACE, Some(&tls)).await.unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "failed to validate TLS configuration: client key specified without client cert"
    );
}

#[rstest]
#[tokio::test]
async fn test_add_oauth2() {
    let mut source = MockSecretSource::new();
    source
        .expect_get_config_map()
        .times(1)
        .returning(|_, _| Ok(Some(test_config_map(TEST_CONFIG_MAP, &[("client_id", "my-client")]))));
    source
        .expect_get_secret()
        .times(1)
        .returning(|_, _| Ok(Some(test_secret(TEST_SECRET, &[("client_secret", "s3cr3t")]))));
    let mut store = AssetStore::new(source);
    let key = AssetKey::new(AssetKind::OAuth2, "probe/default/test");

    let oauth2 = OAuth2 {
        client_id: SecretOrConfigMap {
            secret: None,
            config_map: Some(config_map_selector(TEST_CONFIG_MAP, "client_id")),
        },
        client_secret: secret_selector(TEST_SECRET, "client_secret"),
        token_url: "https://auth.example.com/token".into(),
        ..Default::default()
    };
    store.add_oauth2(TEST_NAMESPACE, Some(&oauth2), &key).await.unwrap();

    assert_eq!(
        store.oauth2(&key),
        Some(&OAuth2Credentials { client_id: "my-client".into(), client_secret: "s3cr3t".into() })
    );
    assert_none!(store.basic_auth(&key));
}

#[rstest]
#[tokio::test]
async fn test_add_safe_authorization() {
    let secret = test_secret(TEST_SECRET, &[("credentials", "token-value")]);
    let mut store = AssetStore::new(source_with_secret(secret));
    let key = AssetKey::new(AssetKind::Authorization, "scrapeConfig/default/test");

    let auth = SafeAuthorization {
        type_: Some("Bearer".into()),
        credentials: Some(secret_selector(TEST_SECRET, "credentials")),
    };
    store.add_safe_authorization(TEST_NAMESPACE, Some(&auth), &key).await.unwrap();
    assert_eq!(store.bearer_token(&key), Some("token-value"));
}

#[rstest]
#[tokio::test]
async fn test_add_sigv4_requires_both_keys() {
    let mut store = AssetStore::new(MockSecretSource::new());
    let sigv4 = Sigv4 {
        access_key: Some(secret_selector(TEST_SECRET, "access")),
        ..Default::default()
    };

    let err = store
        .add_sigv4(TEST_NAMESPACE, Some(&sigv4), &AssetKey::new(AssetKind::SigV4, "remoteWrite/0"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "both accessKey and secretKey should be provided");
}

#[rstest]
#[tokio::test]
async fn test_add_proxy_config() {
    let secret = test_secret(TEST_SECRET, &[("user", "alice"), ("pass", "pw")]);
    let mut store = AssetStore::new(source_with_secret(secret));
    let key = AssetKey::new(AssetKind::ProxyHeader, "serviceMonitor/default/test/0");

    let proxy = ProxyConfig {
        proxy_url: Some("http://proxy:3128".into()),
        proxy_connect_header: Some(BTreeMap::from([(
            "Proxy-Authorization".into(),
            vec![secret_selector(TEST_SECRET, "user"), secret_selector(TEST_SECRET, "pass")],
        )])),
        ..Default::default()
    };
    store.add_proxy_config(TEST_NAMESPACE, &proxy, &key).await.unwrap();

    let headers = store.proxy_headers(&key).unwrap();
    assert_eq!(headers["Proxy-Authorization"], vec!["alice", "pw"]);
}

#[rstest]
#[tokio::test]
async fn test_cached_lookups() {
    let secret = test_secret(TEST_SECRET, &[("token", "abc")]);
    let mut store = AssetStore::new(source_with_secret(secret));
    let sel = secret_selector(TEST_SECRET, "token");

    assert_none!(store.cached_secret_key(TEST_NAMESPACE, &sel));
    store.get_secret_key(TEST_NAMESPACE, &sel).await.unwrap();
    assert_eq!(store.cached_secret_key(TEST_NAMESPACE, &sel), Some("abc".into()));
    assert_eq!(
        store.cached_key(TEST_NAMESPACE, &SecretOrConfigMap { secret: Some(sel), config_map: None }),
        Some("abc".into())
    );
}
