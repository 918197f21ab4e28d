use super::*;

#[rstest]
#[tokio::test]
async fn test_kube_source_get_secret() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let secret = test_secret(TEST_SECRET, &[("token", "abc")]);
    fake_apiserver
        .handle_get(format!("/api/v1/namespaces/{TEST_NAMESPACE}/secrets/{TEST_SECRET}"), &secret)
        .handle_not_found(format!("/api/v1/namespaces/{TEST_NAMESPACE}/secrets/missing"))
        .build();

    let source = KubeSecretSource::new(client);
    let found = source.get_secret(TEST_NAMESPACE, TEST_SECRET).await.unwrap();
    assert_eq!(found.unwrap().data, secret.data);
    assert_none!(source.get_secret(TEST_NAMESPACE, "missing").await.unwrap());
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_kube_source_get_config_map() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let cm = test_config_map(TEST_CONFIG_MAP, &[("ca.crt", TEST_CA_CERT)]);
    fake_apiserver
        .handle_get(format!("/api/v1/namespaces/{TEST_NAMESPACE}/configmaps/{TEST_CONFIG_MAP}"), &cm)
        .build();

    let source = KubeSecretSource::new(client);
    let found = source.get_config_map(TEST_NAMESPACE, TEST_CONFIG_MAP).await.unwrap();
    assert_eq!(found.unwrap().data, cm.data);
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_kube_source_store_end_to_end() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    let secret = test_secret(TEST_SECRET, &[("username", "admin"), ("password", "hunter2")]);
    fake_apiserver
        .handle_get(format!("/api/v1/namespaces/{TEST_NAMESPACE}/secrets/{TEST_SECRET}"), &secret)
        .build();

    let mut store = AssetStore::new(KubeSecretSource::new(client));
    let key = AssetKey::new(AssetKind::BasicAuth, "remoteWrite/0");
    let ba = BasicAuth {
        username: Some(secret_selector(TEST_SECRET, "username")),
        password: Some(secret_selector(TEST_SECRET, "password")),
    };
    store.add_basic_auth(TEST_NAMESPACE, Some(&ba), &key).await.unwrap();

    assert_eq!(store.basic_auth(&key).unwrap().password, "hunter2");
    fake_apiserver.assert();
}

#[rstest]
#[tokio::test]
async fn test_in_memory_source() {
    let source = InMemorySecretSource::new(
        vec![test_secret(TEST_SECRET, &[("token", "abc")])],
        vec![test_config_map(TEST_CONFIG_MAP, &[("key", "value")])],
    );

    assert_some!(source.get_secret(TEST_NAMESPACE, TEST_SECRET).await.unwrap());
    assert_none!(source.get_secret("other", TEST_SECRET).await.unwrap());
    assert_some!(source.get_config_map(TEST_NAMESPACE, TEST_CONFIG_MAP).await.unwrap());
    assert_none!(source.get_config_map(TEST_NAMESPACE, TEST_SECRET).await.unwrap());
}
