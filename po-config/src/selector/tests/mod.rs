
use assertables::*;
use po_testutils::*;
use rstest::*;

use super::*;
use crate::assets::MockSecretSource;

fn no_secrets() -> AssetStore<MockSecretSource> {
    let mut source = MockSecretSource::new();
    source.expect_get_secret().never();
    source.expect_get_config_map().never();
    AssetStore::new(source)
}

fn with_secret(secret: corev1::Secret) -> AssetStore<MockSecretSource> {
    let mut source = MockSecretSource::new();
    source
        .expect_get_secret()
        .returning(move |_, name| Ok((name == secret.name_any()).then(|| secret.clone())));
    AssetStore::new(source)
}
