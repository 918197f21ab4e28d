pub mod assets;
pub mod bindings;
pub mod monitor;
pub mod promcfg;
pub mod scrape_class;
pub mod selector;
pub mod validation;
pub mod version;

pub mod prelude {
    pub use po_api::v1::*;
    pub use po_api::v1alpha1::*;
    pub use po_core::prelude::*;

    pub use crate::assets::{
        AssetKey,
        AssetStore,
        SecretSource,
    };
    pub use crate::version::{
        Feature,
        PrometheusVersion,
    };
}
