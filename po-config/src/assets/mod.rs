mod source;
mod store;

use po_core::errors::*;
pub use source::*;
pub use store::*;

err_impl! {AssetStoreError,
    #[error("unable to get secret {0:?}")]
    SecretNotFound(String),

    #[error("unable to get configmap {0:?}")]
    ConfigMapNotFound(String),

    #[error("{0}")]
    KeyNotFound(String),

    #[error("{0}")]
    InvalidSelector(String),

    #[error("{0}")]
    InvalidCertificate(String),
}

#[cfg(test)]
mod tests;
