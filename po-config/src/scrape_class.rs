use std::collections::BTreeMap;

use po_core::errors::*;

use crate::prelude::*;

err_impl! {ScrapeClassError,
    #[error("multiple default scrape classes defined")]
    MultipleDefaults(String),
}

/// The scrape classes declared by a workload, indexed by name.
#[derive(Clone, Debug, Default)]
pub struct ScrapeClasses<'a> {
    classes: BTreeMap<&'a str, &'a ScrapeClass>,
    default: Option<&'a ScrapeClass>,
}

impl<'a> ScrapeClasses<'a> {
    pub fn new(classes: Option<&'a [ScrapeClass]>) -> anyhow::Result<ScrapeClasses<'a>> {
        let mut res = ScrapeClasses::default();
        for class in classes.unwrap_or_default() {
            if class.default.unwrap_or_default() {
                if res.default.is_some() {
                    bail!(ScrapeClassError::multiple_defaults(&class.name));
                }
                res.default = Some(class);
            }
            res.classes.insert(&class.name, class);
        }
        Ok(res)
    }

    /// The class a resource uses: the one it names, otherwise the default class.
    pub fn resolve(&self, name: Option<&str>) -> Option<&'a ScrapeClass> {
        match name.filter(|n| !n.is_empty()) {
            Some(name) => self.classes.get(name).copied(),
            None => self.default,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }
}

/// The resource's own TLS configuration replaces the class's as a whole; fields are never merged.
pub fn merge_tls(explicit: Option<TLSConfig>, class: Option<&ScrapeClass>) -> Option<TLSConfig> {
    explicit.or_else(|| class.and_then(|c| c.tls_config.clone()))
}
