//! Per-build state: the component cache, the module cache and scope ids
//!
//! A session lives for exactly one build run. Nothing in it is ever
//! invalidated, so a long-lived caller picks up edited components or data
//! modules by starting a new session.

use crate::component_resolver::ComponentCache;
use crate::config::SiteConfig;
use crate::module::{FileModuleLoader, ModuleCache};
use std::path::PathBuf;

pub struct BuildSession {
    pub components: ComponentCache,
    pub modules: ModuleCache,
    scope_counter: u64,
}

impl BuildSession {
    pub fn new(config: &SiteConfig) -> Self {
        Self::with_components_dir(config.components_dir.clone())
    }

    pub fn with_components_dir(components_dir: impl Into<PathBuf>) -> Self {
        Self {
            components: ComponentCache::new(components_dir),
            modules: ModuleCache::new(Box::new(FileModuleLoader)),
            scope_counter: 0,
        }
    }

    /// Next per-occurrence scope identifier.
    ///
    /// Ids are derived from the component name and a session counter, so
    /// two fresh sessions expanding the same templates in the same order
    /// produce identical ids.
    pub fn next_scope_id(&mut self, component: &str) -> String {
        self.scope_counter += 1;
        let digest = md5::compute(format!("{component}:{}", self.scope_counter));
        let hex = hex::encode(digest.0);
        format!("shork-{}", &hex[..10])
    }

    pub fn scope_ids_issued(&self) -> u64 {
        self.scope_counter
    }
}
