//! Shared conventions and small data types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// Route directory conventions
pub const PAGE_FILE: &str = "+page.html";
pub const LAYOUT_FILE: &str = "+layout.html";
pub const DATA_MODULE_FILES: &[&str] = &["+page.toml", "+page.json"];
pub const SCHEMA_FILE: &str = "+schema.json";

// Project files under src/
pub const APP_TEMPLATE_FILE: &str = "app.html";
pub const GLOBAL_DATA_FILES: &[&str] = &["data.toml", "data.json"];
pub const CONFIG_FILE: &str = "shork.toml";

// Output files under dist/
pub const MANIFEST_FILE: &str = "manifest.json";
pub const RUNTIME_OUTPUT_FILE: &str = "main.js";
pub const INDEX_FILE: &str = "index.html";

// Component tag conventions
pub const COMPONENT_TAG_PREFIX: &str = "shork-";
pub const COMPONENT_NAMESPACE: &str = "Component:";
pub const COMPONENT_EXTENSION: &str = "html";
pub const SCOPE_ATTRIBUTE: &str = "data-shork-id";

// App shell placeholders
pub const BODY_PLACEHOLDER: &str = "%body%";
pub const HEAD_PLACEHOLDER: &str = "%head%";

// Limits
pub const MAX_COMPONENT_DEPTH: usize = 64;
pub const MAX_DATA_SNAPSHOT_BYTES: usize = 4096;

/// Attribute-derived component props. Values are never coerced.
pub type Props = BTreeMap<String, String>;

/// Concrete route parameter bindings, keyed by parameter name.
pub type Params = BTreeMap<String, String>;

/// One entry returned by a route's static-path enumeration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticParams {
    pub params: Params,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl StaticParams {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            props: Map::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }
}

/// Count newlines before `offset` to get a 1-based line number
pub fn line_at(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}
