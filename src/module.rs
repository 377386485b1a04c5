//! Route data-loader and schema modules
//!
//! The orchestrator only sees the [`DataModule`] and [`Validator`] traits.
//! Modules come from two places: declarative files next to a page
//! (`+page.toml` / `+page.json`, `+schema.json`), read through a
//! [`ModuleLoader`], or Rust values registered against a route path before
//! the build starts.

use crate::error::{BuildError, Result};
use crate::manifest::Route;
use crate::schema::{JsonSchema, Validator};
use crate::types::{Params, StaticParams, GLOBAL_DATA_FILES};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Data hooks a route may export. Unimplemented hooks count as "not exported".
pub trait DataModule: Send + Sync {
    /// Page data for one concrete set of parameters
    fn load(&self, _params: &Params, _global: &Value) -> Result<Option<Map<String, Value>>> {
        Ok(None)
    }

    /// Every parameter binding a dynamic route should be built for, in order
    fn static_params(&self, _global: &Value) -> Result<Option<Vec<StaticParams>>> {
        Ok(None)
    }
}

/// Resolves module files to module objects
pub trait ModuleLoader {
    fn load_data_module(&self, path: &Path) -> Result<Arc<dyn DataModule>>;
    fn load_schema(&self, path: &Path) -> Result<Arc<dyn Validator>>;
}

/// Reads declarative data modules and JSON schemas from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct FileModuleLoader;

impl ModuleLoader for FileModuleLoader {
    fn load_data_module(&self, path: &Path) -> Result<Arc<dyn DataModule>> {
        let mut module: DeclarativeModule = read_structured(path)?;
        module.source = path.to_path_buf();
        Ok(Arc::new(module))
    }

    fn load_schema(&self, path: &Path) -> Result<Arc<dyn Validator>> {
        let root: Value = read_structured(path)?;
        let schema = JsonSchema::new(root).map_err(|message| BuildError::module(path.display().to_string(), message))?;
        Ok(Arc::new(schema))
    }
}

/// A data module written as TOML or JSON:
///
/// ```toml
/// [load]
/// title = "Blog"
///
/// [[paths]]
/// params = { slug = "hello-world" }
/// props = { featured = true }
///
/// [paths_from]
/// collection = "posts"
/// params = { slug = "slug" }
/// bind = "post"
///
/// [load_from]
/// collection = "posts"
/// key = "slug"
/// param = "slug"
/// bind = "post"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeModule {
    #[serde(default)]
    pub load: Option<Map<String, Value>>,
    #[serde(default)]
    pub paths: Option<Vec<StaticParams>>,
    #[serde(default)]
    pub paths_from: Option<PathsFrom>,
    #[serde(default)]
    pub load_from: Option<LoadFrom>,
    #[serde(skip)]
    source: PathBuf,
}

/// Enumerate static params from an array in the global data
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsFrom {
    /// Dotted path to an array in the global data
    pub collection: String,
    /// Route parameter -> dotted field of each element
    pub params: BTreeMap<String, String>,
    /// Expose each element to the page under this name
    #[serde(default)]
    pub bind: Option<String>,
}

impl PathsFrom {
    fn enumerate(&self, global: &Value) -> std::result::Result<Vec<StaticParams>, String> {
        let items = lookup(global, &self.collection)
            .and_then(Value::as_array)
            .ok_or_else(|| format!("global data '{}' is not an array", self.collection))?;

        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let mut params = Params::new();
            for (param, field) in &self.params {
                let value = lookup(item, field)
                    .ok_or_else(|| format!("{}[{}] has no field '{}'", self.collection, index, field))?;
                let value = scalar_to_string(value).ok_or_else(|| {
                    format!("{}[{}].{} must be a string or number", self.collection, index, field)
                })?;
                params.insert(param.clone(), value);
            }

            let mut entry = StaticParams::new(params);
            if let Some(bind) = &self.bind {
                entry.props.insert(bind.clone(), item.clone());
            }
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Look up the element of a global-data array whose `key` field equals a route parameter
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadFrom {
    /// Dotted path to an array in the global data
    pub collection: String,
    /// Dotted field of each element compared against the parameter
    pub key: String,
    /// Route parameter holding the value to find
    pub param: String,
    /// Name the matched element is loaded under
    pub bind: String,
}

impl LoadFrom {
    fn find(&self, params: &Params, global: &Value) -> std::result::Result<Value, String> {
        let wanted = params
            .get(&self.param)
            .ok_or_else(|| format!("route has no parameter '{}'", self.param))?;
        let items = lookup(global, &self.collection)
            .and_then(Value::as_array)
            .ok_or_else(|| format!("global data '{}' is not an array", self.collection))?;

        items
            .iter()
            .find(|item| {
                lookup(item, &self.key)
                    .and_then(scalar_to_string)
                    .map_or(false, |value| &value == wanted)
            })
            .cloned()
            .ok_or_else(|| format!("no element of '{}' has {} = '{}'", self.collection, self.key, wanted))
    }
}

impl DataModule for DeclarativeModule {
    fn load(&self, params: &Params, global: &Value) -> Result<Option<Map<String, Value>>> {
        let Some(from) = &self.load_from else {
            return Ok(self.load.clone());
        };

        let item = from
            .find(params, global)
            .map_err(|message| BuildError::module(self.source.display().to_string(), message))?;
        let mut data = self.load.clone().unwrap_or_default();
        data.insert(from.bind.clone(), item);
        Ok(Some(data))
    }

    fn static_params(&self, global: &Value) -> Result<Option<Vec<StaticParams>>> {
        if self.paths.is_none() && self.paths_from.is_none() {
            return Ok(None);
        }

        let mut entries = self.paths.clone().unwrap_or_default();
        if let Some(from) = &self.paths_from {
            let enumerated = from
                .enumerate(global)
                .map_err(|message| BuildError::module(self.source.display().to_string(), message))?;
            entries.extend(enumerated);
        }
        Ok(Some(entries))
    }
}

/// Loads each module at most once per session
pub struct ModuleCache {
    loader: Box<dyn ModuleLoader>,
    data_modules: HashMap<PathBuf, Arc<dyn DataModule>>,
    schemas: HashMap<PathBuf, Arc<dyn Validator>>,
    registered: HashMap<String, Arc<dyn DataModule>>,
}

impl ModuleCache {
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            data_modules: HashMap::new(),
            schemas: HashMap::new(),
            registered: HashMap::new(),
        }
    }

    /// Attach a data module to a route path (e.g. `/blog/[slug]`).
    /// Registered modules take precedence over module files.
    pub fn register(&mut self, route_path: impl Into<String>, module: Arc<dyn DataModule>) {
        self.registered.insert(route_path.into(), module);
    }

    pub fn data_module(&mut self, route: &Route) -> Result<Option<Arc<dyn DataModule>>> {
        if let Some(module) = self.registered.get(&route.path) {
            return Ok(Some(Arc::clone(module)));
        }
        let Some(path) = &route.js else {
            return Ok(None);
        };
        if let Some(module) = self.data_modules.get(path) {
            return Ok(Some(Arc::clone(module)));
        }

        log::debug!("Loading data module {}", path.display());
        let module = self.loader.load_data_module(path)?;
        self.data_modules.insert(path.clone(), Arc::clone(&module));
        Ok(Some(module))
    }

    pub fn schema(&mut self, path: &Path) -> Result<Arc<dyn Validator>> {
        if let Some(schema) = self.schemas.get(path) {
            return Ok(Arc::clone(schema));
        }

        log::debug!("Loading schema {}", path.display());
        let schema = self.loader.load_schema(path)?;
        self.schemas.insert(path.to_path_buf(), Arc::clone(&schema));
        Ok(schema)
    }

    pub fn loaded_count(&self) -> usize {
        self.data_modules.len() + self.schemas.len()
    }
}

/// Site-wide data from `src/data.toml` or `src/data.json`; an empty object if neither exists
pub fn load_global_data(src_dir: &Path) -> Result<Value> {
    for name in GLOBAL_DATA_FILES {
        let path = src_dir.join(name);
        if !path.is_file() {
            continue;
        }
        let data: Value = read_structured(&path)?;
        if !data.is_object() {
            return Err(BuildError::module(path.display().to_string(), "global data must be a table/object"));
        }
        log::debug!("Loaded global data from {}", path.display());
        return Ok(data);
    }
    Ok(Value::Object(Map::new()))
}

/// Deserialize a `.toml` or `.json` file
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::FileNotFound {
        path: format!("{}: {}", path.display(), e),
    })?;
    let display = path.display().to_string();

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| BuildError::module(display, format!("Invalid JSON: {e}"))),
        Some("toml") => toml::from_str(&content)
            .map_err(|e| BuildError::module(display, format!("Invalid TOML: {e}"))),
        _ => Err(BuildError::InvalidFormat {
            message: format!("{display} must be .json or .toml"),
        }),
    }
}

fn lookup<'v>(value: &'v Value, dotted: &str) -> Option<&'v Value> {
    dotted.split('.').filter(|segment| !segment.is_empty()).try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
