//! Project layout and the optional `shork.toml` / JSON config file

use crate::error::{BuildError, Result};
use crate::types::{APP_TEMPLATE_FILE, CONFIG_FILE, MANIFEST_FILE, RUNTIME_OUTPUT_FILE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Values read from a config file. Every field is optional and overrides the default layout.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub src_dir: Option<String>,
    pub dist_dir: Option<String>,
    pub static_dir: Option<String>,
    pub routes_dir: Option<String>,
    pub components_dir: Option<String>,
    pub lib_dir: Option<String>,
    pub runtime_entry: Option<String>,
    pub scope_css: Option<bool>,
}

pub fn load(config_path: &Path) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| BuildError::FileNotFound {
        path: format!("Config file {}: {}", config_path.display(), e),
    })?;

    let config = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&config_content).map_err(|e| BuildError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        }),
        Some("toml") => toml::from_str(&config_content).map_err(|e| BuildError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        }),
        _ => Err(BuildError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        }),
    }?;

    log::info!("Loaded configuration from {}", config_path.display());
    Ok(config)
}

/// Resolved project directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub root_dir: PathBuf,
    pub src_dir: PathBuf,
    pub dist_dir: PathBuf,
    pub static_dir: PathBuf,
    pub routes_dir: PathBuf,
    pub components_dir: PathBuf,
    /// Holds the fallback root `+layout.html`
    pub lib_dir: PathBuf,
    pub runtime_entry: PathBuf,
    pub scope_css: bool,
}

impl SiteConfig {
    /// Default layout: `src/`, `src/routes/`, `src/lib/components/`, `static/`, `dist/`
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root_dir = root.into();
        let src_dir = root_dir.join("src");
        let lib_dir = src_dir.join("lib");
        Self {
            dist_dir: root_dir.join("dist"),
            static_dir: root_dir.join("static"),
            routes_dir: src_dir.join("routes"),
            components_dir: lib_dir.join("components"),
            runtime_entry: lib_dir.join("runtime.js"),
            lib_dir,
            src_dir,
            root_dir,
            scope_css: true,
        }
    }

    /// Layer a config file over this layout; relative paths resolve against the root
    pub fn apply(&mut self, file: &ConfigFile) {
        let root = self.root_dir.clone();
        let resolve = |value: &Option<String>, target: &mut PathBuf| {
            if let Some(value) = value {
                *target = root.join(value);
            }
        };

        // src_dir first so the src-relative defaults below follow it
        if let Some(src) = &file.src_dir {
            let src_dir = root.join(src);
            self.routes_dir = src_dir.join("routes");
            self.lib_dir = src_dir.join("lib");
            self.components_dir = self.lib_dir.join("components");
            self.runtime_entry = self.lib_dir.join("runtime.js");
            self.src_dir = src_dir;
        }
        if let Some(lib) = &file.lib_dir {
            self.lib_dir = root.join(lib);
            self.components_dir = self.lib_dir.join("components");
            self.runtime_entry = self.lib_dir.join("runtime.js");
        }

        resolve(&file.dist_dir, &mut self.dist_dir);
        resolve(&file.static_dir, &mut self.static_dir);
        resolve(&file.routes_dir, &mut self.routes_dir);
        resolve(&file.components_dir, &mut self.components_dir);
        resolve(&file.runtime_entry, &mut self.runtime_entry);
        if let Some(scope_css) = file.scope_css {
            self.scope_css = scope_css;
        }
    }

    /// Defaults for `root`, overlaid with `config_path` or `<root>/shork.toml` when it exists
    pub fn load(root: impl Into<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_root(root);
        let path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(config.root_dir.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };
        if let Some(path) = path {
            let file = load(&path)?;
            config.apply(&file);
        }

        if config.dist_dir == config.root_dir || config.dist_dir == config.src_dir {
            return Err(BuildError::config(format!(
                "dist_dir {} would overwrite project sources",
                config.dist_dir.display()
            )));
        }
        Ok(config)
    }

    pub fn app_template_path(&self) -> PathBuf {
        self.src_dir.join(APP_TEMPLATE_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dist_dir.join(MANIFEST_FILE)
    }

    pub fn runtime_output_path(&self) -> PathBuf {
        self.dist_dir.join(RUNTIME_OUTPUT_FILE)
    }
}
