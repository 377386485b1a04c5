//! Route discovery and the persisted routing manifest

use crate::config::SiteConfig;
use crate::error::{BuildError, Result};
use crate::types::{Params, DATA_MODULE_FILES, INDEX_FILE, LAYOUT_FILE, PAGE_FILE, SCHEMA_FILE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// URL pattern such as `/blog/[slug]`
    pub path: String,
    pub regex: String,
    pub param_keys: Vec<String>,
    pub page: PathBuf,
    pub layout: PathBuf,
    /// Data module next to the page, if any
    pub js: Option<PathBuf>,
    pub schema: Option<PathBuf>,
}

impl Route {
    pub fn is_dynamic(&self) -> bool {
        !self.param_keys.is_empty()
    }

    pub fn matcher(&self) -> Result<Regex> {
        Regex::new(&self.regex).map_err(|e| BuildError::InvalidFormat {
            message: format!("route {} has an invalid matcher: {}", self.path, e),
        })
    }

    /// Substitute parameter values into the path pattern
    pub fn concrete_path(&self, params: &Params) -> Result<String> {
        let mut segments = Vec::new();
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            let Some(key) = param_name(segment) else {
                segments.push(segment.to_string());
                continue;
            };
            let value = params.get(key).ok_or_else(|| BuildError::InvalidFormat {
                message: format!("route {} is missing a value for parameter '{}'", self.path, key),
            })?;
            if value.is_empty() || value.contains(&['/', '\\'][..]) || value.contains("..") {
                return Err(BuildError::InvalidFormat {
                    message: format!("route {}: parameter '{}' has unsafe value '{}'", self.path, key, value),
                });
            }
            segments.push(value.clone());
        }
        Ok(format!("/{}", segments.join("/")))
    }

    /// `<dist>/index.html` for `/`, `<dist>/<path>/index.html` otherwise
    pub fn output_file(dist_dir: &Path, concrete_path: &str) -> PathBuf {
        let relative = concrete_path.trim_matches('/');
        if relative.is_empty() {
            dist_dir.join(INDEX_FILE)
        } else {
            dist_dir.join(relative).join(INDEX_FILE)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub routes: Vec<Route>,
}

impl Manifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| BuildError::InvalidFormat {
            message: format!("Failed to serialize manifest: {}", e),
        })?;
        fs::write(path, json)?;
        log::info!("Wrote manifest with {} routes to {}", self.routes.len(), path.display());
        Ok(())
    }

    /// First route whose matcher accepts `url`, with its parameter bindings
    pub fn match_path(&self, url: &str) -> Result<Option<(&Route, Params)>> {
        for route in &self.routes {
            let matcher = route.matcher()?;
            if let Some(caps) = matcher.captures(url) {
                let params = route
                    .param_keys
                    .iter()
                    .zip(caps.iter().skip(1))
                    .filter_map(|(key, value)| value.map(|v| (key.clone(), v.as_str().to_string())))
                    .collect();
                return Ok(Some((route, params)));
            }
        }
        Ok(None)
    }

    pub fn static_count(&self) -> usize {
        self.routes.iter().filter(|r| !r.is_dynamic()).count()
    }
}

pub struct ManifestBuilder<'a> {
    routes_dir: &'a Path,
    lib_dir: &'a Path,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            routes_dir: &config.routes_dir,
            lib_dir: &config.lib_dir,
        }
    }

    pub fn build(&self) -> Result<Manifest> {
        if !self.routes_dir.is_dir() {
            return Err(BuildError::config(format!(
                "routes directory {} does not exist",
                self.routes_dir.display()
            )));
        }

        let mut routes = Vec::new();
        for entry in WalkDir::new(self.routes_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
            if !entry.file_type().is_file() || entry.file_name() != PAGE_FILE {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            routes.push(self.route_for(dir, entry.path())?);
        }

        // stable: discovery order survives within equal parameter counts
        routes.sort_by_key(|route| route.param_keys.len());
        log::debug!("Discovered {} routes in {}", routes.len(), self.routes_dir.display());
        Ok(Manifest { routes })
    }

    fn route_for(&self, dir: &Path, page: &Path) -> Result<Route> {
        let relative = dir.strip_prefix(self.routes_dir).unwrap_or(Path::new(""));
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let path = format!("/{}", segments.join("/"));
        let mut param_keys = Vec::new();
        let mut pattern = String::from("^");
        for segment in &segments {
            pattern.push('/');
            match param_name(segment) {
                Some(key) => {
                    param_keys.push(key.to_string());
                    pattern.push_str("([^/]+)");
                }
                None => pattern.push_str(&regex::escape(segment)),
            }
        }
        if segments.is_empty() {
            pattern.push('/');
        }
        pattern.push('$');

        let layout = self.find_layout(dir).ok_or_else(|| BuildError::NoLayout { route: path.clone() })?;
        let js = DATA_MODULE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file());
        let schema = Some(dir.join(SCHEMA_FILE)).filter(|candidate| candidate.is_file());

        Ok(Route {
            path,
            regex: pattern,
            param_keys,
            page: page.to_path_buf(),
            layout,
            js,
            schema,
        })
    }

    /// Nearest `+layout.html` from `dir` up to the routes root, then the fallback in `lib_dir`
    pub fn find_layout(&self, dir: &Path) -> Option<PathBuf> {
        let mut current = Some(dir);
        while let Some(candidate_dir) = current {
            let candidate = candidate_dir.join(LAYOUT_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if candidate_dir == self.routes_dir {
                break;
            }
            current = candidate_dir.parent().filter(|parent| parent.starts_with(self.routes_dir));
        }

        Some(self.lib_dir.join(LAYOUT_FILE)).filter(|fallback| fallback.is_file())
    }
}

/// `[slug]` -> `slug`
fn param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|name| !name.is_empty())
}
