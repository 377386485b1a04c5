//! Output directory preparation, static assets and the client runtime

use crate::error::{BuildError, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Turns the runtime entry file into one script
pub trait Bundler {
    fn bundle(&self, entry: &Path) -> Result<String>;
}

/// Emits the entry file unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughBundler;

impl Bundler for PassthroughBundler {
    fn bundle(&self, entry: &Path) -> Result<String> {
        fs::read_to_string(entry).map_err(|e| BuildError::FileNotFound {
            path: format!("{}: {}", entry.display(), e),
        })
    }
}

/// Remove and recreate the output directory
pub fn clean_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        log::debug!("Removing {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Mirror `static_dir` into `dist_dir`; returns the number of files copied
pub fn copy_static(static_dir: &Path, dist_dir: &Path) -> Result<usize> {
    if !static_dir.is_dir() {
        log::debug!("No static directory at {}", static_dir.display());
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(static_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(static_dir) else {
            continue;
        };
        let target = dist_dir.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    log::info!("Copied {} static files from {}", copied, static_dir.display());
    Ok(copied)
}

/// Bundle the runtime entry into `output`; a missing entry is skipped
pub fn bundle_runtime(bundler: &dyn Bundler, entry: &Path, output: &Path) -> Result<bool> {
    if !entry.is_file() {
        log::info!("No client runtime at {}, skipping bundle", entry.display());
        return Ok(false);
    }

    let code = bundler.bundle(entry)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, code)?;
    log::info!("Bundled {} -> {}", entry.display(), output.display());
    Ok(true)
}
