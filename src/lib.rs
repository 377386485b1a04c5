//! Shork Static-Site Generator
//!
//! Compiles a tree of page and layout templates, reusable components and
//! per-route data modules into fully rendered static HTML.
//!
//! # Basic Usage
//!
//! ```no_run
//! use shork::{build_site, Result, SiteConfig};
//!
//! fn main() -> Result<()> {
//!     let config = SiteConfig::load(".", None)?;
//!     let stats = build_site(&config)?;
//!     println!("{} pages", stats.pages_written);
//!     Ok(())
//! }
//! ```
//!
//! # Build Pipeline
//!
//! 1. **Manifest**: discover `+page.html` files under `src/routes/`, derive
//!    URL patterns and matchers, locate layouts and data modules
//! 2. **Per page, phase 1**: Component Resolver expands `<Component:Name>`
//!    and `<shork-name>` tags, collecting CSS and component scripts
//! 3. **Per page, phase 2**: remaining `<style>` blocks are lifted out
//! 4. **Per page, phase 3**: Dialect Compiler rewrites `{{#each}}`,
//!    `{{#if}}` and `{{ expr }}` to the renderer's syntax
//! 5. **Render**: page data is merged and validated, the page is rendered,
//!    then its layout, then both land in `src/app.html`

pub mod types;
pub mod error;
pub mod config;
pub mod session;
pub mod tag_scanner;
pub mod style;
pub mod component_resolver;
pub mod dialect;
pub mod preprocessor;
pub mod manifest;
pub mod schema;
pub mod module;
pub mod render;
pub mod builder;
pub mod assets;
pub mod cli;

pub use assets::{Bundler, PassthroughBundler};
pub use builder::{BuildStats, SiteBuilder};
pub use cli::ShorkCli;
pub use component_resolver::{ComponentCache, ComponentDefinition, ComponentResolver, Expansion};
pub use config::{ConfigFile, SiteConfig};
pub use dialect::{DialectCompiler, Target};
pub use error::{BuildError, Result};
pub use manifest::{Manifest, ManifestBuilder, Route};
pub use module::{DataModule, FileModuleLoader, ModuleCache, ModuleLoader};
pub use preprocessor::{preprocess_template, PreprocessedTemplate, Preprocessor};
pub use render::{JinjaRenderer, Renderer};
pub use schema::{JsonSchema, ValidationIssue, Validator};
pub use session::BuildSession;
pub use types::{Params, Props, StaticParams};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build the whole site with the default bundler and a fresh session
pub fn build_site(config: &SiteConfig) -> Result<BuildStats> {
    let mut session = BuildSession::new(config);
    build_site_with(config, &mut session, &PassthroughBundler)
}

/// Build the whole site into `dist/`.
///
/// The output directory is emptied first. Modules registered on `session`
/// before the call take part in the build.
pub fn build_site_with(config: &SiteConfig, session: &mut BuildSession, bundler: &dyn Bundler) -> Result<BuildStats> {
    log::info!("{} v{}: building {}", NAME, VERSION, config.root_dir.display());

    assets::clean_dir(&config.dist_dir)?;
    let static_files = assets::copy_static(&config.static_dir, &config.dist_dir)?;
    let runtime_bundled = assets::bundle_runtime(bundler, &config.runtime_entry, &config.runtime_output_path())?;

    let manifest = ManifestBuilder::new(config).build()?;
    manifest.write(&config.manifest_path())?;

    let mut builder = SiteBuilder::new(config)?;
    let mut stats = builder.build_all(&manifest, session)?;
    stats.static_files = static_files;
    stats.runtime_bundled = runtime_bundled;
    Ok(stats)
}
