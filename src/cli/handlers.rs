use super::{relative_display, DialectTarget, ShorkCli};
use crate::builder::BuildStats;
use crate::dialect::Target;
use crate::error::{BuildError, Result};
use crate::manifest::{Manifest, ManifestBuilder};
use crate::preprocessor::Preprocessor;
use crate::session::BuildSession;
use std::path::{Path, PathBuf};

// --- BUILD ---
pub fn handle_build_command(cli: &ShorkCli) -> Result<()> {
    let config = cli.config()?;
    println!("🔨 Building {}", config.root_dir.display());

    let stats = crate::build_site(config)?;

    println!("✅ Build successful!");
    print_build_stats(&stats, &relative_display(&config.dist_dir, &config.root_dir));
    println!("   Time: {}ms", cli.elapsed_ms());
    Ok(())
}

fn print_build_stats(stats: &BuildStats, dist: &str) {
    println!("   Output: {}", dist);
    println!("   Pages: {}", stats.pages_written);
    if stats.routes_skipped > 0 {
        println!("   Skipped routes: {}", stats.routes_skipped);
    }
    println!("   Components: {}", stats.components_loaded);
    println!("   Static files: {}", stats.static_files);
    if stats.runtime_bundled {
        println!("   Runtime: bundled");
    }
}

// --- ROUTES ---
pub fn handle_routes_command(cli: &ShorkCli, matches: &clap::ArgMatches) -> Result<()> {
    let config = cli.config()?;
    let manifest = ManifestBuilder::new(config).build()?;

    if matches.get_flag("json") {
        let json = serde_json::to_string_pretty(&manifest).map_err(|e| BuildError::InvalidFormat {
            message: format!("Failed to serialize manifest: {}", e),
        })?;
        println!("{}", json);
    } else {
        print_routes(&manifest, &config.root_dir);
    }
    Ok(())
}

fn print_routes(manifest: &Manifest, root: &Path) {
    println!("🗺️  {} routes ({} static)", manifest.routes.len(), manifest.static_count());
    for route in &manifest.routes {
        let kind = if route.is_dynamic() { "dynamic" } else { "static" };
        println!("\n   {} [{}]", route.path, kind);
        println!("     page:   {}", relative_display(&route.page, root));
        println!("     layout: {}", relative_display(&route.layout, root));
        if let Some(js) = &route.js {
            println!("     data:   {}", relative_display(js, root));
        }
        if let Some(schema) = &route.schema {
            println!("     schema: {}", relative_display(schema, root));
        }
    }
}

// --- COMPILE ---
pub fn handle_compile_command(cli: &ShorkCli, matches: &clap::ArgMatches) -> Result<()> {
    let config = cli.config()?;
    let input_path: &PathBuf = matches
        .get_one::<PathBuf>("input")
        .ok_or_else(|| BuildError::config("no input template given"))?;
    let target: Target = matches
        .get_one::<DialectTarget>("target")
        .copied()
        .map(Target::from)
        .unwrap_or_default();

    let mut session = BuildSession::new(config);
    let compiled = Preprocessor::new(target, config.scope_css).preprocess_file(input_path, &mut session)?;

    println!("{}", compiled.template);
    if !compiled.css.is_empty() {
        println!("\n/* css */\n{}", compiled.css);
    }
    if !compiled.js.is_empty() {
        println!("\n/* js */{}", compiled.js);
    }
    log::info!(
        "Compiled {} to {} ({} components)",
        input_path.display(),
        target,
        session.components.len()
    );
    Ok(())
}
