mod handlers;

use crate::config::SiteConfig;
use crate::dialect::Target;
use crate::error::Result;
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DialectTarget {
    Ejs,
    Jinja,
}

impl From<DialectTarget> for Target {
    fn from(target: DialectTarget) -> Self {
        match target {
            DialectTarget::Ejs => Target::Ejs,
            DialectTarget::Jinja => Target::Jinja,
        }
    }
}

pub struct ShorkCli {
    config: Option<SiteConfig>,
    start_time: Instant,
}

impl Default for ShorkCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ShorkCli {
    pub fn new() -> Self {
        Self {
            config: None,
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"))?;

        let root = matches
            .get_one::<PathBuf>("root")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("."));
        let config_path = matches.get_one::<PathBuf>("config").map(PathBuf::as_path);
        self.config = Some(SiteConfig::load(root, config_path)?);

        match matches.subcommand() {
            Some(("build", _)) => handlers::handle_build_command(self),
            Some(("routes", sub_matches)) => handlers::handle_routes_command(self, sub_matches),
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    pub fn config(&self) -> Result<&SiteConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| crate::BuildError::config("configuration has not been loaded"))
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Shork Development Team")
            .arg(
                Arg::new("root")
                    .short('r')
                    .long("root")
                    .value_name("DIR")
                    .help("Project root directory")
                    .value_parser(clap::value_parser!(PathBuf))
                    .default_value(".")
                    .global(true),
            )
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.toml or .json)")
                    .value_parser(clap::value_parser!(PathBuf))
                    .action(ArgAction::Set)
                    .global(true),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count)
                    .global(true),
            )
            .subcommand(Command::new("build").about("Build every route into the output directory"))
            .subcommand(
                Command::new("routes")
                    .about("Discover routes and print the manifest")
                    .arg(Arg::new("json").long("json").help("Print the raw manifest JSON").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("compile")
                    .about("Preprocess one template and print the compiled result")
                    .arg(
                        Arg::new("input")
                            .help("Template file")
                            .required(true)
                            .value_parser(clap::value_parser!(PathBuf))
                            .index(1),
                    )
                    .arg(
                        Arg::new("target")
                            .short('t')
                            .long("target")
                            .value_parser(clap::value_parser!(DialectTarget))
                            .default_value("jinja")
                            .help("Template language to compile to"),
                    ),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }
}

/// `path` relative to `root` for display
pub(crate) fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        ShorkCli::new().build_cli().debug_assert();
    }

    #[test]
    fn test_parse_compile_target() {
        let matches = ShorkCli::new()
            .build_cli()
            .try_get_matches_from(["shork", "-vv", "compile", "page.html", "--target", "ejs"])
            .unwrap();
        assert_eq!(matches.get_count("verbose"), 2);

        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "compile");
        let target = *sub_matches.get_one::<DialectTarget>("target").unwrap();
        assert_eq!(Target::from(target), Target::Ejs);
    }

    #[test]
    fn test_relative_display() {
        assert_eq!(
            relative_display(Path::new("/site/src/routes/+page.html"), Path::new("/site")),
            "src/routes/+page.html"
        );
    }
}
