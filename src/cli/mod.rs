//! CLI command definitions for datadict
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::fragment::FragmentFormat;
use crate::identifier::Identifier;
use crate::registry::DictScope;

/// Data-driven dicts over a catalog, loaded from packs and static data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Log filter: `--verbose` picks the default level, `RUST_LOG` refines it.
    pub fn log_filter(&self) -> EnvFilter {
        let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        self.log_filter_with(directives.as_deref())
    }

    fn log_filter_with(&self, directives: Option<&str>) -> EnvFilter {
        let level = if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        EnvFilter::builder()
            .with_default_directive(level.into())
            .parse_lossy(directives.unwrap_or_default())
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load static data and packs once and report problems (default)
    Check(CheckArgs),

    /// Print one dict as a fragment document
    Dump(DumpArgs),

    /// Load everything, then reload packs whenever they change
    Watch,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Print the reports as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Dict kind, e.g. `block`
    pub kind: String,

    /// Dict identifier, e.g. `mymod:hardness`
    pub id: Identifier,

    /// Dump the static dict instead of the reloadable one
    #[arg(long = "static")]
    pub static_scope: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = DumpFormat::Json)]
    pub format: DumpFormat,
}

impl DumpArgs {
    pub fn scope(&self) -> DictScope {
        if self.static_scope {
            DictScope::Static
        } else {
            DictScope::Reloadable
        }
    }
}

/// Output format for `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DumpFormat {
    #[default]
    Json,
    Json5,
    Yaml,
}

impl From<DumpFormat> for FragmentFormat {
    fn from(format: DumpFormat) -> Self {
        match format {
            DumpFormat::Json => FragmentFormat::Json,
            DumpFormat::Json5 => FragmentFormat::Json5,
            DumpFormat::Yaml => FragmentFormat::Yaml,
        }
    }
}
