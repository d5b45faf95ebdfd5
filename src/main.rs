//! datadict
//!
//! Loads typed dicts over a catalog from static data and reloadable packs,
//! checks them, dumps them, or keeps them in sync with the pack directories.

use anyhow::{Context, Result, bail};
use clap::Parser;
use datadict::catalog::MemoryCatalog;
use datadict::cli::{CheckArgs, Cli, Command, DumpArgs};
use datadict::config::{CatalogFile, Config, ConfigInitializer, ConfigLoader};
use datadict::fragment::FragmentFormat;
use datadict::identifier::Identifier;
use datadict::registry::DictRegistry;
use datadict::reload::ReloadReport;
use datadict::reload::watcher::{WatcherConfig, start_pack_watcher};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

type Registry = DictRegistry<Identifier>;

/// Reports of one full load, printed by `check --json`.
#[derive(Debug, Serialize)]
struct CheckReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    static_data: Option<ReloadReport>,
    packs: ReloadReport,
}

impl CheckReport {
    fn error_count(&self) -> usize {
        self.packs.errors.len()
            + self
                .static_data
                .as_ref()
                .map(|report| report.errors.len())
                .unwrap_or(0)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(cli.log_filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(cli.log_filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(cli.log_filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_file(Path::new(path))?,
        None => ConfigLoader::load()?,
    };
    for (tier, path) in loader.sources() {
        info!(tier = %tier, "Using config {}", path.display());
    }
    let config = loader.into_config();
    let registry = Arc::new(build_registry(&config)?);

    match cli.command {
        None => run_check(&config, &registry, CheckArgs::default()).await,
        Some(Command::Check(args)) => run_check(&config, &registry, args).await,
        Some(Command::Dump(args)) => run_dump(&config, &registry, args).await,
        Some(Command::Watch) => run_watch(&config, registry).await,
    }
}

/// Register the catalog's kinds and the configured dicts.
fn build_registry(config: &Config) -> Result<Registry> {
    let catalogs: BTreeMap<String, Arc<MemoryCatalog>> = match &config.catalog {
        Some(path) => CatalogFile::load(path)?.into_catalogs(),
        None => {
            warn!("No catalog configured; no dict kinds are available");
            BTreeMap::new()
        }
    };
    let init = ConfigInitializer::new(catalogs, config.dicts.clone());
    Ok(DictRegistry::bootstrap(&[&init]))
}

/// Static data once, then one pack reload.
async fn load_all(config: &Config, registry: &Registry) -> CheckReport {
    let static_data = match config.static_pipeline() {
        Some(pipeline) => Some(pipeline.load_static(registry).await),
        None => None,
    };
    let packs = config.pack_pipeline().reload(registry).await;
    CheckReport { static_data, packs }
}

async fn run_check(config: &Config, registry: &Registry, args: CheckArgs) -> Result<()> {
    let report = load_all(config, registry).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(static_data) = &report.static_data {
            print_report("static", static_data);
        }
        print_report("packs", &report.packs);
    }

    let errors = report.error_count();
    if errors > 0 {
        bail!("{} problem(s) found while loading dicts", errors);
    }
    Ok(())
}

fn print_report(label: &str, report: &ReloadReport) {
    println!(
        "{}: {} kind(s), {} dict(s), {} fragment(s), {} error(s)",
        label,
        report.kinds.len(),
        report.dicts_rebuilt,
        report.fragments_applied,
        report.errors.len()
    );
    for error in &report.errors {
        println!("  {}", error);
    }
}

async fn run_dump(config: &Config, registry: &Registry, args: DumpArgs) -> Result<()> {
    load_all(config, registry).await;

    let scope = args.scope();
    let dict = registry
        .find_dict(scope, &args.kind, &args.id)
        .with_context(|| format!("No {} {} dict named {}", scope, args.kind, args.id))?;
    let rendered = FragmentFormat::from(args.format).render(&dict.to_document())?;
    println!("{}", rendered.trim_end());
    Ok(())
}

async fn run_watch(config: &Config, registry: Arc<Registry>) -> Result<()> {
    let report = load_all(config, &registry).await;
    if report.error_count() > 0 {
        warn!(errors = report.error_count(), "Initial load reported problems");
    }

    if !config.watch.enabled {
        info!("Pack watching disabled in config; nothing left to do");
        return Ok(());
    }
    if config.sources.packs.is_empty() {
        info!("No pack directories configured; nothing to watch");
        return Ok(());
    }

    let mut handle = start_pack_watcher(
        config.sources.packs.clone(),
        WatcherConfig::with_debounce_ms(config.watch.debounce_ms),
        config.format.extension(),
    )
    .context("Failed to start pack watcher")?;
    info!("Pack watcher started; press Ctrl-C to stop");

    let pipeline = config.pack_pipeline();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
            event = handle.wait_for_change() => match event {
                Some(event) => {
                    if event.requires_reload() {
                        info!("Pack change detected: {:?}", event);
                        pipeline.reload(registry.as_ref()).await;
                    }
                }
                None => {
                    info!("Pack watcher stopped");
                    return Ok(());
                }
            },
        }
    }
}
