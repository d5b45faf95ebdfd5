//! Configuration loader with tier-based merging.

use super::merge::merge_tiers;
use super::types::Config;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// Project-level config (`$CWD/datadict/`)
    Project = 1,
    /// User-level config (`~/.datadict/`)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: DATADICT_USER_DIR or ~/.datadict
        let user_dir = std::env::var("DATADICT_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".datadict")));

        // Project dir: DATADICT_PROJECT_DIR or $CWD/datadict
        let project_dir = std::env::var("DATADICT_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("datadict")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers, or from `DATADICT_CONFIG_PATH`
    /// when it is set.
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var("DATADICT_CONFIG_PATH") {
            return Self::load_file(Path::new(&explicit));
        }
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load one explicit file. Environment overrides still apply.
    pub fn load_file(path: &Path) -> Result<Self> {
        let mut config = Config::load(path)?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(Self {
            paths: ConfigPaths::with_dirs(None, None),
            config,
            sources: vec![(ConfigTier::Project, path.to_path_buf())],
        })
    }

    /// Load configuration with explicit tier directories.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut loader = Self::load_tiers(paths)?;
        apply_env_overrides(&mut loader.config, |name| std::env::var(name).ok());
        Ok(loader)
    }

    /// Merge defaults, project and user tiers without looking at the
    /// environment.
    pub fn load_tiers(paths: ConfigPaths) -> Result<Self> {
        let mut tiers: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut sources = Vec::new();

        for (tier, dir) in [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ] {
            let Some(dir) = dir else { continue };
            let file = dir.join(CONFIG_FILE);
            if let Some(value) = read_tier(&file, tier) {
                tiers.push(value);
                sources.push((tier, file));
            }
        }

        let config: Config = serde_json::from_value(merge_tiers(tiers))?;
        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

/// Read one tier's file. Missing files are skipped silently, unreadable or
/// malformed ones with a warning.
fn read_tier(file: &Path, tier: ConfigTier) -> Option<Value> {
    if !file.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(err) => {
            warn!(tier = %tier, "Cannot read {}: {}", file.display(), err);
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(tier = %tier, "Loaded config from {}", file.display());
            Some(value)
        }
        Err(err) => {
            warn!(tier = %tier, "Ignoring malformed {}: {}", file.display(), err);
            None
        }
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(packs) = lookup("DATADICT_PACKS") {
        config.sources.packs = std::env::split_paths(&packs).collect();
    }
    if let Some(root) = lookup("DATADICT_STATIC_ROOT") {
        config.sources.static_root = Some(PathBuf::from(root));
    }
    if let Some(catalog) = lookup("DATADICT_CATALOG") {
        config.catalog = Some(PathBuf::from(catalog));
    }
}
