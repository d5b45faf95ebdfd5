//! Configuration types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::ValueType;
use crate::fragment::FragmentFormat;
use crate::identifier::Identifier;
use crate::registry::DictScope;
use crate::reload::ReloadPipeline;
use crate::sources::{PackDirSource, StaticDataSource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Format every fragment file is written in.
    #[serde(default)]
    pub format: FragmentFormat,

    #[serde(default)]
    pub watch: WatchConfig,

    /// YAML catalog file declaring kinds, entries and tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Dicts to register at startup.
    #[serde(default)]
    pub dicts: Vec<DictDeclaration>,
}

impl Config {
    /// Load a single config file, bypassing tiers.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Pipeline over every configured pack root, in order.
    pub fn pack_pipeline(&self) -> ReloadPipeline {
        self.sources
            .packs
            .iter()
            .fold(ReloadPipeline::new(self.format), |pipeline, root| {
                pipeline.with_source(Arc::new(PackDirSource::new(root)))
            })
    }

    /// Pipeline over the static data areas, if any are configured.
    pub fn static_pipeline(&self) -> Option<ReloadPipeline> {
        if self.sources.contributors.is_empty() && self.sources.static_root.is_none() {
            return None;
        }
        let mut source = StaticDataSource::new();
        for contributor in &self.sources.contributors {
            source = source.with_contributor(&contributor.namespace, &contributor.root);
        }
        if let Some(root) = &self.sources.static_root {
            source = source.with_shared_root(root);
        }
        Some(ReloadPipeline::new(self.format).with_source(Arc::new(source)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Pack roots, applied in this order.
    #[serde(default)]
    pub packs: Vec<PathBuf>,

    /// Root holding the shared `static_data/content` area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_root: Option<PathBuf>,

    #[serde(default)]
    pub contributors: Vec<ContributorConfig>,
}

/// A namespace with its own `static_data` area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorConfig {
    pub namespace: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_watch_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// One dict registered from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictDeclaration {
    pub kind: String,
    pub id: Identifier,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub scope: DictScope,
}
