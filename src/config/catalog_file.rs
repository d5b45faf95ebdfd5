//! YAML catalog file and the initializer that registers config-declared
//! kinds and dicts.
//!
//! ```yaml
//! kinds:
//!   block:
//!     entries: [mymod:stone, mymod:granite]
//!     tags:
//!       mymod:rocks: [mymod:stone, mymod:granite]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::DictDeclaration;
use crate::catalog::MemoryCatalog;
use crate::identifier::Identifier;
use crate::registry::{DictInitializer, DictRegistry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub kinds: BTreeMap<String, KindCatalog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindCatalog {
    #[serde(default)]
    pub entries: Vec<Identifier>,
    #[serde(default)]
    pub tags: BTreeMap<Identifier, Vec<Identifier>>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse catalog {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// One in-memory catalog per kind, with tags ready.
    pub fn into_catalogs(self) -> BTreeMap<String, Arc<MemoryCatalog>> {
        self.kinds
            .into_iter()
            .map(|(kind, declared)| {
                let catalog = MemoryCatalog::new();
                catalog.extend_entries(declared.entries);
                for (tag, members) in declared.tags {
                    catalog.set_tag(tag, members);
                }
                debug!(
                    kind = %kind,
                    entries = catalog.entry_count(),
                    tags = catalog.tag_count(),
                    "Loaded catalog"
                );
                (kind, Arc::new(catalog))
            })
            .collect()
    }
}

/// Registers one kind per catalog and every declared dict.
pub struct ConfigInitializer {
    catalogs: BTreeMap<String, Arc<MemoryCatalog>>,
    dicts: Vec<DictDeclaration>,
}

impl ConfigInitializer {
    pub fn new(catalogs: BTreeMap<String, Arc<MemoryCatalog>>, dicts: Vec<DictDeclaration>) -> Self {
        Self { catalogs, dicts }
    }
}

impl DictInitializer<Identifier> for ConfigInitializer {
    fn init_dict_types(&self, registry: &mut DictRegistry<Identifier>) {
        for (kind, catalog) in &self.catalogs {
            // Failures are logged by the registry.
            let _ = registry.register_kind(kind.as_str(), catalog.clone(), catalog.clone());
        }
    }

    fn register_dicts(&self, registry: &mut DictRegistry<Identifier>) {
        for declared in &self.dicts {
            if registry
                .register_dict_in(
                    declared.scope,
                    declared.id.clone(),
                    &declared.kind,
                    declared.value_type.clone(),
                )
                .is_err()
            {
                warn!(kind = %declared.kind, dict = %declared.id, "Declared dict was not registered");
            }
        }
    }
}
