//! Configuration system.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `$CWD/datadict/config.yaml`
//! 3. **User** - `~/.datadict/config.yaml`
//! 4. **Environment** - the variables below
//!
//! ## Environment Variables
//! - `DATADICT_CONFIG_PATH` - Explicit config file (bypasses the file tiers)
//! - `DATADICT_PROJECT_DIR` - Project config dir (default: `./datadict`)
//! - `DATADICT_USER_DIR` - User config dir (default: `~/.datadict`)
//! - `DATADICT_PACKS` - Pack roots, as a platform path list
//! - `DATADICT_STATIC_ROOT` - Root of the shared static data area
//! - `DATADICT_CATALOG` - Catalog file

mod catalog_file;
mod loader;
mod merge;
mod types;

pub use catalog_file::{CatalogFile, ConfigInitializer, KindCatalog};
pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, apply_env_overrides};
pub use merge::{merge_into, merge_tiers};
pub use types::*;
