//! Dict kinds and the dicts registered under them.
//!
//! The registry is built once at startup through `&mut self` calls (usually
//! from [`DictInitializer`]s via [`DictRegistry::bootstrap`]) and then shared
//! read-only, typically as an `Arc<DictRegistry<E>>`. Because registration
//! needs a mutable borrow it cannot race a reload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::catalog::{Catalog, DictKind, Entry, TagSource};
use crate::codec::{CodecRegistry, ValueCodec, ValueType};
use crate::dict::Dict;
use crate::error::{DictError, DictResult};
use crate::identifier::Identifier;

/// Which source class populates a dict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictScope {
    /// Rebuilt from pack sources on every reload.
    #[default]
    Reloadable,
    /// Filled once from static data at startup.
    Static,
}

impl fmt::Display for DictScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictScope::Reloadable => write!(f, "reloadable"),
            DictScope::Static => write!(f, "static"),
        }
    }
}

/// Startup hooks that register kinds, codecs and dicts.
pub trait DictInitializer<E: Entry> {
    /// Register dict kinds and value codecs. Runs before any
    /// [`DictInitializer::register_dicts`].
    fn init_dict_types(&self, _registry: &mut DictRegistry<E>) {}

    /// Register dicts.
    fn register_dicts(&self, registry: &mut DictRegistry<E>);
}

type DictTable<E> = BTreeMap<Identifier, Arc<Dict<E>>>;

pub struct DictRegistry<E: Entry> {
    kinds: BTreeMap<String, DictKind<E>>,
    dicts: HashMap<(DictScope, String), DictTable<E>>,
    codecs: CodecRegistry,
}

impl<E: Entry> DictRegistry<E> {
    pub fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
            dicts: HashMap::new(),
            codecs: CodecRegistry::with_builtins(),
        }
    }

    /// Build a registry by running every initializer's type hook, then every
    /// initializer's dict hook.
    pub fn bootstrap(initializers: &[&dyn DictInitializer<E>]) -> Self {
        let mut registry = Self::new();
        for init in initializers {
            init.init_dict_types(&mut registry);
        }
        for init in initializers {
            init.register_dicts(&mut registry);
        }
        info!(
            kinds = registry.kinds.len(),
            dicts = registry.dict_count(),
            "Dict registry bootstrapped"
        );
        registry
    }

    // ---- Registration ----

    /// Register a dict kind. A second registration under the same name is
    /// reported and ignored.
    pub fn register_kind(
        &mut self,
        name: impl Into<String>,
        catalog: Arc<dyn Catalog<E>>,
        tags: Arc<dyn TagSource<E>>,
    ) -> DictResult<()> {
        let name = name.into();
        if self.kinds.contains_key(&name) {
            let err = DictError::duplicate_kind(&name);
            error!(kind = %name, "Could not register dict kind: {}", err);
            return Err(err);
        }
        debug!(kind = %name, "Registered dict kind");
        self.kinds
            .insert(name.clone(), DictKind::new(name, catalog, tags));
        Ok(())
    }

    /// Add a codec for a new value type.
    pub fn add_value_codec(&mut self, codec: Arc<dyn ValueCodec>) -> DictResult<()> {
        self.codecs.register(codec).inspect_err(|err| {
            error!("Could not add value codec: {}", err);
        })
    }

    /// Register a dict rebuilt on every reload.
    pub fn register_dict(
        &mut self,
        id: Identifier,
        kind: &str,
        value_type: ValueType,
    ) -> DictResult<Arc<Dict<E>>> {
        self.register_dict_in(DictScope::Reloadable, id, kind, value_type)
    }

    /// Register a dict filled once from static data.
    pub fn register_static_dict(
        &mut self,
        id: Identifier,
        kind: &str,
        value_type: ValueType,
    ) -> DictResult<Arc<Dict<E>>> {
        self.register_dict_in(DictScope::Static, id, kind, value_type)
    }

    pub fn register_dict_in(
        &mut self,
        scope: DictScope,
        id: Identifier,
        kind: &str,
        value_type: ValueType,
    ) -> DictResult<Arc<Dict<E>>> {
        let result = self.try_register(scope, id.clone(), kind, value_type);
        if let Err(ref err) = result {
            error!(kind = %kind, dict = %id, scope = %scope, "Could not register dict: {}", err);
        }
        result
    }

    fn try_register(
        &mut self,
        scope: DictScope,
        id: Identifier,
        kind_name: &str,
        value_type: ValueType,
    ) -> DictResult<Arc<Dict<E>>> {
        let kind = self
            .kinds
            .get(kind_name)
            .cloned()
            .ok_or_else(|| DictError::unknown_kind(kind_name))?;
        let codec = self
            .codecs
            .get(&value_type)
            .ok_or_else(|| DictError::unknown_value_type(value_type.name()).with_kind(kind_name))?;

        let table = self.dicts.entry((scope, kind_name.to_string())).or_default();
        if table.contains_key(&id) {
            return Err(DictError::duplicate_dict(kind_name, &id));
        }

        let dict = Arc::new(Dict::new(id.clone(), kind, value_type, codec));
        table.insert(id, Arc::clone(&dict));
        debug!(
            kind = %kind_name,
            dict = %dict.id(),
            scope = %scope,
            value_type = %dict.value_type(),
            "Registered dict"
        );
        Ok(dict)
    }

    /// Registration helper bound to one kind.
    pub fn kind_registrar<'a>(&'a mut self, kind: &str) -> KindRegistrar<'a, E> {
        KindRegistrar {
            registry: self,
            kind: kind.to_string(),
        }
    }

    // ---- Lookup ----

    /// Find a reloadable dict. `None` if the kind or id is unknown or the
    /// dict stores a different value type.
    pub fn get_dict(
        &self,
        kind: &str,
        value_type: &ValueType,
        id: &Identifier,
    ) -> Option<Arc<Dict<E>>> {
        self.get_dict_in(DictScope::Reloadable, kind, value_type, id)
    }

    pub fn get_static_dict(
        &self,
        kind: &str,
        value_type: &ValueType,
        id: &Identifier,
    ) -> Option<Arc<Dict<E>>> {
        self.get_dict_in(DictScope::Static, kind, value_type, id)
    }

    pub fn get_dict_in(
        &self,
        scope: DictScope,
        kind: &str,
        value_type: &ValueType,
        id: &Identifier,
    ) -> Option<Arc<Dict<E>>> {
        let dict = self.dicts.get(&(scope, kind.to_string()))?.get(id)?;
        if dict.value_type() != value_type {
            debug!(
                kind = %kind,
                dict = %id,
                requested = %value_type,
                declared = %dict.value_type(),
                "Dict exists with a different value type"
            );
            return None;
        }
        Some(Arc::clone(dict))
    }

    /// Look up a dict regardless of its value type.
    pub fn find_dict(&self, scope: DictScope, kind: &str, id: &Identifier) -> Option<Arc<Dict<E>>> {
        self.dicts
            .get(&(scope, kind.to_string()))?
            .get(id)
            .cloned()
    }

    pub fn kind(&self, name: &str) -> Option<&DictKind<E>> {
        self.kinds.get(name)
    }

    /// Registered kind names in sorted order.
    pub fn kind_names(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }

    /// Every dict of one kind and scope, sorted by identifier.
    pub fn dicts(&self, scope: DictScope, kind: &str) -> Vec<Arc<Dict<E>>> {
        self.dicts
            .get(&(scope, kind.to_string()))
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dict_count(&self) -> usize {
        self.dicts.values().map(BTreeMap::len).sum()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }
}

impl<E: Entry> Default for DictRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entry> fmt::Debug for DictRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictRegistry")
            .field("kinds", &self.kind_names())
            .field("dicts", &self.dict_count())
            .field("codecs", &self.codecs)
            .finish()
    }
}

/// Borrowed registration helper that fills in the kind name.
pub struct KindRegistrar<'a, E: Entry> {
    registry: &'a mut DictRegistry<E>,
    kind: String,
}

impl<E: Entry> KindRegistrar<'_, E> {
    pub fn register(&mut self, id: Identifier, value_type: ValueType) -> DictResult<Arc<Dict<E>>> {
        self.registry.register_dict(id, &self.kind, value_type)
    }

    pub fn register_static(
        &mut self,
        id: Identifier,
        value_type: ValueType,
    ) -> DictResult<Arc<Dict<E>>> {
        self.registry.register_static_dict(id, &self.kind, value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::codec::{CodecError, Value, encode_generic};
    use crate::error::ErrorCode;
    use serde_json::Value as Raw;

    fn id(s: &str) -> Identifier {
        s.parse().unwrap()
    }

    fn registry_with_block() -> (DictRegistry<Identifier>, Arc<MemoryCatalog>) {
        let catalog = Arc::new(MemoryCatalog::new());
        let mut registry = DictRegistry::new();
        registry
            .register_kind("block", catalog.clone(), catalog.clone())
            .unwrap();
        (registry, catalog)
    }

    #[test]
    fn test_duplicate_kind_keeps_first() {
        let (mut registry, _) = registry_with_block();
        registry
            .register_dict(id("a:hardness"), "block", ValueType::INT)
            .unwrap();

        let other = Arc::new(MemoryCatalog::new());
        let err = registry
            .register_kind("block", other.clone(), other)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateKind);
        // Existing dicts of the first registration are still reachable.
        assert!(registry
            .get_dict("block", &ValueType::INT, &id("a:hardness"))
            .is_some());
    }

    #[test]
    fn test_duplicate_dict_preserves_existing() {
        let (mut registry, catalog) = registry_with_block();
        catalog.insert_entry(id("a:stone"));
        let first = registry
            .register_dict(id("a:hardness"), "block", ValueType::INT)
            .unwrap();
        let mut values = serde_json::Map::new();
        values.insert("a:stone".into(), Raw::from(3));
        first
            .from_document(&crate::fragment::Fragment::from_values(values), false, false)
            .unwrap();

        let err = registry
            .register_dict(id("a:hardness"), "block", ValueType::STRING)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateDict);

        let again = registry
            .get_dict("block", &ValueType::INT, &id("a:hardness"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.get_int(&id("a:stone")), Some(3));
    }

    #[test]
    fn test_unknown_kind_and_value_type() {
        let (mut registry, _) = registry_with_block();
        let err = registry
            .register_dict(id("a:x"), "fluid", ValueType::INT)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownKind);

        let err = registry
            .register_dict(id("a:x"), "block", ValueType::new("color"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownValueType);
        assert_eq!(registry.dict_count(), 0);
    }

    #[test]
    fn test_get_dict_checks_value_type() {
        let (mut registry, _) = registry_with_block();
        registry
            .register_dict(id("a:names"), "block", ValueType::STRING)
            .unwrap();

        assert!(registry
            .get_dict("block", &ValueType::STRING, &id("a:names"))
            .is_some());
        assert!(registry
            .get_dict("block", &ValueType::INT, &id("a:names"))
            .is_none());
        assert!(registry
            .get_dict("item", &ValueType::STRING, &id("a:names"))
            .is_none());
        assert!(registry
            .get_dict("block", &ValueType::STRING, &id("a:other"))
            .is_none());
    }

    #[test]
    fn test_scopes_are_independent() {
        let (mut registry, _) = registry_with_block();
        let pack = registry
            .register_dict(id("a:x"), "block", ValueType::INT)
            .unwrap();
        let stat = registry
            .register_static_dict(id("a:x"), "block", ValueType::INT)
            .unwrap();
        assert!(!Arc::ptr_eq(&pack, &stat));
        assert_eq!(registry.dicts(DictScope::Reloadable, "block").len(), 1);
        assert_eq!(registry.dicts(DictScope::Static, "block").len(), 1);
        assert!(registry
            .get_static_dict("block", &ValueType::INT, &id("a:x"))
            .is_some());
    }

    #[test]
    fn test_kind_registrar() {
        let (mut registry, _) = registry_with_block();
        {
            let mut block = registry.kind_registrar("block");
            block.register(id("a:one"), ValueType::INT).unwrap();
            block.register_static(id("a:two"), ValueType::BOOL).unwrap();
        }
        assert!(registry.find_dict(DictScope::Reloadable, "block", &id("a:one")).is_some());
        assert!(registry.find_dict(DictScope::Static, "block", &id("a:two")).is_some());
    }

    #[test]
    fn test_bootstrap_runs_type_hooks_first() {
        struct Color;
        impl ValueCodec for Color {
            fn value_type(&self) -> ValueType {
                ValueType::new("color")
            }
            fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
                raw.as_str()
                    .filter(|s| s.starts_with('#'))
                    .map(|s| Value::Text(s.to_string()))
                    .ok_or_else(|| CodecError::Invalid("expected #rrggbb".into()))
            }
            fn encode(&self, value: &Value) -> Raw {
                encode_generic(value)
            }
        }

        struct Dicts;
        impl DictInitializer<Identifier> for Dicts {
            fn register_dicts(&self, registry: &mut DictRegistry<Identifier>) {
                registry
                    .register_dict(id("a:tint"), "block", ValueType::new("color"))
                    .unwrap();
            }
        }

        struct Types;
        impl DictInitializer<Identifier> for Types {
            fn init_dict_types(&self, registry: &mut DictRegistry<Identifier>) {
                let catalog = Arc::new(MemoryCatalog::new());
                registry
                    .register_kind("block", catalog.clone(), catalog)
                    .unwrap();
                registry.add_value_codec(Arc::new(Color)).unwrap();
            }
            fn register_dicts(&self, _registry: &mut DictRegistry<Identifier>) {}
        }

        // Dicts comes first in the list but still sees the kind and codec.
        let registry = DictRegistry::bootstrap(&[&Dicts, &Types]);
        assert!(registry
            .get_dict("block", &ValueType::new("color"), &id("a:tint"))
            .is_some());
    }
}
