//! Storage behind a dict: unboxed integers or generic values.

use std::collections::HashMap;

use crate::catalog::Entry;
use crate::codec::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mapping<E: Entry> {
    Int(HashMap<E, i32>),
    Generic(HashMap<E, Value>),
}

impl<E: Entry> Mapping<E> {
    pub(crate) fn new(int: bool) -> Self {
        if int {
            Mapping::Int(HashMap::new())
        } else {
            Mapping::Generic(HashMap::new())
        }
    }

    /// An empty mapping of the same representation.
    pub(crate) fn empty_like(&self) -> Self {
        Self::new(matches!(self, Mapping::Int(_)))
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Mapping::Int(map) => map.len(),
            Mapping::Generic(map) => map.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn contains(&self, entry: &E) -> bool {
        match self {
            Mapping::Int(map) => map.contains_key(entry),
            Mapping::Generic(map) => map.contains_key(entry),
        }
    }

    pub(crate) fn get(&self, entry: &E) -> Option<Value> {
        match self {
            Mapping::Int(map) => map.get(entry).copied().map(Value::Int),
            Mapping::Generic(map) => map.get(entry).cloned(),
        }
    }

    pub(crate) fn get_int(&self, entry: &E) -> Option<i32> {
        match self {
            Mapping::Int(map) => map.get(entry).copied(),
            Mapping::Generic(map) => match map.get(entry) {
                Some(Value::Int(v)) => Some(*v),
                _ => None,
            },
        }
    }

    /// Insert a decoded value. Integer storage hands back anything that is
    /// not a [`Value::Int`].
    pub(crate) fn insert(&mut self, entry: E, value: Value) -> Result<(), Value> {
        match (self, value) {
            (Mapping::Int(map), Value::Int(v)) => {
                map.insert(entry, v);
                Ok(())
            }
            (Mapping::Int(_), other) => Err(other),
            (Mapping::Generic(map), value) => {
                map.insert(entry, value);
                Ok(())
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        match self {
            Mapping::Int(map) => map.clear(),
            Mapping::Generic(map) => map.clear(),
        }
    }

    pub(crate) fn keys(&self) -> Vec<E> {
        match self {
            Mapping::Int(map) => map.keys().cloned().collect(),
            Mapping::Generic(map) => map.keys().cloned().collect(),
        }
    }

    pub(crate) fn to_values(&self) -> HashMap<E, Value> {
        match self {
            Mapping::Int(map) => map
                .iter()
                .map(|(entry, v)| (entry.clone(), Value::Int(*v)))
                .collect(),
            Mapping::Generic(map) => map.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_mapping_rejects_non_int() {
        let mut mapping: Mapping<&'static str> = Mapping::new(true);
        assert!(mapping.insert("a", Value::Int(1)).is_ok());
        assert_eq!(
            mapping.insert("b", Value::Text("x".into())),
            Err(Value::Text("x".into()))
        );
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get(&"a"), Some(Value::Int(1)));
        assert_eq!(mapping.get_int(&"a"), Some(1));
    }

    #[test]
    fn test_generic_mapping_and_clear() {
        let mut mapping: Mapping<&'static str> = Mapping::new(false);
        mapping.insert("a", Value::Bool(true)).unwrap();
        mapping.insert("b", Value::Int(2)).unwrap();
        assert!(mapping.contains(&"a"));
        assert_eq!(mapping.get_int(&"b"), Some(2));
        assert_eq!(mapping.get_int(&"a"), None);

        let empty = mapping.empty_like();
        assert!(empty.is_empty());
        assert!(matches!(empty, Mapping::Generic(_)));

        mapping.clear();
        assert!(mapping.is_empty());
    }
}
