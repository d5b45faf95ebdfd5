//! Document fragments: one parsed unit of dict data.
//!
//! ```json
//! {
//!   "replace": false,
//!   "override": false,
//!   "values": { "mymod:stone": 3, "#mymod:logs": 1 }
//! }
//! ```
//!
//! `values` keeps document order, which decides precedence between keys of
//! the same fragment.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Raw};

use crate::error::{DictError, DictResult};

/// A parsed fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Clear the dict before applying these values.
    #[serde(default)]
    pub replace: bool,
    /// Overwrite entries that already have a value.
    #[serde(default, rename = "override", skip_serializing_if = "is_false")]
    pub override_existing: bool,
    /// Textual key to raw value, in document order.
    pub values: Map<String, Raw>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Fragment {
    /// A fragment with default flags.
    pub fn from_values(values: Map<String, Raw>) -> Self {
        Self {
            replace: false,
            override_existing: false,
            values,
        }
    }

    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn with_override(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    /// The fragment as a raw document.
    pub fn to_value(&self) -> Raw {
        let mut doc = Map::new();
        doc.insert("replace".to_string(), Raw::Bool(self.replace));
        if self.override_existing {
            doc.insert("override".to_string(), Raw::Bool(true));
        }
        doc.insert("values".to_string(), Raw::Object(self.values.clone()));
        Raw::Object(doc)
    }
}

/// Textual format fragments are written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentFormat {
    #[default]
    Json,
    /// JSON with comments, trailing commas and unquoted keys.
    Json5,
    Yaml,
}

impl FragmentFormat {
    /// File extension fragment files must carry, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FragmentFormat::Json => "json",
            FragmentFormat::Json5 => "json5",
            FragmentFormat::Yaml => "yaml",
        }
    }

    /// Parse a fragment. Malformed documents are syntax errors.
    pub fn parse(&self, bytes: &[u8]) -> DictResult<Fragment> {
        match self {
            FragmentFormat::Json => serde_json::from_slice::<Fragment>(bytes)
                .map_err(|err| DictError::syntax(format!("Malformed JSON fragment: {}", err))),
            FragmentFormat::Json5 => std::str::from_utf8(bytes)
                .map_err(|err| DictError::syntax(format!("Fragment is not UTF-8: {}", err)))
                .and_then(|text| {
                    json5::from_str::<Fragment>(text).map_err(|err| {
                        DictError::syntax(format!("Malformed JSON5 fragment: {}", err))
                    })
                }),
            FragmentFormat::Yaml => serde_yaml::from_slice::<Fragment>(bytes)
                .map_err(|err| DictError::syntax(format!("Malformed YAML fragment: {}", err))),
        }
    }

    /// Render a fragment in this format. JSON5 output is plain JSON.
    pub fn render(&self, fragment: &Fragment) -> DictResult<String> {
        match self {
            FragmentFormat::Json | FragmentFormat::Json5 => serde_json::to_string_pretty(fragment)
                .map_err(|err| DictError::syntax(format!("Cannot render fragment: {}", err))),
            FragmentFormat::Yaml => serde_yaml::to_string(fragment)
                .map_err(|err| DictError::syntax(format!("Cannot render fragment: {}", err))),
        }
    }
}

impl std::fmt::Display for FragmentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
