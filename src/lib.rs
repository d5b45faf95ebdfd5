//! datadict
//!
//! Typed key/value dicts over an external catalog of entries and tags,
//! populated from data fragments merged under replace/override rules.

pub mod catalog;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dict;
pub mod error;
pub mod fragment;
pub mod identifier;
pub mod registry;
pub mod reload;
pub mod sources;
