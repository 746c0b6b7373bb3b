//! Attribute packing
//!
//! Nodes are stored as a single flat property map. Framework-owned attributes
//! (`uuid`, `id`, `label`, `type`, timestamps, ...) live under the `origins:`
//! namespace; domain properties are stored unprefixed next to them.

use serde_json::Value;
use std::collections::BTreeMap;

/// Namespace prefix for framework-owned attributes
pub const PACK_PREFIX: &str = "origins:";

/// Structural keys that are never persisted as properties.
pub const IGNORED_ATTRS: &[&str] = &["start", "end", "parent", "resource"];

/// Flat, namespaced property map as stored on a node
pub type WireMap = BTreeMap<String, Value>;

/// Domain properties of a node
pub type Properties = BTreeMap<String, Value>;

/// Structured attribute record: framework fields plus domain properties.
///
/// `properties == None` is the explicit "empty" marker produced by [`unpack`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
    pub properties: Option<Properties>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a framework field (builder pattern)
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Option<Properties>) -> Self {
        self.properties = properties;
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

/// Namespaced wire key for a framework field (`uuid` -> `origins:uuid`)
pub fn key(field: &str) -> String {
    format!("{}{}", PACK_PREFIX, field)
}

/// Whether a wire key belongs to the framework namespace
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(PACK_PREFIX)
}

/// Flatten a record into its wire representation.
///
/// Null values are dropped entirely, both for fields and properties.
pub fn pack(record: &Record) -> WireMap {
    let mut wire = WireMap::new();

    for (k, v) in &record.fields {
        if v.is_null() || IGNORED_ATTRS.contains(&k.as_str()) {
            continue;
        }
        wire.insert(key(k), v.clone());
    }

    if let Some(properties) = &record.properties {
        for (k, v) in properties {
            if !v.is_null() {
                wire.insert(k.clone(), v.clone());
            }
        }
    }

    wire
}

/// Restore a record from its wire representation.
pub fn unpack(wire: &WireMap) -> Record {
    let mut record = Record::new();
    let mut properties = Properties::new();

    for (k, v) in wire {
        match k.strip_prefix(PACK_PREFIX) {
            Some(field) => {
                record.fields.insert(field.to_string(), v.clone());
            }
            None => {
                properties.insert(k.clone(), v.clone());
            }
        }
    }

    record.properties = if properties.is_empty() {
        None
    } else {
        Some(properties)
    };
    record
}

/// Unpack a row fanned out into positional columns; only the first is used.
pub fn unpack_row(row: &[WireMap]) -> Option<Record> {
    row.first().map(unpack)
}
