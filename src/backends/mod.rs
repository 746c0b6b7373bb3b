//! Source adapters ("origins")
//!
//! An origin describes one external source instance and enumerates the child
//! records of any container in it. Containers are addressed by their
//! [`Lineage`]: the typed keys from the resource down to the container.

pub mod directory;
#[cfg(feature = "postgres")]
pub mod postgresql;

pub use directory::DirectoryOrigin;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresOrigin;

use crate::graph::models::{value_key, NodeType};
use crate::graph::packer::Properties;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One record observed in the source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub label: Option<String>,
    pub properties: Properties,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The identifying key, if the record carries the attribute
    pub fn key(&self, name_attribute: &str) -> Option<String> {
        self.properties.get(name_attribute).and_then(value_key)
    }
}

/// A cross-reference descriptor pointing at a column elsewhere in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub column: String,
}

/// One step of a lineage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub node_type: NodeType,
    pub key: String,
}

/// Path from the resource (exclusive) down to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    segments: Vec<Segment>,
}

impl Lineage {
    /// The resource itself
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Key of the segment at `depth` (0 = directly under the resource)
    pub fn key(&self, depth: usize) -> Option<&str> {
        self.segments.get(depth).map(|s| s.key.as_str())
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn child(&self, node_type: NodeType, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment {
            node_type,
            key: key.into(),
        });
        Self { segments }
    }

    /// Component id derived from the lineage: keys joined by `.`, with `.`
    /// and `\` inside a key escaped by a backslash.
    pub fn id(&self) -> String {
        encode_id(self.segments.iter().map(|s| s.key.as_str()))
    }
}

/// Join keys into an id that decodes back to the same keys.
pub fn encode_id<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
    let mut id = String::new();
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            id.push('.');
        }
        for c in key.chars() {
            if c == '.' || c == '\\' {
                id.push('\\');
            }
            id.push(c);
        }
    }
    id
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            return write!(f, "<root>");
        }
        write!(f, "{}", self.id())
    }
}

/// Capability interface required of every source adapter.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Type of the resource registered for this origin
    fn resource_type(&self) -> NodeType;

    /// Stable resource id, unique across origins
    fn resource_id(&self) -> String;

    /// Current attributes of the source instance itself
    async fn describe(&self) -> Result<RawRecord>;

    /// Kind of children held by a container of the given kind; `None` for leaves
    fn child_type(&self, parent: NodeType) -> Option<NodeType>;

    /// Attribute identifying records of a kind within their parent
    fn name_attribute(&self, node_type: NodeType) -> &'static str {
        node_type.name_attribute()
    }

    /// Child records of the container at `lineage`, in source order
    async fn children(&self, lineage: &Lineage) -> Result<Vec<RawRecord>>;

    /// Reference descriptors of the entity at `lineage`
    async fn references(&self, _lineage: &Lineage) -> Result<Vec<Reference>> {
        Ok(Vec::new())
    }
}
