//! Entity graph data models.
//!
//! - [`Model`]: which core model(s) a node belongs to (store-level label)
//! - [`NodeType`]: closed set of entity kinds used for dispatch
//! - [`Node`] / [`Edge`]: parsed vertices and relationships
//! - [`StoredNode`]: raw labels + packed properties as returned by a store
//! - [`NewNode`] / [`NodeUpdate`]: inputs to the entity operations

use super::packer::{self, Properties, Record, WireMap};
use crate::error::{OriginsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

/// Component → Resource, used for identity-scoped lookup
pub const MANAGED_BY: &str = "managed_by";
/// Resource/parent → Component, structural nesting
pub const INCLUDES: &str = "includes";
/// Cross-reference between synchronized components
pub const REFERENCES: &str = "REFERENCES";

// ============================================================================
// Model and type tags
// ============================================================================

/// Core model tag, stored as a namespaced label on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    /// Base label carried by every node
    Node,
    Resource,
    Component,
}

impl Model {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Node => "origins:Node",
            Self::Resource => "origins:Resource",
            Self::Component => "origins:Component",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "origins:Node" => Some(Self::Node),
            "origins:Resource" => Some(Self::Resource),
            "origins:Component" => Some(Self::Component),
            _ => None,
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Kind of entity. Stored both as the `origins:type` field and as a plain
/// label so matches can be type-qualified at the store level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Resource,
    Component,
    Directory,
    Database,
    File,
    Schema,
    Table,
    Column,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "Resource",
            Self::Component => "Component",
            Self::Directory => "Directory",
            Self::Database => "Database",
            Self::File => "File",
            Self::Schema => "Schema",
            Self::Table => "Table",
            Self::Column => "Column",
        }
    }

    /// Whether this kind is a root entity
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource | Self::Directory | Self::Database)
    }

    /// The attribute that identifies a record of this kind within its parent
    pub fn name_attribute(&self) -> &'static str {
        match self {
            Self::File => "path",
            _ => "name",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = OriginsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Resource" => Ok(Self::Resource),
            "Component" => Ok(Self::Component),
            "Directory" => Ok(Self::Directory),
            "Database" => Ok(Self::Database),
            "File" => Ok(Self::File),
            "Schema" => Ok(Self::Schema),
            "Table" => Ok(Self::Table),
            "Column" => Ok(Self::Column),
            other => Err(OriginsError::validation(format!(
                "unknown node type `{}`",
                other
            ))),
        }
    }
}

// ============================================================================
// Store rows
// ============================================================================

/// A node as returned by the store: its labels and packed property map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredNode {
    pub labels: Vec<String>,
    pub properties: WireMap,
}

impl StoredNode {
    /// The store-assigned uuid, if present and well-formed
    pub fn uuid(&self) -> Option<Uuid> {
        self.properties
            .get(&packer::key("uuid"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub start: Uuid,
    pub end: Uuid,
    pub rel_type: String,
    pub properties: Properties,
}

// ============================================================================
// Parsed node
// ============================================================================

/// A graph vertex with its framework attributes unpacked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub uuid: Uuid,
    pub id: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub models: Vec<Model>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub properties: Option<Properties>,
}

fn parse_time(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    record
        .get_str(field)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

impl Node {
    /// Parse a store row into a node.
    pub fn parse(stored: &StoredNode) -> Result<Self> {
        let record = packer::unpack(&stored.properties);

        let uuid = stored
            .uuid()
            .ok_or_else(|| anyhow::anyhow!("stored node has no valid origins:uuid"))?;
        let node_type = record
            .get_str("type")
            .ok_or_else(|| anyhow::anyhow!("node {} has no origins:type", uuid))?
            .parse()?;

        Ok(Self {
            uuid,
            id: record.get_str("id").map(str::to_string),
            label: record.get_str("label").map(str::to_string),
            description: record.get_str("description").map(str::to_string),
            node_type,
            models: stored
                .labels
                .iter()
                .filter_map(|l| Model::from_label(l))
                .collect(),
            created: parse_time(&record, "created"),
            modified: parse_time(&record, "modified"),
            properties: record.properties,
        })
    }

    /// Framework fields plus properties, ready to be packed.
    pub fn to_record(&self) -> Record {
        Record::new()
            .field("uuid", self.uuid.to_string())
            .field("id", self.id.clone())
            .field("label", self.label.clone())
            .field("description", self.description.clone())
            .field("type", self.node_type.as_str())
            .field("created", self.created.map(|t| t.to_rfc3339()))
            .field("modified", self.modified.map(|t| t.to_rfc3339()))
            .with_properties(self.properties.clone())
    }

    pub fn has_model(&self, model: Model) -> bool {
        self.models.contains(&model)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }

    /// String form of a property, for identifying keys
    pub fn property_str(&self, key: &str) -> Option<String> {
        self.property(key).and_then(value_key)
    }
}

/// Render a scalar value as a matching key.
pub fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Attributes for a node about to be created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNode {
    pub id: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub node_type: Option<NodeType>,
    pub properties: Option<Properties>,
}

impl NewNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn of_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Partial update of the mutable attribute set; `None` leaves a field as is.
///
/// `properties`, when given, replaces the whole property set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub description: Option<String>,
    pub node_type: Option<NodeType>,
    pub properties: Option<Properties>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.description.is_none()
            && self.node_type.is_none()
            && self.properties.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(type_name: &str) -> StoredNode {
        let uuid = Uuid::new_v4();
        let mut properties = WireMap::new();
        properties.insert("origins:uuid".into(), json!(uuid.to_string()));
        properties.insert("origins:type".into(), json!(type_name));
        properties.insert("origins:id".into(), json!("public.users"));
        properties.insert("origins:created".into(), json!("2024-03-01T10:00:00+00:00"));
        properties.insert("name".into(), json!("users"));
        StoredNode {
            labels: vec![
                "origins:Node".into(),
                "origins:Component".into(),
                type_name.into(),
            ],
            properties,
        }
    }

    #[test]
    fn test_parse_stored_node() {
        let row = stored("Table");
        let node = Node::parse(&row).unwrap();

        assert_eq!(Some(node.uuid), row.uuid());
        assert_eq!(node.node_type, NodeType::Table);
        assert_eq!(node.id.as_deref(), Some("public.users"));
        assert_eq!(node.models, vec![Model::Node, Model::Component]);
        assert!(node.has_model(Model::Component));
        assert!(node.created.is_some());
        assert!(node.modified.is_none());
        assert_eq!(node.property_str("name").as_deref(), Some("users"));
    }

    #[test]
    fn test_parse_rejects_missing_uuid() {
        let mut row = stored("Table");
        row.properties.remove("origins:uuid");
        assert!(Node::parse(&row).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let row = stored("Spreadsheet");
        let err = Node::parse(&row).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_to_record_round_trips_through_pack() {
        let node = Node::parse(&stored("Column")).unwrap();
        let repacked = StoredNode {
            labels: vec!["origins:Node".into(), "origins:Component".into()],
            properties: packer::pack(&node.to_record()),
        };
        assert_eq!(Node::parse(&repacked).unwrap(), node);
    }

    #[test]
    fn test_node_type_from_str() {
        assert_eq!("Table".parse::<NodeType>().unwrap(), NodeType::Table);
        assert!("table".parse::<NodeType>().is_err());
        assert!(NodeType::Database.is_resource());
        assert!(!NodeType::Column.is_resource());
        assert_eq!(NodeType::File.name_attribute(), "path");
        assert_eq!(NodeType::Column.name_attribute(), "name");
    }
}
