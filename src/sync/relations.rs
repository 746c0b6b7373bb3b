//! Relationship resolution
//!
//! A column's foreign keys are derived from the origin's reference
//! descriptors: each descriptor is followed from the resource through the
//! already-synchronized Schema -> Table -> Column path and recorded as a
//! `REFERENCES` edge tagged `type: "foreignkey"`. The result is cached on the
//! [`ForeignKeys`] handle, so one instance resolves at most once.

use super::lineage_of;
use crate::backends::{Origin, Reference};
use crate::error::{OriginsError, Result};
use crate::graph::components;
use crate::graph::edges;
use crate::graph::models::{value_key, Edge, Model, Node, NodeType, REFERENCES};
use crate::graph::packer::Properties;
use crate::graph::query::{MatchOptions, Predicate};
use crate::neo4j::traits::Traversal;
use crate::neo4j::transaction::Transaction;
use serde_json::Value;

/// Edge `type` attribute marking a foreign key
pub const FOREIGN_KEY: &str = "foreignkey";

/// A resolved foreign key
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: String,
    pub edge: Edge,
    pub target: Node,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Resolution {
    #[default]
    Unresolved,
    Resolved(Vec<ForeignKey>),
}

/// Lazily resolved foreign keys of one column
#[derive(Debug, Clone)]
pub struct ForeignKeys {
    column: Node,
    resolution: Resolution,
}

impl ForeignKeys {
    pub fn new(column: Node) -> Self {
        Self {
            column,
            resolution: Resolution::Unresolved,
        }
    }

    pub fn column(&self) -> &Node {
        &self.column
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved(_))
    }

    /// Resolve on first call; later calls return the cached set.
    ///
    /// Fails with `DoesNotExist` when a referenced column has not been
    /// synchronized yet, leaving the handle unresolved.
    pub async fn resolve(
        &mut self,
        tx: &mut Transaction,
        origin: &dyn Origin,
    ) -> Result<&[ForeignKey]> {
        if !self.is_resolved() {
            let keys = resolve_foreign_keys(tx, origin, &self.column).await?;
            self.resolution = Resolution::Resolved(keys);
        }

        match &self.resolution {
            Resolution::Resolved(keys) => Ok(keys),
            Resolution::Unresolved => Ok(&[]),
        }
    }
}

/// Follow a descriptor from the resource down to the referenced column.
async fn navigate(
    tx: &mut Transaction,
    origin: &dyn Origin,
    resource: &Node,
    reference: &Reference,
) -> Result<Node> {
    let path = [
        (NodeType::Schema, &reference.schema),
        (NodeType::Table, &reference.table),
        (NodeType::Column, &reference.column),
    ];

    let mut current = resource.clone();
    for (node_type, key) in path {
        let attribute = origin.name_attribute(node_type);
        current = components::child_by_key(tx, &current, node_type, attribute, Value::from(key.as_str()))
            .await?
            .ok_or_else(|| {
                OriginsError::does_not_exist(format!(
                    "{} `{}` referenced by `{}`",
                    node_type, key, reference.name
                ))
            })?;
    }
    Ok(current)
}

async fn resolve_foreign_keys(
    tx: &mut Transaction,
    origin: &dyn Origin,
    column: &Node,
) -> Result<Vec<ForeignKey>> {
    let resource = components::resource_of(tx, column).await?;
    let lineage = lineage_of(tx, origin, column).await?;
    let references = origin
        .references(&lineage)
        .await
        .map_err(OriginsError::Source)?;

    for reference in &references {
        let target = navigate(tx, origin, &resource, reference).await?;

        let existing = edges::neighbours(
            tx,
            &Traversal::outgoing(column.uuid, REFERENCES, Model::Component).with_edge_predicate(
                Predicate::property("name", reference.name.as_str()).and_property("type", FOREIGN_KEY),
            ),
        )
        .await?;
        if existing.iter().any(|n| n.uuid == target.uuid) {
            continue;
        }

        let mut properties = Properties::new();
        properties.insert("name".into(), Value::from(reference.name.as_str()));
        properties.insert("type".into(), Value::from(FOREIGN_KEY));
        edges::add(tx, column, &target, REFERENCES, properties).await?;
        tracing::debug!(
            column = %column.uuid,
            target = %target.uuid,
            name = %reference.name,
            "Foreign key recorded"
        );
    }

    let found = edges::traverse(
        tx,
        &Traversal::outgoing(column.uuid, REFERENCES, Model::Component)
            .with_edge_predicate(Predicate::property("type", FOREIGN_KEY)),
    )
    .await?;

    Ok(found
        .into_iter()
        .map(|(edge, target)| ForeignKey {
            name: edge
                .properties
                .get("name")
                .and_then(value_key)
                .unwrap_or_default(),
            edge,
            target,
        })
        .collect())
}

/// Resolve the foreign keys of every column of a resource. Returns the number
/// of foreign keys found.
pub async fn resolve_references(
    tx: &mut Transaction,
    origin: &dyn Origin,
    resource: &Node,
) -> Result<usize> {
    let columns = crate::graph::resources::components(
        tx,
        resource.uuid,
        MatchOptions::new().of_type(NodeType::Column),
    )
    .await?;

    let mut total = 0;
    for column in columns {
        let mut keys = ForeignKeys::new(column);
        total += keys.resolve(tx, origin).await?.len();
    }

    tracing::info!(resource = %resource.uuid, foreign_keys = total, "References resolved");
    Ok(total)
}
