//! Define: reconcile a batch of freshly observed records with the children
//! already recorded under a parent.
//!
//! Each record is matched on its identifying attribute among the parent's
//! children of the same type. A match is updated in place when its label or
//! properties differ and left alone otherwise; a miss creates a component
//! under the resource. Children missing from the batch are never removed.

use super::SyncResult;
use crate::backends::{Lineage, RawRecord};
use crate::error::Result;
use crate::graph::components;
use crate::graph::edges;
use crate::graph::models::{NewNode, Node, NodeType, NodeUpdate, INCLUDES};
use crate::graph::packer::Properties;
use crate::neo4j::transaction::Transaction;
use serde_json::Value;

/// A child produced by [`define`], with the lineage addressing it.
#[derive(Debug, Clone)]
pub struct Defined {
    pub node: Node,
    pub lineage: Lineage,
}

pub async fn define(
    tx: &mut Transaction,
    resource: &Node,
    parent: &Node,
    lineage: &Lineage,
    child_type: NodeType,
    name_attribute: &str,
    records: Vec<RawRecord>,
) -> Result<(SyncResult, Vec<Defined>)> {
    let mut result = SyncResult::default();
    let mut defined = Vec::with_capacity(records.len());

    for record in records {
        let Some(key) = record.key(name_attribute) else {
            tracing::warn!(
                parent = %parent.uuid,
                node_type = %child_type,
                "Record without `{}` skipped",
                name_attribute
            );
            continue;
        };
        let key_value = record
            .properties
            .get(name_attribute)
            .cloned()
            .unwrap_or(Value::Null);
        let child_lineage = lineage.child(child_type, key.clone());
        let label = record.label.clone().unwrap_or_else(|| key.clone());

        let existing =
            components::child_by_key(tx, parent, child_type, name_attribute, key_value).await?;

        let node = match existing {
            Some(node) => {
                let properties = Some(record.properties.clone()).filter(|p| !p.is_empty());
                if node.label.as_deref() == Some(label.as_str()) && node.properties == properties {
                    result.nodes_unchanged += 1;
                    node
                } else {
                    let update = NodeUpdate {
                        label: Some(label),
                        properties: Some(record.properties),
                        ..Default::default()
                    };
                    let updated = components::set(tx, node.uuid, update).await?;
                    result.nodes_updated += 1;
                    updated
                }
            }
            None => {
                let new = NewNode::new()
                    .id(child_lineage.id())
                    .label(label)
                    .of_type(child_type)
                    .properties(record.properties);
                let node = components::add(tx, resource.uuid, new).await?;
                result.nodes_created += 1;
                // managed_by + includes from the resource
                result.edges_created += 2;

                if parent.uuid != resource.uuid {
                    edges::add(tx, parent, &node, INCLUDES, Properties::new()).await?;
                    result.edges_created += 1;
                }
                node
            }
        };

        defined.push(Defined {
            node,
            lineage: child_lineage,
        });
    }

    tracing::debug!(
        parent = %parent.uuid,
        lineage = %lineage,
        node_type = %child_type,
        created = result.nodes_created,
        updated = result.nodes_updated,
        unchanged = result.nodes_unchanged,
        "Children defined"
    );
    Ok((result, defined))
}
