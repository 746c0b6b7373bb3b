//! Generic node operations
//!
//! Every operation is restricted to one [`Model`]. No id uniqueness is
//! enforced here; the resource and component layers own that.

use super::models::{Model, NewNode, Node, NodeUpdate};
use super::packer::{self, Properties, Record};
use super::query::{MatchOptions, Predicate};
use crate::error::{OriginsError, Result};
use crate::neo4j::traits::NodeQuery;
use crate::neo4j::transaction::Transaction;
use chrono::Utc;
use uuid::Uuid;

/// Reject property keys that would collide with framework fields.
fn check_properties(properties: Option<&Properties>) -> Result<()> {
    if let Some(key) = properties
        .into_iter()
        .flat_map(|p| p.keys())
        .find(|k| packer::is_reserved(k))
    {
        return Err(OriginsError::validation(format!(
            "property `{}` uses the reserved `{}` namespace",
            key,
            packer::PACK_PREFIX
        )));
    }
    Ok(())
}

fn normalize(properties: Option<Properties>) -> Option<Properties> {
    properties.filter(|p| !p.is_empty())
}

fn labels(model: Model, node_type: &str) -> Vec<String> {
    let mut labels = vec![Model::Node.label().to_string()];
    if model != Model::Node {
        labels.push(model.label().to_string());
    }
    labels.push(node_type.to_string());
    labels
}

/// Create a node tagged with `model`. The store assigns its uuid.
pub async fn add(tx: &mut Transaction, model: Model, new: NewNode) -> Result<Node> {
    check_properties(new.properties.as_ref())?;
    let node_type = new
        .node_type
        .ok_or_else(|| OriginsError::validation("node type is required"))?;

    let now = Utc::now().to_rfc3339();
    let record = Record::new()
        .field("id", new.id)
        .field("label", new.label)
        .field("description", new.description)
        .field("type", node_type.as_str())
        .field("created", now.as_str())
        .field("modified", now.as_str())
        .with_properties(normalize(new.properties));

    let stored = tx
        .store()
        .create_node(labels(model, node_type.as_str()), packer::pack(&record))
        .await?;
    let node = Node::parse(&stored)?;

    tracing::debug!(uuid = %node.uuid, model = %model, node_type = %node_type, "Node created");
    Ok(node)
}

async fn find_one(tx: &mut Transaction, model: Model, predicate: Predicate) -> Result<Option<Node>> {
    let query = NodeQuery::new(model, MatchOptions::new().filter(predicate).limit(1));
    let found = tx.store().find_nodes(&query).await?;
    found.first().map(Node::parse).transpose()
}

/// Exact lookup by uuid
pub async fn get(tx: &mut Transaction, model: Model, uuid: Uuid) -> Result<Node> {
    find_one(tx, model, Predicate::field("uuid", uuid.to_string()))
        .await?
        .ok_or_else(|| OriginsError::does_not_exist(format!("{} with uuid {}", model, uuid)))
}

/// Exact lookup by id, first match in store order
pub async fn get_by_id(tx: &mut Transaction, model: Model, id: &str) -> Result<Node> {
    find_one(tx, model, Predicate::field("id", id))
        .await?
        .ok_or_else(|| OriginsError::does_not_exist(format!("{} with id `{}`", model, id)))
}

/// Partial update; fields left as `None` are untouched.
///
/// When nothing actually changes the node is returned as is and nothing is
/// written, so `modified` only moves on real updates.
pub async fn set(tx: &mut Transaction, model: Model, uuid: Uuid, update: NodeUpdate) -> Result<Node> {
    check_properties(update.properties.as_ref())?;
    let current = get(tx, model, uuid).await?;

    let mut next = current.clone();
    if let Some(label) = update.label {
        next.label = Some(label);
    }
    if let Some(description) = update.description {
        next.description = Some(description);
    }
    if let Some(node_type) = update.node_type {
        next.node_type = node_type;
    }
    if let Some(properties) = update.properties {
        next.properties = normalize(Some(properties));
    }

    if next == current {
        return Ok(current);
    }
    next.modified = Some(Utc::now());

    let relabel = (next.node_type != current.node_type).then(|| {
        (
            current.node_type.as_str().to_string(),
            next.node_type.as_str().to_string(),
        )
    });

    let stored = tx
        .store()
        .update_node(uuid, packer::pack(&next.to_record()), relabel)
        .await?
        .ok_or_else(|| OriginsError::does_not_exist(format!("{} with uuid {}", model, uuid)))?;
    let node = Node::parse(&stored)?;

    tracing::debug!(uuid = %uuid, model = %model, "Node updated");
    Ok(node)
}

/// Delete a node and its edges, returning what was removed
pub async fn remove(tx: &mut Transaction, model: Model, uuid: Uuid) -> Result<Node> {
    let node = get(tx, model, uuid).await?;
    if !tx.store().delete_node(uuid).await? {
        return Err(OriginsError::does_not_exist(format!(
            "{} with uuid {}",
            model, uuid
        )));
    }
    tracing::debug!(uuid = %uuid, model = %model, "Node removed");
    Ok(node)
}

/// Nodes satisfying the options, in store order
pub async fn match_nodes(tx: &mut Transaction, model: Model, options: MatchOptions) -> Result<Vec<Node>> {
    options.validate("n")?;
    let found = tx
        .store()
        .find_nodes(&NodeQuery::new(model, options))
        .await?;
    found.iter().map(Node::parse).collect()
}
