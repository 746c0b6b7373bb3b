//! Resources: root entities, one per registered source instance
//!
//! A resource id, when given, is unique across all resources. The check is a
//! lookup followed by an insert in the caller's transaction; it only excludes
//! concurrent duplicates when the store serializes transactions.

use super::edges;
use super::models::{Model, NewNode, Node, NodeType, NodeUpdate, INCLUDES};
use super::nodes;
use super::query::MatchOptions;
use crate::error::{OriginsError, Result};
use crate::neo4j::traits::Traversal;
use crate::neo4j::transaction::Transaction;
use uuid::Uuid;

/// Register a new resource. The type defaults to `Resource`.
pub async fn add(tx: &mut Transaction, new: NewNode) -> Result<Node> {
    let node_type = new.node_type.unwrap_or(NodeType::Resource);
    if !node_type.is_resource() {
        return Err(OriginsError::validation(format!(
            "{} is not a resource type",
            node_type
        )));
    }

    if let Some(id) = new.id.as_deref() {
        match get_by_id(tx, id).await {
            Ok(_) => {
                return Err(OriginsError::validation(format!(
                    "resource already exists with id `{}`",
                    id
                )))
            }
            Err(e) if e.is_does_not_exist() => {}
            Err(e) => return Err(e),
        }
    }

    nodes::add(tx, Model::Resource, new.of_type(node_type)).await
}

pub async fn get(tx: &mut Transaction, uuid: Uuid) -> Result<Node> {
    nodes::get(tx, Model::Resource, uuid).await
}

pub async fn get_by_id(tx: &mut Transaction, id: &str) -> Result<Node> {
    nodes::get_by_id(tx, Model::Resource, id).await
}

pub async fn set(tx: &mut Transaction, uuid: Uuid, update: NodeUpdate) -> Result<Node> {
    if let Some(node_type) = update.node_type {
        if !node_type.is_resource() {
            return Err(OriginsError::validation(format!(
                "{} is not a resource type",
                node_type
            )));
        }
    }
    nodes::set(tx, Model::Resource, uuid, update).await
}

/// Remove a resource. Its components are left in place.
pub async fn remove(tx: &mut Transaction, uuid: Uuid) -> Result<Node> {
    nodes::remove(tx, Model::Resource, uuid).await
}

pub async fn match_resources(tx: &mut Transaction, options: MatchOptions) -> Result<Vec<Node>> {
    nodes::match_nodes(tx, Model::Resource, options).await
}

/// Components included by a resource, at any depth.
pub async fn components(
    tx: &mut Transaction,
    uuid: Uuid,
    options: MatchOptions,
) -> Result<Vec<Node>> {
    match get(tx, uuid).await {
        Ok(_) => {}
        Err(e) if e.is_does_not_exist() => {
            return Err(OriginsError::validation(format!(
                "resource {} does not exist",
                uuid
            )))
        }
        Err(e) => return Err(e),
    }

    edges::neighbours(
        tx,
        &Traversal::outgoing(uuid, INCLUDES, Model::Component).with_options(options),
    )
    .await
}
