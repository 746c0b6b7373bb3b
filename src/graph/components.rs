//! Components: nested entities owned by exactly one resource
//!
//! Each component carries a `managed_by` edge to its resource, used for
//! id-scoped lookup, and is included by the resource. Structural nesting
//! (schema -> table -> column) adds an `includes` edge from the parent
//! component as well.

use super::edges;
use super::models::{Model, NewNode, Node, NodeType, NodeUpdate, INCLUDES, MANAGED_BY};
use super::nodes;
use super::packer::Properties;
use super::query::{MatchOptions, Predicate};
use crate::error::{OriginsError, Result};
use crate::neo4j::traits::Traversal;
use crate::neo4j::transaction::Transaction;
use serde_json::Value;
use uuid::Uuid;

fn check_type(node_type: NodeType) -> Result<()> {
    if node_type.is_resource() {
        return Err(OriginsError::validation(format!(
            "{} is not a component type",
            node_type
        )));
    }
    Ok(())
}

/// Add a component to an existing resource. The type defaults to `Component`.
///
/// A given id must be unique among the resource's components.
pub async fn add(tx: &mut Transaction, resource: Uuid, new: NewNode) -> Result<Node> {
    let node_type = new.node_type.unwrap_or(NodeType::Component);
    check_type(node_type)?;

    let resource = match nodes::get(tx, Model::Resource, resource).await {
        Ok(node) => node,
        Err(e) if e.is_does_not_exist() => {
            return Err(OriginsError::validation(format!(
                "resource {} does not exist",
                resource
            )))
        }
        Err(e) => return Err(e),
    };

    if let Some(id) = new.id.as_deref() {
        match get_by_id(tx, resource.uuid, id).await {
            Ok(_) => {
                return Err(OriginsError::validation(format!(
                    "component already exists with id `{}`",
                    id
                )))
            }
            Err(e) if e.is_does_not_exist() => {}
            Err(e) => return Err(e),
        }
    }

    let node = nodes::add(tx, Model::Component, new.of_type(node_type)).await?;
    edges::add(tx, &node, &resource, MANAGED_BY, Properties::new()).await?;
    edges::add(tx, &resource, &node, INCLUDES, Properties::new()).await?;
    Ok(node)
}

pub async fn get(tx: &mut Transaction, uuid: Uuid) -> Result<Node> {
    nodes::get(tx, Model::Component, uuid).await
}

/// Lookup by id within one resource
pub async fn get_by_id(tx: &mut Transaction, resource: Uuid, id: &str) -> Result<Node> {
    let traversal = Traversal::incoming(resource, MANAGED_BY, Model::Component)
        .with_options(MatchOptions::new().filter(Predicate::field("id", id)).limit(1));

    edges::neighbours(tx, &traversal)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            OriginsError::does_not_exist(format!(
                "component with id `{}` in resource {}",
                id, resource
            ))
        })
}

pub async fn set(tx: &mut Transaction, uuid: Uuid, update: NodeUpdate) -> Result<Node> {
    if let Some(node_type) = update.node_type {
        check_type(node_type)?;
    }
    nodes::set(tx, Model::Component, uuid, update).await
}

pub async fn remove(tx: &mut Transaction, uuid: Uuid) -> Result<Node> {
    nodes::remove(tx, Model::Component, uuid).await
}

pub async fn match_components(tx: &mut Transaction, options: MatchOptions) -> Result<Vec<Node>> {
    nodes::match_nodes(tx, Model::Component, options).await
}

/// The resource managing a component
pub async fn resource_of(tx: &mut Transaction, component: &Node) -> Result<Node> {
    let traversal = Traversal::outgoing(component.uuid, MANAGED_BY, Model::Resource)
        .with_options(MatchOptions::new().limit(1));

    edges::neighbours(tx, &traversal)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            OriginsError::does_not_exist(format!("resource of component {}", component.uuid))
        })
}

/// The parent component, or `None` when the component sits directly under
/// its resource.
pub async fn parent_of(tx: &mut Transaction, component: &Node) -> Result<Option<Node>> {
    let traversal = Traversal::incoming(component.uuid, INCLUDES, Model::Component)
        .with_options(MatchOptions::new().limit(1));

    Ok(edges::neighbours(tx, &traversal).await?.into_iter().next())
}

/// Direct children of a resource or component
pub async fn children(
    tx: &mut Transaction,
    parent: &Node,
    options: MatchOptions,
) -> Result<Vec<Node>> {
    let traversal =
        Traversal::outgoing(parent.uuid, INCLUDES, Model::Component).with_options(options);
    edges::neighbours(tx, &traversal).await
}

/// The child of `parent` of the given type whose identifying attribute
/// equals `key`.
pub async fn child_by_key(
    tx: &mut Transaction,
    parent: &Node,
    node_type: NodeType,
    name_attribute: &str,
    key: Value,
) -> Result<Option<Node>> {
    let options = MatchOptions::new()
        .of_type(node_type)
        .filter(Predicate::property(name_attribute, key))
        .limit(1);
    Ok(children(tx, parent, options).await?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resources;
    use crate::neo4j::mock::MockGraphStore;
    use serde_json::json;

    async fn resource(tx: &mut Transaction, id: &str) -> Node {
        resources::add(tx, NewNode::new().id(id).of_type(NodeType::Database))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_requires_resource() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let err = add(&mut tx, Uuid::new_v4(), NewNode::new().id("c"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_id_is_unique_per_resource() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let a = resource(&mut tx, "a").await;
        let b = resource(&mut tx, "b").await;

        let first = add(&mut tx, a.uuid, NewNode::new().id("x")).await.unwrap();
        assert_eq!(first.node_type, NodeType::Component);

        let err = add(&mut tx, a.uuid, NewNode::new().id("x")).await.unwrap_err();
        assert!(err.is_validation());

        // Same id under a different resource is fine
        add(&mut tx, b.uuid, NewNode::new().id("x")).await.unwrap();

        let found = get_by_id(&mut tx, a.uuid, "x").await.unwrap();
        assert_eq!(found.uuid, first.uuid);
        assert!(get_by_id(&mut tx, a.uuid, "y")
            .await
            .unwrap_err()
            .is_does_not_exist());
    }

    #[tokio::test]
    async fn test_add_keeps_properties_and_links_resource() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let db = resource(&mut tx, "db").await;

        let mut props = Properties::new();
        props.insert("name".into(), json!("public"));
        let schema = add(
            &mut tx,
            db.uuid,
            NewNode::new()
                .id("public")
                .of_type(NodeType::Schema)
                .properties(props),
        )
        .await
        .unwrap();

        assert_eq!(schema.property_str("name").as_deref(), Some("public"));
        assert_eq!(resource_of(&mut tx, &schema).await.unwrap().uuid, db.uuid);
        assert!(parent_of(&mut tx, &schema).await.unwrap().is_none());

        let found = child_by_key(&mut tx, &db, NodeType::Schema, "name", json!("public"))
            .await
            .unwrap();
        assert_eq!(found.map(|n| n.uuid), Some(schema.uuid));
        assert!(
            child_by_key(&mut tx, &db, NodeType::Table, "name", json!("public"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_parent_of_nested_component() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let db = resource(&mut tx, "db").await;
        let schema = add(&mut tx, db.uuid, NewNode::new().of_type(NodeType::Schema))
            .await
            .unwrap();
        let table = add(&mut tx, db.uuid, NewNode::new().of_type(NodeType::Table))
            .await
            .unwrap();
        edges::add(&mut tx, &schema, &table, INCLUDES, Properties::new())
            .await
            .unwrap();

        let parent = parent_of(&mut tx, &table).await.unwrap().unwrap();
        assert_eq!(parent.uuid, schema.uuid);
        assert_eq!(children(&mut tx, &schema, MatchOptions::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_rejects_resource_type() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let db = resource(&mut tx, "db").await;
        let c = add(&mut tx, db.uuid, NewNode::new()).await.unwrap();

        let err = set(
            &mut tx,
            c.uuid,
            NodeUpdate {
                node_type: Some(NodeType::Database),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
    }
}
