//! Synchronization of origins into the entity graph
//!
//! `sync` re-derives a resource's (or a component's) subtree from the live
//! source: the adapter lists the children of each container, [`define`]
//! reconciles them with the graph, and every child that can hold children
//! itself is queued for the next level.

pub mod define;
pub mod relations;

pub use define::{define, Defined};
pub use relations::{ForeignKey, ForeignKeys, Resolution};

use crate::backends::{Lineage, Origin, Segment};
use crate::error::{OriginsError, Result};
use crate::graph::components;
use crate::graph::models::{NewNode, Node, NodeUpdate};
use crate::graph::resources;
use crate::neo4j::transaction::Transaction;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::info;

/// Result of a sync operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub nodes_unchanged: usize,
    pub edges_created: usize,
}

impl SyncResult {
    pub fn merge(&mut self, other: &SyncResult) {
        self.nodes_created += other.nodes_created;
        self.nodes_updated += other.nodes_updated;
        self.nodes_unchanged += other.nodes_unchanged;
        self.edges_created += other.edges_created;
    }
}

/// Register the origin as a new resource carrying its description.
///
/// Fails with a validation error when a resource with the origin's id exists.
pub async fn register(tx: &mut Transaction, origin: &dyn Origin) -> Result<Node> {
    let description = origin.describe().await.map_err(OriginsError::Source)?;

    let mut new = NewNode::new()
        .id(origin.resource_id())
        .of_type(origin.resource_type())
        .properties(description.properties);
    if let Some(label) = description.label {
        new = new.label(label);
    }

    let resource = resources::add(tx, new).await?;
    info!(resource = %resource.uuid, id = %origin.resource_id(), "Origin registered");
    Ok(resource)
}

/// The origin's resource, registering it on first use
pub async fn resource_for(tx: &mut Transaction, origin: &dyn Origin) -> Result<Node> {
    match resources::get_by_id(tx, &origin.resource_id()).await {
        Ok(resource) => Ok(resource),
        Err(e) if e.is_does_not_exist() => register(tx, origin).await,
        Err(e) => Err(e),
    }
}

/// Refresh a resource's description, then synchronize its whole subtree.
pub async fn sync_resource(
    tx: &mut Transaction,
    origin: &dyn Origin,
    resource: &Node,
) -> Result<SyncResult> {
    let mut total = SyncResult::default();

    let description = origin.describe().await.map_err(OriginsError::Source)?;
    let update = NodeUpdate {
        label: description.label,
        properties: Some(description.properties),
        ..Default::default()
    };
    let refreshed = resources::set(tx, resource.uuid, update).await?;
    if refreshed != *resource {
        total.nodes_updated += 1;
    } else {
        total.nodes_unchanged += 1;
    }

    let subtree = walk(tx, origin, &refreshed, refreshed.clone(), Lineage::root()).await?;
    total.merge(&subtree);

    info!(
        resource = %resource.uuid,
        created = total.nodes_created,
        updated = total.nodes_updated,
        unchanged = total.nodes_unchanged,
        edges = total.edges_created,
        "Resource synchronized"
    );
    Ok(total)
}

/// Synchronize the subtree below one component.
pub async fn sync_component(
    tx: &mut Transaction,
    origin: &dyn Origin,
    component: &Node,
) -> Result<SyncResult> {
    let resource = components::resource_of(tx, component).await?;
    let lineage = lineage_of(tx, origin, component).await?;

    let result = walk(tx, origin, &resource, component.clone(), lineage).await?;
    info!(
        component = %component.uuid,
        created = result.nodes_created,
        updated = result.nodes_updated,
        "Component synchronized"
    );
    Ok(result)
}

/// Register (if needed) and synchronize an origin in one go.
pub async fn sync_origin(tx: &mut Transaction, origin: &dyn Origin) -> Result<(Node, SyncResult)> {
    let resource = resource_for(tx, origin).await?;
    let result = sync_resource(tx, origin, &resource).await?;
    Ok((resource, result))
}

/// Rebuild a component's lineage by following `includes` edges up to its
/// resource.
pub async fn lineage_of(
    tx: &mut Transaction,
    origin: &dyn Origin,
    component: &Node,
) -> Result<Lineage> {
    let mut segments = Vec::new();
    let mut current = Some(component.clone());

    while let Some(node) = current {
        let attribute = origin.name_attribute(node.node_type);
        let key = node.property_str(attribute).ok_or_else(|| {
            OriginsError::validation(format!(
                "component {} has no `{}` attribute",
                node.uuid, attribute
            ))
        })?;
        let parent = components::parent_of(tx, &node).await?;
        segments.push(Segment {
            node_type: node.node_type,
            key,
        });
        current = parent;
    }

    segments.reverse();
    Ok(Lineage::from_segments(segments))
}

/// Breadth-first walk from one container down to the leaves.
async fn walk(
    tx: &mut Transaction,
    origin: &dyn Origin,
    resource: &Node,
    start: Node,
    lineage: Lineage,
) -> Result<SyncResult> {
    let mut total = SyncResult::default();
    let mut queue = VecDeque::from([Defined {
        node: start,
        lineage,
    }]);

    while let Some(Defined { node, lineage }) = queue.pop_front() {
        let Some(child_type) = origin.child_type(node.node_type) else {
            continue;
        };

        let records = origin
            .children(&lineage)
            .await
            .map_err(OriginsError::Source)?;
        let attribute = origin.name_attribute(child_type);

        let (result, defined) =
            define(tx, resource, &node, &lineage, child_type, attribute, records).await?;
        total.merge(&result);
        queue.extend(defined);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::NodeType;
    use crate::graph::query::MatchOptions;
    use crate::neo4j::mock::MockGraphStore;
    use crate::neo4j::transaction::with_transaction;
    use crate::test_helpers::{column, sample_database, schema, table, FakeOrigin};

    #[test]
    fn test_sync_result_merge() {
        let mut total = SyncResult {
            nodes_created: 1,
            nodes_updated: 2,
            nodes_unchanged: 0,
            edges_created: 3,
        };
        total.merge(&SyncResult {
            nodes_created: 1,
            nodes_updated: 0,
            nodes_unchanged: 5,
            edges_created: 1,
        });
        assert_eq!(total.nodes_created, 2);
        assert_eq!(total.nodes_updated, 2);
        assert_eq!(total.nodes_unchanged, 5);
        assert_eq!(total.edges_created, 4);
    }

    #[tokio::test]
    async fn test_register_twice_fails() {
        let store = MockGraphStore::new();
        let origin = sample_database();
        let mut tx = Transaction::begin(&store).await.unwrap();

        let resource = register(&mut tx, &origin).await.unwrap();
        assert_eq!(resource.node_type, NodeType::Database);
        assert_eq!(resource.property_str("name").as_deref(), Some("shop"));

        assert!(register(&mut tx, &origin).await.unwrap_err().is_validation());
        assert_eq!(resource_for(&mut tx, &origin).await.unwrap().uuid, resource.uuid);
    }

    #[tokio::test]
    async fn test_sync_builds_full_hierarchy() {
        let store = MockGraphStore::new();
        let origin = sample_database();
        let mut tx = Transaction::begin(&store).await.unwrap();

        let (resource, result) = sync_origin(&mut tx, &origin).await.unwrap();
        // 1 schema, 2 tables, 5 columns
        assert_eq!(result.nodes_created, 8);

        let columns = resources::components(
            &mut tx,
            resource.uuid,
            MatchOptions::new().of_type(NodeType::Column),
        )
        .await
        .unwrap();
        assert_eq!(columns.len(), 5);

        let user_id = components::get_by_id(&mut tx, resource.uuid, "public.orders.user_id")
            .await
            .unwrap();
        let lineage = lineage_of(&mut tx, &origin, &user_id).await.unwrap();
        assert_eq!(lineage.id(), "public.orders.user_id");
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_sync_is_idempotent() {
        let store = MockGraphStore::new();
        let origin = sample_database();

        let mut tx = Transaction::begin(&store).await.unwrap();
        sync_origin(&mut tx, &origin).await.unwrap();
        tx.commit().await.unwrap();
        let nodes_before = store.nodes().await;
        let edges_before = store.edge_count().await;

        let mut tx = Transaction::begin(&store).await.unwrap();
        let (_, result) = sync_origin(&mut tx, &origin).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(result.nodes_created, 0);
        assert_eq!(result.nodes_updated, 0);
        assert_eq!(result.edges_created, 0);
        assert_eq!(store.nodes().await, nodes_before);
        assert_eq!(store.edge_count().await, edges_before);
    }

    #[tokio::test]
    async fn test_changed_record_updates_existing_node() {
        let store = MockGraphStore::new();
        let origin = sample_database();

        let mut tx = Transaction::begin(&store).await.unwrap();
        let (resource, _) = sync_origin(&mut tx, &origin).await.unwrap();
        let before = components::get_by_id(&mut tx, resource.uuid, "public.users.email")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        origin.set_children(
            "public.users",
            vec![
                column("id", 0, false, "integer"),
                column("email", 1, false, "text"),
            ],
        );

        let mut tx = Transaction::begin(&store).await.unwrap();
        let (_, result) = sync_origin(&mut tx, &origin).await.unwrap();
        let after = components::get_by_id(&mut tx, resource.uuid, "public.users.email")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(result.nodes_created, 0);
        assert_eq!(result.nodes_updated, 1);
        assert_eq!(after.uuid, before.uuid);
        assert_eq!(after.property("nullable"), Some(&serde_json::json!(false)));
    }

    #[tokio::test]
    async fn test_sync_component_only_touches_subtree() {
        let store = MockGraphStore::new();
        let origin = sample_database();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let (resource, _) = sync_origin(&mut tx, &origin).await.unwrap();

        origin.set_children(
            "public.orders",
            vec![
                column("id", 0, false, "integer"),
                column("user_id", 1, true, "integer"),
                column("total", 2, true, "numeric"),
                column("placed_at", 3, true, "timestamp"),
            ],
        );

        let orders = components::get_by_id(&mut tx, resource.uuid, "public.orders")
            .await
            .unwrap();
        let result = sync_component(&mut tx, &origin, &orders).await.unwrap();
        assert_eq!(result.nodes_created, 1);
        assert_eq!(result.nodes_unchanged, 3);

        let placed_at = components::get_by_id(&mut tx, resource.uuid, "public.orders.placed_at")
            .await
            .unwrap();
        let parent = components::parent_of(&mut tx, &placed_at).await.unwrap().unwrap();
        assert_eq!(parent.uuid, orders.uuid);
    }

    #[tokio::test]
    async fn test_source_failure_rolls_back() {
        let store = MockGraphStore::new();
        let origin = sample_database();
        origin.fail_on("public.orders");

        let err = with_transaction(&store, |tx| {
            let origin = origin.clone();
            Box::pin(async move { sync_origin(tx, &origin).await })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, OriginsError::Source(_)));
        assert_eq!(store.node_count().await, 0);
        assert_eq!(store.edge_count().await, 0);
    }

    #[tokio::test]
    async fn test_dotted_names_keep_distinct_ids() {
        let store = MockGraphStore::new();
        let origin = FakeOrigin::new("fake://dotted", "dotted");
        origin.set_children("", vec![schema("a"), schema("a.b")]);
        origin.set_children("a", vec![table("b.c")]);
        origin.set_children(r"a\.b", vec![table("c")]);
        origin.set_children(r"a.b\.c", vec![column("x", 0, false, "integer")]);
        origin.set_children(r"a\.b.c", vec![column("y", 0, false, "integer")]);

        let mut tx = Transaction::begin(&store).await.unwrap();
        let (resource, result) = sync_origin(&mut tx, &origin).await.unwrap();
        // 2 schemas, 2 tables, 2 columns
        assert_eq!(result.nodes_created, 6);

        let nested = components::get_by_id(&mut tx, resource.uuid, r"a.b\.c")
            .await
            .unwrap();
        let dotted = components::get_by_id(&mut tx, resource.uuid, r"a\.b.c")
            .await
            .unwrap();
        assert_ne!(nested.uuid, dotted.uuid);
        assert_eq!(nested.property_str("name").as_deref(), Some("b.c"));
        assert_eq!(dotted.property_str("name").as_deref(), Some("c"));

        let y = components::get_by_id(&mut tx, resource.uuid, r"a\.b.c.y")
            .await
            .unwrap();
        let lineage = lineage_of(&mut tx, &origin, &y).await.unwrap();
        assert_eq!(lineage.key(0), Some("a.b"));
        assert_eq!(lineage.id(), r"a\.b.c.y");
        tx.commit().await.unwrap();
    }
}
