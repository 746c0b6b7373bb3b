//! In-memory mock implementation of GraphStore.
//!
//! Nodes and edges are kept in insertion order, which is the "store order"
//! seen by match operations. A transaction takes an exclusive lock on the
//! graph and works on a snapshot: `commit` publishes the snapshot, `rollback`
//! or dropping the transaction discards it. Transactions are therefore fully
//! serialized; do not open two in the same task.
//!
//! Expression predicates need a Cypher engine and are rejected here.

use crate::graph::models::{Edge, StoredNode};
use crate::graph::packer::{self, Properties, WireMap};
use crate::graph::query::{MatchOptions, Predicate};
use crate::neo4j::traits::{Direction, GraphStore, GraphTxn, NodeQuery, Traversal};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MockGraph {
    nodes: Vec<StoredNode>,
    edges: Vec<Edge>,
}

impl MockGraph {
    fn position(&self, uuid: Uuid) -> Option<usize> {
        self.nodes.iter().position(|n| n.uuid() == Some(uuid))
    }

    fn node(&self, uuid: Uuid) -> Option<&StoredNode> {
        self.position(uuid).map(|i| &self.nodes[i])
    }
}

/// In-memory mock implementation of GraphStore.
#[derive(Default)]
pub struct MockGraphStore {
    graph: Arc<Mutex<MockGraph>>,
}

impl MockGraphStore {
    /// Create a new empty MockGraphStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed nodes
    pub async fn nodes(&self) -> Vec<StoredNode> {
        self.graph.lock().await.nodes.clone()
    }

    /// Committed edges
    pub async fn edges(&self) -> Vec<Edge> {
        self.graph.lock().await.edges.clone()
    }

    pub async fn node_count(&self) -> usize {
        self.graph.lock().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.graph.lock().await.edges.len()
    }

    /// Committed edges of one relationship type
    pub async fn edges_of_type(&self, rel_type: &str) -> Vec<Edge> {
        self.graph
            .lock()
            .await
            .edges
            .iter()
            .filter(|e| e.rel_type == rel_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn begin(&self) -> Result<Box<dyn GraphTxn>> {
        let guard = self.graph.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MockTxn { guard, work }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct MockTxn {
    guard: OwnedMutexGuard<MockGraph>,
    work: MockGraph,
}

fn has_labels(node: &StoredNode, model_label: &str, options: &MatchOptions) -> bool {
    node.labels.iter().any(|l| l == model_label)
        && options
            .node_type
            .map_or(true, |t| node.labels.iter().any(|l| l == t.as_str()))
}

fn evaluate(predicate: Option<&Predicate>, wire: &WireMap) -> Result<bool> {
    match predicate {
        None => Ok(true),
        Some(p) => match p.matches(wire) {
            Some(matched) => Ok(matched),
            None => bail!("expression predicates are not supported by the in-memory store"),
        },
    }
}

fn page<T>(items: Vec<T>, options: &MatchOptions) -> Vec<T> {
    let skip = options.skip.unwrap_or(0) as usize;
    let limit = options.limit.map_or(usize::MAX, |l| l as usize);
    items.into_iter().skip(skip).take(limit).collect()
}

#[async_trait]
impl GraphTxn for MockTxn {
    async fn create_node(
        &mut self,
        labels: Vec<String>,
        mut properties: WireMap,
    ) -> Result<StoredNode> {
        properties.insert(
            packer::key("uuid"),
            Value::String(Uuid::new_v4().to_string()),
        );
        let node = StoredNode { labels, properties };
        self.work.nodes.push(node.clone());
        Ok(node)
    }

    async fn find_nodes(&mut self, query: &NodeQuery) -> Result<Vec<StoredNode>> {
        let mut found = Vec::new();
        for node in &self.work.nodes {
            if has_labels(node, query.model.label(), &query.options)
                && evaluate(query.options.predicate.as_ref(), &node.properties)?
            {
                found.push(node.clone());
            }
        }
        Ok(page(found, &query.options))
    }

    async fn update_node(
        &mut self,
        uuid: Uuid,
        mut properties: WireMap,
        relabel: Option<(String, String)>,
    ) -> Result<Option<StoredNode>> {
        let Some(index) = self.work.position(uuid) else {
            return Ok(None);
        };
        let node = &mut self.work.nodes[index];

        // The uuid is immutable whatever the caller sends.
        properties.insert(packer::key("uuid"), Value::String(uuid.to_string()));
        node.properties = properties;

        if let Some((old, new)) = relabel {
            node.labels.retain(|l| *l != old);
            if !node.labels.contains(&new) {
                node.labels.push(new);
            }
        }
        Ok(Some(node.clone()))
    }

    async fn delete_node(&mut self, uuid: Uuid) -> Result<bool> {
        let Some(index) = self.work.position(uuid) else {
            return Ok(false);
        };
        self.work.nodes.remove(index);
        self.work.edges.retain(|e| e.start != uuid && e.end != uuid);
        Ok(true)
    }

    async fn create_edge(
        &mut self,
        start: Uuid,
        end: Uuid,
        rel_type: &str,
        properties: Properties,
    ) -> Result<Option<Edge>> {
        if self.work.node(start).is_none() || self.work.node(end).is_none() {
            return Ok(None);
        }
        let edge = Edge {
            start,
            end,
            rel_type: rel_type.to_string(),
            properties: properties.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        };
        self.work.edges.push(edge.clone());
        Ok(Some(edge))
    }

    async fn traverse(&mut self, traversal: &Traversal) -> Result<Vec<(Edge, StoredNode)>> {
        let mut found = Vec::new();
        for edge in &self.work.edges {
            if edge.rel_type != traversal.rel_type {
                continue;
            }
            let other = match traversal.direction {
                Direction::Outgoing if edge.start == traversal.anchor => edge.end,
                Direction::Incoming if edge.end == traversal.anchor => edge.start,
                _ => continue,
            };
            let Some(node) = self.work.node(other) else {
                continue;
            };
            if has_labels(node, traversal.model.label(), &traversal.options)
                && evaluate(traversal.options.predicate.as_ref(), &node.properties)?
                && evaluate(traversal.edge_predicate.as_ref(), &edge.properties)?
            {
                found.push((edge.clone(), node.clone()));
            }
        }
        Ok(page(found, &traversal.options))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MockTxn { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{Model, NodeType};
    use serde_json::json;

    fn labels(t: NodeType) -> Vec<String> {
        vec![
            Model::Node.label().to_string(),
            Model::Component.label().to_string(),
            t.as_str().to_string(),
        ]
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MockGraphStore::new();
        let mut txn = store.begin().await.unwrap();
        let node = txn
            .create_node(labels(NodeType::Table), WireMap::new())
            .await
            .unwrap();
        assert!(node.uuid().is_some());
        txn.commit().await.unwrap();

        assert_eq!(store.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_changes() {
        let store = MockGraphStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.create_node(labels(NodeType::Table), WireMap::new())
            .await
            .unwrap();
        txn.rollback().await.unwrap();
        assert_eq!(store.node_count().await, 0);

        {
            let mut txn = store.begin().await.unwrap();
            txn.create_node(labels(NodeType::Table), WireMap::new())
                .await
                .unwrap();
        }
        assert_eq!(store.node_count().await, 0);
    }

    #[tokio::test]
    async fn test_find_nodes_filters_and_pages() {
        let store = MockGraphStore::new();
        let mut txn = store.begin().await.unwrap();
        for i in 0..5 {
            let mut props = WireMap::new();
            props.insert("name".into(), json!(format!("t{}", i)));
            txn.create_node(labels(NodeType::Table), props).await.unwrap();
        }
        txn.create_node(labels(NodeType::Column), WireMap::new())
            .await
            .unwrap();

        let options = MatchOptions::new().of_type(NodeType::Table).limit(2).skip(1);
        let found = txn
            .find_nodes(&NodeQuery::new(Model::Component, options))
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|n| n.properties["name"].clone()).collect();
        assert_eq!(names, vec![json!("t1"), json!("t2")]);

        let all = txn
            .find_nodes(&NodeQuery::new(Model::Resource, MatchOptions::new()))
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_delete_node_removes_incident_edges() {
        let store = MockGraphStore::new();
        let mut txn = store.begin().await.unwrap();
        let a = txn
            .create_node(labels(NodeType::Table), WireMap::new())
            .await
            .unwrap()
            .uuid()
            .unwrap();
        let b = txn
            .create_node(labels(NodeType::Column), WireMap::new())
            .await
            .unwrap()
            .uuid()
            .unwrap();
        txn.create_edge(a, b, "includes", Properties::new())
            .await
            .unwrap()
            .unwrap();

        assert!(txn.delete_node(a).await.unwrap());
        assert!(!txn.delete_node(a).await.unwrap());
        assert!(txn
            .create_edge(a, b, "includes", Properties::new())
            .await
            .unwrap()
            .is_none());
        txn.commit().await.unwrap();

        assert_eq!(store.node_count().await, 1);
        assert_eq!(store.edge_count().await, 0);
    }

    #[tokio::test]
    async fn test_expression_predicates_rejected() {
        let store = MockGraphStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.create_node(labels(NodeType::Table), WireMap::new())
            .await
            .unwrap();
        let options =
            MatchOptions::new().filter(Predicate::expression("n.size > 1", WireMap::new()));
        assert!(txn
            .find_nodes(&NodeQuery::new(Model::Component, options))
            .await
            .is_err());
    }
}
