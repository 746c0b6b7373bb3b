//! GraphStore implementation for Neo4jClient
//!
//! Delegates every trait method to the corresponding inherent method.

use super::client::{Neo4jClient, Neo4jTxn};
use super::traits::{GraphStore, GraphTxn, NodeQuery, Traversal};
use crate::graph::models::{Edge, StoredNode};
use crate::graph::packer::{Properties, WireMap};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn begin(&self) -> Result<Box<dyn GraphTxn>> {
        Ok(Box::new(self.start().await?))
    }

    fn backend(&self) -> &'static str {
        "neo4j"
    }
}

#[async_trait]
impl GraphTxn for Neo4jTxn {
    async fn create_node(
        &mut self,
        labels: Vec<String>,
        properties: WireMap,
    ) -> Result<StoredNode> {
        Neo4jTxn::create_node(self, labels, properties).await
    }

    async fn find_nodes(&mut self, query: &NodeQuery) -> Result<Vec<StoredNode>> {
        Neo4jTxn::find_nodes(self, query).await
    }

    async fn update_node(
        &mut self,
        uuid: Uuid,
        properties: WireMap,
        relabel: Option<(String, String)>,
    ) -> Result<Option<StoredNode>> {
        Neo4jTxn::update_node(self, uuid, properties, relabel).await
    }

    async fn delete_node(&mut self, uuid: Uuid) -> Result<bool> {
        Neo4jTxn::delete_node(self, uuid).await
    }

    async fn create_edge(
        &mut self,
        start: Uuid,
        end: Uuid,
        rel_type: &str,
        properties: Properties,
    ) -> Result<Option<Edge>> {
        Neo4jTxn::create_edge(self, start, end, rel_type, properties).await
    }

    async fn traverse(&mut self, traversal: &Traversal) -> Result<Vec<(Edge, StoredNode)>> {
        Neo4jTxn::traverse(self, traversal).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Neo4jTxn::commit(*self).await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Neo4jTxn::rollback(*self).await
    }
}
