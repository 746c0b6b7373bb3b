//! GraphStore trait definition
//!
//! Defines the abstract interface the entity layer needs from a
//! property-graph store: scoped transactions over labelled nodes with flat
//! property maps and typed, attributed edges. Implemented by `Neo4jClient`
//! and by the in-memory `MockGraphStore`.

use crate::graph::models::{Edge, Model, StoredNode};
use crate::graph::packer::{Properties, WireMap};
use crate::graph::query::{MatchOptions, Predicate, Substitutions, TemplateError};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Edge direction relative to the anchor node of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `(anchor)-[r]->(n)`
    Outgoing,
    /// `(anchor)<-[r]-(n)`
    Incoming,
}

/// Node lookup restricted to one model, with optional type/predicate/page.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeQuery {
    pub model: Model,
    pub options: MatchOptions,
}

impl NodeQuery {
    pub fn new(model: Model, options: MatchOptions) -> Self {
        Self { model, options }
    }
}

/// Neighbours of an anchor node across edges of one relationship type.
///
/// `options` filter and paginate the neighbour nodes; `edge_predicate`
/// filters the edges themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub anchor: Uuid,
    pub rel_type: String,
    pub direction: Direction,
    pub model: Model,
    pub options: MatchOptions,
    pub edge_predicate: Option<Predicate>,
}

impl Traversal {
    pub fn outgoing(anchor: Uuid, rel_type: &str, model: Model) -> Self {
        Self {
            anchor,
            rel_type: rel_type.to_string(),
            direction: Direction::Outgoing,
            model,
            options: MatchOptions::default(),
            edge_predicate: None,
        }
    }

    pub fn incoming(anchor: Uuid, rel_type: &str, model: Model) -> Self {
        Self {
            direction: Direction::Incoming,
            ..Self::outgoing(anchor, rel_type, model)
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_edge_predicate(mut self, predicate: Predicate) -> Self {
        self.edge_predicate = Some(predicate);
        self
    }

    /// Node filter, edge filter and page as they are bound together.
    pub fn substitutions(&self) -> Result<Substitutions, TemplateError> {
        Substitutions::new()
            .model(self.model)
            .node_type(self.options.node_type)
            .filter("n", self.options.predicate.as_ref())?
            .filter("r", self.edge_predicate.as_ref())?
            .page(self.options.limit, self.options.skip)
    }
}

/// Factory for transactions against a property-graph store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Start a new transaction
    async fn begin(&self) -> Result<Box<dyn GraphTxn>>;

    /// Short name of the backend, for logging
    fn backend(&self) -> &'static str;
}

/// One open transaction. Every statement issued through it is applied
/// atomically on `commit` and discarded on `rollback` (or drop).
#[async_trait]
pub trait GraphTxn: Send {
    /// Create a node with the given labels; the store assigns `origins:uuid`.
    async fn create_node(&mut self, labels: Vec<String>, properties: WireMap)
        -> Result<StoredNode>;

    /// Nodes matching the query, in store order
    async fn find_nodes(&mut self, query: &NodeQuery) -> Result<Vec<StoredNode>>;

    /// Replace a node's property map, optionally swapping one label for
    /// another. Returns `None` if no node has this uuid.
    async fn update_node(
        &mut self,
        uuid: Uuid,
        properties: WireMap,
        relabel: Option<(String, String)>,
    ) -> Result<Option<StoredNode>>;

    /// Delete a node together with its edges. Returns whether it existed.
    async fn delete_node(&mut self, uuid: Uuid) -> Result<bool>;

    /// Create a directed edge. Returns `None` if either endpoint is missing.
    async fn create_edge(
        &mut self,
        start: Uuid,
        end: Uuid,
        rel_type: &str,
        properties: Properties,
    ) -> Result<Option<Edge>>;

    /// Edges of one type around an anchor node, with the node at the far end
    async fn traverse(&mut self, traversal: &Traversal) -> Result<Vec<(Edge, StoredNode)>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
