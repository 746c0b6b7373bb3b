//! Property-graph store: the Neo4j client, the in-memory store and the
//! transaction scope shared by all graph operations

pub mod client;
mod impl_graph_store;
pub mod mock;
pub mod traits;
pub mod transaction;

pub use client::Neo4jClient;
pub use mock::MockGraphStore;
pub use traits::{Direction, GraphStore, GraphTxn, NodeQuery, Traversal};
pub use transaction::{with_transaction, Transaction};
