//! Entity graph core.
//!
//! ## Layout
//!
//! ```text
//! resources / components   identity rules, hierarchy edges
//!          │
//!        nodes, edges       generic CRUD over typed vertices
//!          │
//!   query (templates) + packer (origins: namespace)
//!          │
//!   neo4j::Transaction ──► GraphStore (Neo4j | in-memory)
//! ```
//!
//! ## Modules
//!
//! - [`models`]: Node, Edge, Model and NodeType tags, operation inputs
//! - [`packer`]: framework fields vs. domain properties on the wire
//! - [`query`]: parameterized query templates, predicates, pagination
//! - [`nodes`] / [`edges`]: generic operations restricted to a model
//! - [`resources`] / [`components`]: the two entity kinds

pub mod components;
pub mod edges;
pub mod models;
pub mod nodes;
pub mod packer;
pub mod query;
pub mod resources;

pub use models::{Edge, Model, NewNode, Node, NodeType, NodeUpdate};
pub use query::{MatchOptions, Predicate};
