//! Test helper factories and an in-memory fake origin
//!
//! `FakeOrigin` serves records from maps keyed by lineage id (`""` for the
//! resource itself), which tests can rewrite between syncs.
#![allow(dead_code)]

use crate::backends::{Lineage, Origin, RawRecord, Reference};
use crate::graph::models::NodeType;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// ============================================================================
// Record factories
// ============================================================================

pub fn schema(name: &str) -> RawRecord {
    RawRecord::new().label(name).property("name", name)
}

pub fn table(name: &str) -> RawRecord {
    RawRecord::new().label(name).property("name", name)
}

pub fn column(name: &str, index: i64, nullable: bool, data_type: &str) -> RawRecord {
    RawRecord::new()
        .label(name)
        .property("name", name)
        .property("index", index)
        .property("nullable", nullable)
        .property("type", data_type)
}

// ============================================================================
// Fake origin
// ============================================================================

#[derive(Default)]
struct FakeState {
    id: String,
    description: RawRecord,
    children: HashMap<String, Vec<RawRecord>>,
    references: HashMap<String, Vec<Reference>>,
    failing: HashSet<String>,
}

/// Database-shaped origin backed by in-memory maps
#[derive(Clone, Default)]
pub struct FakeOrigin {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOrigin {
    pub fn new(id: &str, name: &str) -> Self {
        let origin = Self::default();
        {
            let mut state = origin.state.lock().unwrap();
            state.id = id.to_string();
            state.description = RawRecord::new().label(name).property("name", name);
        }
        origin
    }

    pub fn set_children(&self, lineage_id: &str, records: Vec<RawRecord>) {
        self.state
            .lock()
            .unwrap()
            .children
            .insert(lineage_id.to_string(), records);
    }

    pub fn set_references(&self, lineage_id: &str, references: Vec<Reference>) {
        self.state
            .lock()
            .unwrap()
            .references
            .insert(lineage_id.to_string(), references);
    }

    /// Make listing the children of `lineage_id` fail
    pub fn fail_on(&self, lineage_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(lineage_id.to_string());
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    fn resource_type(&self) -> NodeType {
        NodeType::Database
    }

    fn resource_id(&self) -> String {
        self.state.lock().unwrap().id.clone()
    }

    async fn describe(&self) -> anyhow::Result<RawRecord> {
        Ok(self.state.lock().unwrap().description.clone())
    }

    fn child_type(&self, parent: NodeType) -> Option<NodeType> {
        match parent {
            NodeType::Database => Some(NodeType::Schema),
            NodeType::Schema => Some(NodeType::Table),
            NodeType::Table => Some(NodeType::Column),
            _ => None,
        }
    }

    async fn children(&self, lineage: &Lineage) -> anyhow::Result<Vec<RawRecord>> {
        let state = self.state.lock().unwrap();
        let id = lineage.id();
        if state.failing.contains(&id) {
            anyhow::bail!("listing {} failed", lineage);
        }
        Ok(state.children.get(&id).cloned().unwrap_or_default())
    }

    async fn references(&self, lineage: &Lineage) -> anyhow::Result<Vec<Reference>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .references
            .get(&lineage.id())
            .cloned()
            .unwrap_or_default())
    }
}

/// `shop` database: `public.users (id, email)` and
/// `public.orders (id, user_id, total)` with `orders.user_id -> users.id`.
pub fn sample_database() -> FakeOrigin {
    let origin = FakeOrigin::new("fake://shop", "shop");
    origin.set_children("", vec![schema("public")]);
    origin.set_children("public", vec![table("users"), table("orders")]);
    origin.set_children(
        "public.users",
        vec![
            column("id", 0, false, "integer"),
            column("email", 1, true, "text"),
        ],
    );
    origin.set_children(
        "public.orders",
        vec![
            column("id", 0, false, "integer"),
            column("user_id", 1, true, "integer"),
            column("total", 2, true, "numeric"),
        ],
    );
    origin.set_references(
        "public.orders.user_id",
        vec![Reference {
            name: "orders_user_id_fkey".into(),
            schema: "public".into(),
            table: "users".into(),
            column: "id".into(),
        }],
    );
    origin
}
