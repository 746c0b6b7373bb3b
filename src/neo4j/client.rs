//! Neo4j client for the entity graph
//!
//! All statements are rendered from the templates below; labels, relationship
//! types and optional clauses are the only things substituted into the text,
//! everything else is a bound parameter.

use super::traits::{Direction, NodeQuery, Traversal};
use crate::graph::models::{Edge, StoredNode};
use crate::graph::packer::{self, Properties, WireMap};
use crate::graph::query::{quote, QueryTemplate, Statement, Substitutions};
use anyhow::{Context, Result};
use neo4rs::{
    query, BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString,
    BoltType, Graph, Query, Row, Txn,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const CREATE_NODE: QueryTemplate = QueryTemplate::new(
    "CREATE (n${labels})
SET n = $props, n.`origins:uuid` = randomUUID()
RETURN n",
);

const MATCH_NODES: QueryTemplate = QueryTemplate::new(
    "MATCH (n${model}${type})
${predicate}RETURN n
ORDER BY n.`origins:created`, n.`origins:uuid`
${page}",
);

const UPDATE_NODE: QueryTemplate = QueryTemplate::new(
    "MATCH (n:`origins:Node` {`origins:uuid`: $uuid})
${relabel}SET n = $props
RETURN n",
);

const DELETE_NODE: QueryTemplate = QueryTemplate::new(
    "MATCH (n:`origins:Node` {`origins:uuid`: $uuid})
DETACH DELETE n
RETURN count(*) AS removed",
);

const CREATE_EDGE: QueryTemplate = QueryTemplate::new(
    "MATCH (a:`origins:Node` {`origins:uuid`: $start}), (b:`origins:Node` {`origins:uuid`: $end})
CREATE (a)-[r:${rel_type}]->(b)
SET r = $props
RETURN r",
);

const TRAVERSE: QueryTemplate = QueryTemplate::new(
    "MATCH (a:`origins:Node` {`origins:uuid`: $anchor})${pattern}(n${model}${type})
${predicate}RETURN r, n
ORDER BY n.`origins:created`, n.`origins:uuid`
${page}",
);

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

impl Neo4jClient {
    /// Create a new Neo4j client
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;

        let client = Self {
            graph: Arc::new(graph),
        };

        client.init_schema().await;

        Ok(client)
    }

    /// Uniqueness constraint on uuids and a lookup index on ids.
    ///
    /// `origins:id` is only unique within a scope (global for resources, per
    /// resource for components), so it gets an index and no constraint.
    async fn init_schema(&self) {
        let statements = [
            "CREATE CONSTRAINT origins_uuid IF NOT EXISTS FOR (n:`origins:Node`) REQUIRE n.`origins:uuid` IS UNIQUE",
            "CREATE INDEX origins_id IF NOT EXISTS FOR (n:`origins:Node`) ON (n.`origins:id`)",
        ];

        for statement in statements {
            if let Err(e) = self.graph.run(query(statement)).await {
                tracing::warn!("Schema statement may already exist: {}", e);
            }
        }
    }

    /// Open an explicit transaction
    pub async fn start(&self) -> Result<Neo4jTxn> {
        let txn = self
            .graph
            .start_txn()
            .await
            .context("Failed to start Neo4j transaction")?;
        Ok(Neo4jTxn { txn })
    }
}

// ============================================================================
// Value conversion
// ============================================================================

/// Convert a JSON value into a Bolt parameter
fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(map) => {
            let mut bolt = BoltMap::new();
            for (k, v) in map {
                bolt.put(BoltString::new(k), to_bolt(v));
            }
            BoltType::Map(bolt)
        }
    }
}

fn map_to_bolt(map: &WireMap) -> BoltType {
    let mut bolt = BoltMap::new();
    for (k, v) in map {
        bolt.put(BoltString::new(k), to_bolt(v));
    }
    BoltType::Map(bolt)
}

fn to_query(statement: &Statement) -> Query {
    let mut q = query(&statement.statement);
    for (k, v) in &statement.parameters {
        q = q.param(k, to_bolt(v));
    }
    q
}

fn parse_node(row: &Row, column: &str) -> Result<StoredNode> {
    let node: neo4rs::Node = row.get(column)?;
    let mut properties = WireMap::new();
    for key in node.keys() {
        properties.insert(key.to_string(), node.get::<Value>(key)?);
    }
    Ok(StoredNode {
        labels: node.labels().iter().map(|l| l.to_string()).collect(),
        properties,
    })
}

fn parse_edge(row: &Row, column: &str, start: Uuid, end: Uuid) -> Result<Edge> {
    let rel: neo4rs::Relation = row.get(column)?;
    let mut properties = Properties::new();
    for key in rel.keys() {
        properties.insert(key.to_string(), rel.get::<Value>(key)?);
    }
    Ok(Edge {
        start,
        end,
        rel_type: rel.typ().to_string(),
        properties,
    })
}

// ============================================================================
// Transaction
// ============================================================================

/// An open Neo4j transaction
pub struct Neo4jTxn {
    txn: Txn,
}

impl Neo4jTxn {
    /// Send one statement and collect its rows
    async fn send(&mut self, statement: Statement) -> Result<Vec<Row>> {
        tracing::trace!(statement = %statement.statement, "Sending statement");
        let mut stream = self
            .txn
            .execute(to_query(&statement))
            .await
            .context("Neo4j statement failed")?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Send a statement with the property map bound as `$props`.
    async fn send_with_props(&mut self, statement: Statement, props: &WireMap) -> Result<Vec<Row>> {
        let q = to_query(&statement).param("props", map_to_bolt(props));
        let mut stream = self
            .txn
            .execute(q)
            .await
            .context("Neo4j statement failed")?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await? {
            rows.push(row);
        }
        Ok(rows)
    }

    pub async fn create_node(
        &mut self,
        labels: Vec<String>,
        properties: WireMap,
    ) -> Result<StoredNode> {
        let rendered: String = labels.iter().map(|l| format!(":{}", quote(l))).collect();
        let statement = CREATE_NODE.render(Substitutions::new().token("labels", rendered))?;

        let rows = self.send_with_props(statement, &properties).await?;
        let row = rows
            .first()
            .context("CREATE returned no node")?;
        parse_node(row, "n")
    }

    pub async fn find_nodes(&mut self, node_query: &NodeQuery) -> Result<Vec<StoredNode>> {
        let statement = MATCH_NODES.render(
            Substitutions::new()
                .model(node_query.model)
                .options("n", &node_query.options)?,
        )?;

        let rows = self.send(statement).await?;
        rows.iter().map(|row| parse_node(row, "n")).collect()
    }

    pub async fn update_node(
        &mut self,
        uuid: Uuid,
        mut properties: WireMap,
        relabel: Option<(String, String)>,
    ) -> Result<Option<StoredNode>> {
        properties.insert(packer::key("uuid"), Value::String(uuid.to_string()));

        let relabel = match relabel {
            Some((old, new)) => format!("REMOVE n:{}\nSET n:{}\n", quote(&old), quote(&new)),
            None => String::new(),
        };
        let statement = UPDATE_NODE.render(
            Substitutions::new()
                .token("relabel", relabel)
                .param("uuid", uuid.to_string())?,
        )?;

        let rows = self.send_with_props(statement, &properties).await?;
        rows.first().map(|row| parse_node(row, "n")).transpose()
    }

    pub async fn delete_node(&mut self, uuid: Uuid) -> Result<bool> {
        let statement =
            DELETE_NODE.render(Substitutions::new().param("uuid", uuid.to_string())?)?;

        let rows = self.send(statement).await?;
        let removed: i64 = match rows.first() {
            Some(row) => row.get("removed")?,
            None => 0,
        };
        Ok(removed > 0)
    }

    pub async fn create_edge(
        &mut self,
        start: Uuid,
        end: Uuid,
        rel_type: &str,
        properties: Properties,
    ) -> Result<Option<Edge>> {
        let statement = CREATE_EDGE.render(
            Substitutions::new()
                .token("rel_type", quote(rel_type))
                .param("start", start.to_string())?
                .param("end", end.to_string())?,
        )?;

        let props: WireMap = properties.into_iter().filter(|(_, v)| !v.is_null()).collect();
        let rows = self.send_with_props(statement, &props).await?;
        rows.first()
            .map(|row| parse_edge(row, "r", start, end))
            .transpose()
    }

    pub async fn traverse(&mut self, traversal: &Traversal) -> Result<Vec<(Edge, StoredNode)>> {
        let rel = quote(&traversal.rel_type);
        let pattern = match traversal.direction {
            Direction::Outgoing => format!("-[r:{}]->", rel),
            Direction::Incoming => format!("<-[r:{}]-", rel),
        };
        let statement = TRAVERSE.render(
            traversal
                .substitutions()?
                .token("pattern", pattern)
                .param("anchor", traversal.anchor.to_string())?,
        )?;

        let rows = self.send(statement).await?;
        let mut found = Vec::with_capacity(rows.len());
        for row in &rows {
            let node = parse_node(row, "n")?;
            let other = node
                .uuid()
                .context("traversed node has no valid origins:uuid")?;
            let (start, end) = match traversal.direction {
                Direction::Outgoing => (traversal.anchor, other),
                Direction::Incoming => (other, traversal.anchor),
            };
            found.push((parse_edge(row, "r", start, end)?, node));
        }
        Ok(found)
    }

    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await.context("Neo4j commit failed")
    }

    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await.context("Neo4j rollback failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{Model, NodeType};
    use crate::graph::query::{MatchOptions, Predicate};
    use serde_json::json;

    #[test]
    fn test_create_node_statement() {
        let statement = CREATE_NODE
            .render(Substitutions::new().token("labels", ":`origins:Node`:`Table`"))
            .unwrap();
        assert!(statement
            .statement
            .starts_with("CREATE (n:`origins:Node`:`Table`)"));
        assert!(statement.statement.contains("randomUUID()"));
    }

    #[test]
    fn test_traverse_statement_filters_both_ends() {
        let anchor = Uuid::new_v4();
        let traversal = Traversal::outgoing(anchor, "REFERENCES", Model::Component)
            .with_options(MatchOptions::new().of_type(NodeType::Column))
            .with_edge_predicate(Predicate::property("type", "foreignkey"));
        let statement = TRAVERSE
            .render(
                traversal
                    .substitutions()
                    .unwrap()
                    .token("pattern", "-[r:`REFERENCES`]->")
                    .param("anchor", anchor.to_string())
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(
            statement.statement,
            "MATCH (a:`origins:Node` {`origins:uuid`: $anchor})-[r:`REFERENCES`]->(n:`origins:Component`:`Column`)\nWHERE r.`type` = $r_0\nRETURN r, n\nORDER BY n.`origins:created`, n.`origins:uuid`"
        );
        assert_eq!(statement.parameters.get("r_0"), Some(&json!("foreignkey")));
    }

    #[test]
    fn test_match_nodes_statement_with_page() {
        let options = MatchOptions::new().of_type(NodeType::Table).limit(2).skip(1);
        let statement = MATCH_NODES
            .render(
                Substitutions::new()
                    .model(Model::Component)
                    .options("n", &options)
                    .unwrap(),
            )
            .unwrap();
        assert!(statement.statement.ends_with(
            "ORDER BY n.`origins:created`, n.`origins:uuid`\nSKIP $skip LIMIT $limit"
        ));
    }

    #[test]
    fn test_update_requires_relabel_token() {
        assert!(UPDATE_NODE.render(Substitutions::new()).is_err());
    }

    #[test]
    fn test_to_bolt_scalars() {
        assert!(matches!(to_bolt(&json!(null)), BoltType::Null(_)));
        assert!(matches!(to_bolt(&json!(3)), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&json!(1.5)), BoltType::Float(_)));
        assert!(matches!(to_bolt(&json!("x")), BoltType::String(_)));
        assert!(matches!(to_bolt(&json!([1, 2])), BoltType::List(_)));
        assert!(matches!(to_bolt(&json!({"a": 1})), BoltType::Map(_)));
    }
}
