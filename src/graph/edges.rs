//! Typed edges between nodes

use super::models::{Edge, Node};
use super::packer::Properties;
use crate::error::{OriginsError, Result};
use crate::neo4j::traits::Traversal;
use crate::neo4j::transaction::Transaction;

/// Create a directed, typed edge. Edges are not deduplicated.
pub async fn add(
    tx: &mut Transaction,
    start: &Node,
    end: &Node,
    rel_type: &str,
    properties: Properties,
) -> Result<Edge> {
    let edge = tx
        .store()
        .create_edge(start.uuid, end.uuid, rel_type, properties)
        .await?
        .ok_or_else(|| {
            OriginsError::does_not_exist(format!(
                "edge endpoint for {} -[{}]-> {}",
                start.uuid, rel_type, end.uuid
            ))
        })?;

    tracing::debug!(start = %start.uuid, end = %end.uuid, rel_type, "Edge created");
    Ok(edge)
}

/// Edges around an anchor node together with the parsed node at the far end
pub async fn traverse(tx: &mut Transaction, traversal: &Traversal) -> Result<Vec<(Edge, Node)>> {
    traversal.substitutions()?;
    let found = tx.store().traverse(traversal).await?;
    found
        .into_iter()
        .map(|(edge, stored)| Node::parse(&stored).map(|node| (edge, node)))
        .collect()
}

/// Far-end nodes only
pub async fn neighbours(tx: &mut Transaction, traversal: &Traversal) -> Result<Vec<Node>> {
    Ok(traverse(tx, traversal)
        .await?
        .into_iter()
        .map(|(_, node)| node)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{Model, NewNode, NodeType, REFERENCES};
    use crate::graph::nodes;
    use crate::graph::query::{MatchOptions, Predicate};
    use crate::neo4j::mock::MockGraphStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_and_traverse_both_directions() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let a = nodes::add(&mut tx, Model::Component, NewNode::new().of_type(NodeType::Column))
            .await
            .unwrap();
        let b = nodes::add(&mut tx, Model::Component, NewNode::new().of_type(NodeType::Column))
            .await
            .unwrap();

        let mut props = Properties::new();
        props.insert("type".into(), json!("foreignkey"));
        let edge = add(&mut tx, &a, &b, REFERENCES, props).await.unwrap();
        assert_eq!((edge.start, edge.end), (a.uuid, b.uuid));

        let out = neighbours(
            &mut tx,
            &Traversal::outgoing(a.uuid, REFERENCES, Model::Component)
                .with_edge_predicate(Predicate::property("type", "foreignkey")),
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].uuid, b.uuid);

        let back = traverse(
            &mut tx,
            &Traversal::incoming(b.uuid, REFERENCES, Model::Component),
        )
        .await
        .unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].1.uuid, a.uuid);
    }

    #[tokio::test]
    async fn test_add_to_missing_endpoint() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let a = nodes::add(&mut tx, Model::Component, NewNode::new().of_type(NodeType::File))
            .await
            .unwrap();
        let b = nodes::add(&mut tx, Model::Component, NewNode::new().of_type(NodeType::File))
            .await
            .unwrap();
        nodes::remove(&mut tx, Model::Component, b.uuid).await.unwrap();

        let err = add(&mut tx, &a, &b, "includes", Properties::new())
            .await
            .unwrap_err();
        assert!(err.is_does_not_exist());
    }

    #[tokio::test]
    async fn test_traverse_rejects_conflicting_parameters() {
        let store = MockGraphStore::new();
        let mut tx = Transaction::begin(&store).await.unwrap();
        let a = nodes::add(&mut tx, Model::Component, NewNode::new().of_type(NodeType::Table))
            .await
            .unwrap();

        let mut parameters = crate::graph::packer::WireMap::new();
        parameters.insert("limit".into(), json!(1));
        let traversal = Traversal::outgoing(a.uuid, REFERENCES, Model::Component)
            .with_options(MatchOptions::new().limit(5))
            .with_edge_predicate(Predicate::expression("r.weight < $limit", parameters));

        let err = traverse(&mut tx, &traversal).await.unwrap_err();
        assert!(matches!(err, OriginsError::Template(_)));
    }
}
