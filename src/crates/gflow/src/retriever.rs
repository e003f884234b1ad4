//! Built-in `Retriever` used when the CLI has no external search backend
//! wired in: scores every graph node's text against the query with the same
//! Jaccard similarity the planner and reasoner use for node matching.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gflow_core::{Chunk, Result, Retriever};
use gflow_graph::GraphStore;

const MAX_RESULTS: usize = 5;
const MIN_SCORE: f64 = 0.05;

fn words(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(String::from).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn node_text(node: &gflow_graph::Node) -> String {
    let name = node.properties.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let description = node.properties.get("description").and_then(|v| v.as_str()).unwrap_or("");
    format!("{name} {description}")
}

/// Scans every node in the graph and returns the highest-scoring ones as
/// retrieval chunks. Development-grade: no index, cost is linear in node
/// count, same tradeoff `WorkflowStateStore::get_artifact` makes.
pub struct GraphTextRetriever {
    graph: Arc<GraphStore>,
}

impl GraphTextRetriever {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Retriever for GraphTextRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let query_words = words(query);
        let nodes = self.graph.all_nodes().await;

        let mut scored: Vec<(f64, Chunk)> = nodes
            .into_iter()
            .map(|node| {
                let text = node_text(&node);
                let score = jaccard(&query_words, &words(&text));
                let chunk = Chunk {
                    content: text,
                    source: Some(node.id.clone()),
                    page: None,
                    score: Some(score),
                };
                (score, chunk)
            })
            .filter(|(score, _)| *score > MIN_SCORE)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(MAX_RESULTS);

        Ok(scored.into_iter().map(|(_, chunk)| chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflow_core::props;
    use gflow_graph::NodeKind;
    use serde_json::json;

    async fn graph_with_procedure() -> (Arc<GraphStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path()).await.unwrap();
        store
            .upsert_node(
                "proc:1",
                NodeKind::Procedure,
                props([("name", json!("Craft Healing Potion")), ("description", json!("brewing procedure"))]),
            )
            .await
            .unwrap();
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn test_retrieve_matches_on_shared_words() {
        let (graph, _dir) = graph_with_procedure().await;
        let retriever = GraphTextRetriever::new(graph);

        let chunks = retriever.retrieve("craft healing potion").await.unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].source.as_deref(), Some("proc:1"));
    }

    #[tokio::test]
    async fn test_retrieve_unrelated_query_returns_empty() {
        let (graph, _dir) = graph_with_procedure().await;
        let retriever = GraphTextRetriever::new(graph);

        let chunks = retriever.retrieve("completely unrelated dragons topic").await.unwrap();
        assert!(chunks.is_empty());
    }
}
