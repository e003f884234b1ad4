//! Multi-hop graph-guided question answering
//!
//! Starting from a seed node matched against the goal, the reasoner walks
//! the graph one hop at a time, retrieving supporting passages at each
//! focus node and periodically re-grounding its working context against the
//! original goal. When no seed can be matched it falls back to a single
//! direct retrieval against the goal text.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Instant;

use gflow_core::{Chunk, Retriever};
use gflow_graph::{GraphStore, Node, NodeKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Upper bound on hops taken per question.
pub const MAX_HOPS: usize = 5;
/// Below this final confidence a caller should treat the answer as unreliable.
pub const MIN_CONFIDENCE: f64 = 0.3;
/// Re-ground (prune) the accumulated context every this many hops.
pub const REGROUNDING_INTERVAL: usize = 2;

const FOCUS_SELECT_THRESHOLD: f64 = 0.1;
const SEED_MATCH_THRESHOLD: f64 = 0.1;
const REGROUNDING_KEEP: usize = 5;
/// Confidence assigned to answers produced by the no-seed fallback path.
/// Deliberately below `MIN_CONFIDENCE` to flag the degraded path to callers.
const FALLBACK_CONFIDENCE: f64 = 0.2;

/// One step of the graph walk: the node visited, the query issued against
/// the retriever, and the running confidence at that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningHop {
    pub hop_number: u32,
    pub focus_node_id: String,
    pub focus_node_type: String,
    pub query: String,
    pub retrieved_count: usize,
    pub confidence: f64,
    pub reasoning: String,
}

/// A deduplicated citation surfaced from the accumulated context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub source: String,
    pub page: Option<String>,
}

/// The full result of a graph-guided reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningAnswer {
    pub goal: String,
    pub answer: String,
    pub hops: Vec<ReasoningHop>,
    pub sources: Vec<SourceRef>,
    pub final_confidence: f64,
    pub duration_s: f64,
}

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

fn node_name(node: &Node) -> String {
    node.properties
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| node.id.clone())
}

fn node_description(node: &Node) -> String {
    node.properties
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}

fn node_words(node: &Node) -> HashSet<String> {
    words(&format!("{} {}", node_name(node), node_description(node)))
}

fn type_weight(kind: NodeKind) -> f64 {
    match kind {
        NodeKind::Procedure => 0.9,
        NodeKind::Step | NodeKind::Decision => 0.8,
        NodeKind::Rule => 0.7,
        NodeKind::Concept => 0.6,
        NodeKind::Entity => 0.5,
        NodeKind::SourceDoc => 0.4,
        NodeKind::Artifact => 0.3,
    }
}

async fn seed_from_goal(graph: &GraphStore, goal_words: &HashSet<String>) -> Option<Node> {
    let nodes = graph.all_nodes().await;
    let mut best: Option<(f64, Node)> = None;

    for node in nodes {
        let score = jaccard(goal_words, &node_words(&node));
        let is_better = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if is_better {
            best = Some((score, node));
        }
    }

    best.filter(|(score, _)| *score > SEED_MATCH_THRESHOLD).map(|(_, node)| node)
}

fn select_next_focus(neighbors: &[Node], goal_words: &HashSet<String>) -> (Option<Node>, f64) {
    let mut best: Option<(f64, Node)> = None;

    for neighbor in neighbors {
        let score = 0.7 * jaccard(goal_words, &node_words(neighbor)) + 0.3 * type_weight(neighbor.kind);
        let is_better = match &best {
            Some((best_score, _)) => score > *best_score,
            None => true,
        };
        if is_better {
            best = Some((score, neighbor.clone()));
        }
    }

    match best {
        Some((score, node)) if score > FOCUS_SELECT_THRESHOLD => (Some(node), score),
        Some((score, _)) => (None, score),
        None => (None, 0.0),
    }
}

fn generate_focus_query(goal: &str, focus_name: &str, kind: NodeKind) -> String {
    let suffix = match kind {
        NodeKind::Rule | NodeKind::Procedure => "rules steps requirements",
        NodeKind::Concept => "definition examples mechanics",
        _ => "details information",
    };
    format!("{goal} {focus_name} {suffix}")
}

fn calculate_hop_confidence(neighbor_count: usize, focus_selected: bool, retrieved_count: usize, scores: &[f64]) -> f64 {
    let mut confidence = 0.5;
    confidence += (neighbor_count as f64 / 10.0).min(0.3);
    if focus_selected {
        confidence += 0.2;
    }
    confidence += (retrieved_count as f64 / 5.0).min(0.2);

    if !scores.is_empty() {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        confidence = (confidence + mean) / 2.0;
    }

    confidence.min(1.0)
}

fn generate_hop_reasoning(focus_name: &str, kind: NodeKind, retrieved_count: usize) -> String {
    format!("Explored {focus_name} ({}) and retrieved {retrieved_count} supporting passages.", kind.as_str())
}

/// Prune `context` back to the `REGROUNDING_KEEP` passages most relevant to
/// the original goal, preventing unbounded growth across hops.
fn regrounding_step(context: &mut Vec<Chunk>, goal_words: &HashSet<String>) {
    if context.len() <= REGROUNDING_KEEP {
        return;
    }

    let mut scored: Vec<(f64, Chunk)> = context
        .drain(..)
        .map(|chunk| {
            let score = jaccard(goal_words, &words(&chunk.content));
            (score, chunk)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    *context = scored.into_iter().take(REGROUNDING_KEEP).map(|(_, chunk)| chunk).collect();
}

fn synthesize_answer(goal: &str, context: &[Chunk]) -> String {
    if context.is_empty() {
        return format!("Unable to find sufficient information to answer: {goal}");
    }

    let mut answer = format!("Based on graph-guided reasoning, here is the answer to: {goal}\n\n");
    for (i, chunk) in context.iter().take(3).enumerate() {
        let snippet: String = chunk.content.chars().take(200).collect();
        answer.push_str(&format!("{}. {snippet}\n", i + 1));
    }
    answer.push_str("\nThis answer was synthesized from graph-guided multi-hop retrieval.");
    answer
}

fn extract_sources(context: &[Chunk]) -> Vec<SourceRef> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for chunk in context {
        let Some(source) = &chunk.source else { continue };
        let key = format!("{source}:{}", chunk.page.as_deref().unwrap_or(""));
        if seen.insert(key) {
            sources.push(SourceRef { source: source.clone(), page: chunk.page.clone() });
        }
    }

    sources
}

fn calculate_final_confidence(hops: &[ReasoningHop]) -> f64 {
    if hops.is_empty() {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (i, hop) in hops.iter().enumerate() {
        let weight = 0.9_f64.powi(i as i32);
        weighted_sum += hop.confidence * weight;
        weight_total += weight;
    }

    weighted_sum / weight_total
}

async fn fallback_reasoning(retriever: &dyn Retriever, goal: &str, start: Instant) -> ReasoningAnswer {
    warn!(goal, "no seed node matched goal, falling back to direct retrieval");

    let retrieved = match retriever.retrieve(goal).await {
        Ok(chunks) => chunks,
        Err(err) => {
            warn!(error = %err, "fallback retrieval failed");
            Vec::new()
        }
    };

    let answer = synthesize_answer(goal, &retrieved);
    let sources = extract_sources(&retrieved);

    ReasoningAnswer {
        goal: goal.to_string(),
        answer,
        hops: Vec::new(),
        sources,
        final_confidence: FALLBACK_CONFIDENCE,
        duration_s: start.elapsed().as_secs_f64().max(1e-6),
    }
}

/// Answer `goal` by walking `graph` from a best-matching seed node,
/// retrieving supporting passages at each hop via `retriever`.
pub async fn graph_guided_answer(graph: &GraphStore, retriever: &dyn Retriever, goal: &str) -> ReasoningAnswer {
    let start = Instant::now();
    let goal_words = words(goal);

    let Some(mut focus) = seed_from_goal(graph, &goal_words).await else {
        return fallback_reasoning(retriever, goal, start).await;
    };

    debug!(goal, seed_node = %focus.id, "seeded graph-guided reasoning");

    let mut context: Vec<Chunk> = Vec::new();
    let mut hops: Vec<ReasoningHop> = Vec::new();

    for hop_number in 1..=MAX_HOPS {
        let neighbors = graph.neighbors(&focus.id, None, 1).await;
        let (next_focus, focus_score) = select_next_focus(&neighbors, &goal_words);
        let focus_selected = next_focus.is_some();

        let focus_name = node_name(&focus);
        let query = generate_focus_query(goal, &focus_name, focus.kind);

        let retrieved = match retriever.retrieve(&query).await {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(error = %err, hop_number, "retrieval failed for hop");
                Vec::new()
            }
        };
        let retrieved_count = retrieved.len();
        let scores: Vec<f64> = retrieved.iter().filter_map(|c| c.score).collect();

        let confidence = calculate_hop_confidence(neighbors.len(), focus_selected, retrieved_count, &scores);
        let reasoning = generate_hop_reasoning(&focus_name, focus.kind, retrieved_count);

        hops.push(ReasoningHop {
            hop_number: hop_number as u32,
            focus_node_id: focus.id.clone(),
            focus_node_type: focus.kind.as_str().to_string(),
            query,
            retrieved_count,
            confidence,
            reasoning,
        });

        context.extend(retrieved);

        if hop_number % REGROUNDING_INTERVAL == 0 {
            regrounding_step(&mut context, &goal_words);
        }

        if confidence < MIN_CONFIDENCE {
            break;
        }

        match next_focus {
            Some(node) if focus_score > FOCUS_SELECT_THRESHOLD => focus = node,
            _ => break,
        }
    }

    let answer = synthesize_answer(goal, &context);
    let sources = extract_sources(&context);
    let final_confidence = calculate_final_confidence(&hops);
    let duration_s = start.elapsed().as_secs_f64().max(1e-6);

    ReasoningAnswer { goal: goal.to_string(), answer, hops, sources, final_confidence, duration_s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gflow_core::{props, Result};
    use gflow_graph::EdgeKind;
    use serde_json::json;

    struct MockRetriever;

    #[async_trait]
    impl Retriever for MockRetriever {
        async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
            Ok(vec![Chunk {
                content: format!("Supporting passage for: {query}"),
                source: Some("sample_source".to_string()),
                page: Some("12".to_string()),
                score: Some(0.8),
            }])
        }
    }

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Chunk>> {
            Ok(vec![])
        }
    }

    async fn graph_with_procedure() -> (GraphStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let graph = GraphStore::open(dir.path()).await.unwrap();
        graph
            .upsert_node("proc:1", NodeKind::Procedure, props([("name", json!("Craft Healing Potion"))]))
            .await
            .unwrap();
        graph
            .upsert_node("step:1", NodeKind::Step, props([("name", json!("Gather Herbs"))]))
            .await
            .unwrap();
        graph
            .upsert_edge("proc:1", EdgeKind::PartOf, "step:1", Default::default())
            .await
            .unwrap();
        (graph, dir)
    }

    #[tokio::test]
    async fn test_seeded_walk_produces_hops_and_sources() {
        let (graph, _dir) = graph_with_procedure().await;
        let answer = graph_guided_answer(&graph, &MockRetriever, "craft healing potion").await;

        assert!(!answer.hops.is_empty());
        assert!(answer.hops.len() <= MAX_HOPS);
        assert!(!answer.sources.is_empty());
        assert!(answer.final_confidence > 0.0);
        assert!(answer.duration_s > 0.0);
    }

    #[tokio::test]
    async fn test_no_seed_match_falls_back_to_direct_retrieval() {
        let dir = tempfile::tempdir().unwrap();
        let graph = GraphStore::open(dir.path()).await.unwrap();

        let answer = graph_guided_answer(&graph, &MockRetriever, "anything at all").await;

        assert!(answer.hops.is_empty());
        assert_eq!(answer.final_confidence, FALLBACK_CONFIDENCE);
        assert!(!answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_hop_stops_when_no_neighbor_scores_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let graph = GraphStore::open(dir.path()).await.unwrap();
        graph
            .upsert_node("proc:1", NodeKind::Procedure, props([("name", json!("Craft Healing Potion"))]))
            .await
            .unwrap();

        let answer = graph_guided_answer(&graph, &MockRetriever, "craft healing potion").await;
        assert_eq!(answer.hops.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_produces_an_answer() {
        let (graph, _dir) = graph_with_procedure().await;
        let answer = graph_guided_answer(&graph, &EmptyRetriever, "craft healing potion").await;
        assert!(answer.answer.contains("Unable to find sufficient information"));
    }

    #[test]
    fn test_jaccard_matches_exact_overlap() {
        let a: HashSet<String> = ["brew", "potion"].into_iter().map(String::from).collect();
        let b: HashSet<String> = ["brew", "potion"].into_iter().map(String::from).collect();
        assert_eq!(jaccard(&a, &b), 1.0);
    }

    #[test]
    fn test_final_confidence_weights_earlier_hops_more() {
        let hops = vec![
            ReasoningHop {
                hop_number: 1,
                focus_node_id: "a".into(),
                focus_node_type: "Step".into(),
                query: String::new(),
                retrieved_count: 0,
                confidence: 0.9,
                reasoning: String::new(),
            },
            ReasoningHop {
                hop_number: 2,
                focus_node_id: "b".into(),
                focus_node_type: "Step".into(),
                query: String::new(),
                retrieved_count: 0,
                confidence: 0.1,
                reasoning: String::new(),
            },
        ];
        let confidence = calculate_final_confidence(&hops);
        assert!(confidence > 0.5);
    }

    #[test]
    fn test_regrounding_keeps_top_five_by_relevance() {
        let goal_words: HashSet<String> = ["potion"].into_iter().map(String::from).collect();
        let mut context: Vec<Chunk> = (0..8)
            .map(|i| Chunk {
                content: if i == 0 { "potion potion potion".to_string() } else { "irrelevant text".to_string() },
                source: None,
                page: None,
                score: None,
            })
            .collect();

        regrounding_step(&mut context, &goal_words);
        assert_eq!(context.len(), REGROUNDING_KEEP);
        assert!(context[0].content.contains("potion"));
    }
}
