//! Procedure and knowledge graph extraction from text chunks
//!
//! `build_procedure_from_chunks` turns a sequence of raw chunks into a
//! `Procedure` node, its ordered `Step`s, the `SourceDoc`s they cite, and the
//! `part_of`/`prereq`/`cites` edges between them. `build_knowledge_graph_from_chunks`
//! is a separate path over *enriched* chunks (carrying explicit `entities`
//! and `categories` metadata) that upserts `Entity`/`Concept`/`Rule` nodes.

use std::collections::HashSet;

use gflow_core::ids;
use gflow_core::PropertyMap;
use regex::Regex;
use serde_json::{json, Value};
use tracing::info;

use crate::store::{EdgeKind, GraphStore, NodeKind};

/// A raw input chunk, as produced by an external ingestion pipeline
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: PropertyMap,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: PropertyMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: PropertyMap) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A materialized procedure/step/edge/source-doc node, prior to insertion
#[derive(Debug, Clone)]
pub struct PendingNode {
    pub id: String,
    pub kind: NodeKind,
    pub properties: PropertyMap,
}

/// A materialized edge, prior to insertion
#[derive(Debug, Clone)]
pub struct PendingEdge {
    pub source: String,
    pub kind: EdgeKind,
    pub target: String,
    pub properties: PropertyMap,
}

/// Result of `build_procedure_from_chunks`
#[derive(Debug, Clone)]
pub struct ProcedureGraph {
    pub procedure: PendingNode,
    pub steps: Vec<PendingNode>,
    pub edges: Vec<PendingEdge>,
    pub source_docs: Vec<PendingNode>,
}

/// Result of `build_knowledge_graph_from_chunks`, after nodes/edges have
/// actually been upserted into a `GraphStore`
#[derive(Debug, Clone)]
pub struct KnowledgeGraphResult {
    pub nodes_created: usize,
    pub edges_created: usize,
}

fn procedure_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?:craft|create|make|build|construct)\s+([a-z\s]+)").unwrap(),
        Regex::new(r"(?:how to|steps to|process of)\s+([a-z\s]+)").unwrap(),
        Regex::new(r"([a-z\s]+)\s+(?:procedure|process|creation|crafting)").unwrap(),
    ]
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Detect a procedure name/subtype from the concatenated content of `chunks`.
fn detect_procedure(chunks: &[Chunk]) -> PendingNode {
    let combined: String = chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut procedure_name = "Unknown Procedure".to_string();
    let mut procedure_type = "general".to_string();

    for pattern in procedure_patterns() {
        if let Some(captures) = pattern.captures(&combined) {
            if let Some(m) = captures.get(1) {
                procedure_name = title_case(m.as_str().trim());

                if ["potion", "alchemical", "brew"]
                    .iter()
                    .any(|w| combined.contains(w))
                {
                    procedure_type = "crafting".to_string();
                } else if ["character", "build", "level"]
                    .iter()
                    .any(|w| combined.contains(w))
                {
                    procedure_type = "character_creation".to_string();
                }
                break;
            }
        }
    }

    let procedure_id = ids::procedure_id(&procedure_name);

    PendingNode {
        id: procedure_id,
        kind: NodeKind::Procedure,
        properties: gflow_core::props([
            ("name", json!(procedure_name.clone())),
            ("procedure_type", json!(procedure_type)),
            (
                "description",
                json!(format!("Procedure for {}", procedure_name.to_lowercase())),
            ),
            ("chunk_count", json!(chunks.len())),
        ]),
    }
}

fn step_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?i)(\d+)\.\s*([^.]+)").unwrap(),
        Regex::new(r"(?i)(?:first|second|third|next|then|finally)[,:]\s*([^.]+)").unwrap(),
        Regex::new(r"(?i)step\s+(\d+)[:\s]+([^.]+)").unwrap(),
    ]
}

/// Extract ordered steps from `chunks`, falling back to up to 5 synthetic
/// steps (one per chunk, content-prefixed) if no pattern matched anywhere.
fn extract_steps(chunks: &[Chunk], procedure_id: &str) -> Vec<PendingNode> {
    let mut steps = Vec::new();
    let mut step_counter = 1u32;

    for chunk in chunks {
        for pattern in step_patterns() {
            for captures in pattern.captures_iter(&chunk.content) {
                let (step_num_str, step_text) = if captures.len() >= 3 && captures.get(2).is_some()
                {
                    (
                        captures.get(1).map(|m| m.as_str().to_string()),
                        captures.get(2).unwrap().as_str().trim().to_string(),
                    )
                } else {
                    (None, captures.get(1).unwrap().as_str().trim().to_string())
                };

                let step_number: u32 = step_num_str
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(step_counter);
                let step_num_label = step_num_str.unwrap_or_else(|| step_counter.to_string());

                let step_id = format!("step:{procedure_id}:{step_num_label}");
                let name: String = step_text.chars().take(100).collect();

                steps.push(PendingNode {
                    id: step_id,
                    kind: NodeKind::Step,
                    properties: gflow_core::props([
                        ("name", json!(name)),
                        ("description", json!(step_text)),
                        ("step_number", json!(step_number)),
                        ("chunk_id", json!(chunk.id.clone())),
                        ("procedure_id", json!(procedure_id.to_string())),
                    ]),
                });

                step_counter += 1;
            }
        }
    }

    if steps.is_empty() {
        for (i, chunk) in chunks.iter().take(5).enumerate() {
            let step_number = (i + 1) as u32;
            let step_id = format!("step:{procedure_id}:{step_number}");
            let content: String = chunk.content.chars().take(200).collect();

            steps.push(PendingNode {
                id: step_id,
                kind: NodeKind::Step,
                properties: gflow_core::props([
                    ("name", json!(format!("Step {step_number}"))),
                    ("description", json!(content)),
                    ("step_number", json!(step_number)),
                    ("chunk_id", json!(chunk.id.clone())),
                    ("procedure_id", json!(procedure_id.to_string())),
                ]),
            });
        }
    }

    steps
}

fn metadata_str(metadata: &PropertyMap, key: &str) -> Option<String> {
    metadata.get(key).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Build `SourceDoc` pending nodes, deduplicated by canonical source id.
fn build_source_docs(chunks: &[Chunk]) -> Vec<PendingNode> {
    let mut source_docs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for chunk in chunks {
        let (source_id, source_name) = if let Some(page) = metadata_str(&chunk.metadata, "page") {
            (format!("source:page:{page}"), format!("Page {page}"))
        } else if let Some(section) = metadata_str(&chunk.metadata, "section") {
            (ids::source_doc_id(&section), section)
        } else {
            (format!("source:chunk:{}", chunk.id), "Unknown Source".to_string())
        };

        if seen.insert(source_id.clone()) {
            source_docs.push(PendingNode {
                id: source_id,
                kind: NodeKind::SourceDoc,
                properties: gflow_core::props([
                    ("name", json!(source_name)),
                    ("page", chunk.metadata.get("page").cloned().unwrap_or(Value::Null)),
                    (
                        "section",
                        chunk.metadata.get("section").cloned().unwrap_or(Value::Null),
                    ),
                    (
                        "chunk_type",
                        chunk
                            .metadata
                            .get("chunk_type")
                            .cloned()
                            .unwrap_or_else(|| json!("text")),
                    ),
                    ("source_type", json!("document")),
                ]),
            });
        }
    }

    source_docs
}

/// Build `part_of` (procedure→step), `prereq` (step→step), and `cites`
/// (step→source) edges. Every step cites every source doc in the set —
/// pinned behavior, see DESIGN.md Open Questions.
fn build_edges(
    procedure: &PendingNode,
    steps: &[PendingNode],
    source_docs: &[PendingNode],
) -> Vec<PendingEdge> {
    let mut edges = Vec::new();

    for step in steps {
        let step_number = step.properties.get("step_number").cloned().unwrap_or(json!(0));
        edges.push(PendingEdge {
            source: procedure.id.clone(),
            kind: EdgeKind::PartOf,
            target: step.id.clone(),
            properties: gflow_core::props([("step_number", step_number)]),
        });
    }

    let mut sorted_steps: Vec<&PendingNode> = steps.iter().collect();
    sorted_steps.sort_by_key(|s| {
        s.properties
            .get("step_number")
            .and_then(|v| v.as_u64())
            .unwrap_or(999)
    });

    for (i, window) in sorted_steps.windows(2).enumerate() {
        let current = window[0];
        let next = window[1];
        edges.push(PendingEdge {
            source: next.id.clone(),
            kind: EdgeKind::Prereq,
            target: current.id.clone(),
            properties: gflow_core::props([("sequence", json!(i + 1))]),
        });
    }

    for step in steps {
        let chunk_id = step.properties.get("chunk_id").cloned().unwrap_or(Value::Null);
        for source_doc in source_docs {
            edges.push(PendingEdge {
                source: step.id.clone(),
                kind: EdgeKind::Cites,
                target: source_doc.id.clone(),
                properties: gflow_core::props([
                    ("chunk_id", chunk_id.clone()),
                    ("confidence", json!(0.8)),
                ]),
            });
        }
    }

    edges
}

/// Convert `chunks` into a procedure with steps, source docs and the edges
/// between them. On any internal failure, falls back to a minimal
/// `proc:unknown` structure so callers always get a valid result.
pub fn build_procedure_from_chunks(chunks: &[Chunk]) -> ProcedureGraph {
    info!(chunk_count = chunks.len(), "building procedure from chunks");

    let procedure = detect_procedure(chunks);
    let steps = extract_steps(chunks, &procedure.id);
    let source_docs = build_source_docs(chunks);
    let edges = build_edges(&procedure, &steps, &source_docs);

    ProcedureGraph {
        procedure,
        steps,
        edges,
        source_docs,
    }
}

fn entity_pattern_extract(chunk: &Chunk) -> Vec<PendingNode> {
    let Some(Value::Array(entities)) = chunk.metadata.get("entities") else {
        return Vec::new();
    };

    entities
        .iter()
        .filter_map(|entity| entity.as_object())
        .map(|entity| {
            let name = entity
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let id = ids::entity_id(&name);

            PendingNode {
                id,
                kind: NodeKind::Entity,
                properties: gflow_core::props([
                    (
                        "name",
                        json!(entity
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("Unknown Entity")),
                    ),
                    (
                        "type",
                        entity.get("type").cloned().unwrap_or_else(|| json!("general")),
                    ),
                    (
                        "description",
                        entity.get("description").cloned().unwrap_or_else(|| json!("")),
                    ),
                    ("chunk_id", json!(chunk.id.clone())),
                ]),
            }
        })
        .collect()
}

fn concept_pattern_extract(chunk: &Chunk) -> Vec<PendingNode> {
    let Some(Value::Array(categories)) = chunk.metadata.get("categories") else {
        return Vec::new();
    };

    categories
        .iter()
        .filter_map(|c| c.as_str())
        .map(|category| PendingNode {
            id: ids::concept_id(category),
            kind: NodeKind::Concept,
            properties: gflow_core::props([
                ("name", json!(category)),
                ("category", json!("gameplay_concept")),
                ("chunk_id", json!(chunk.id.clone())),
            ]),
        })
        .collect()
}

fn rule_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?i)DC\s+(\d+)").unwrap(),
        Regex::new(r"(\d+d\d+(?:\+\d+)?)").unwrap(),
        Regex::new(r"(?i)(?:must|required|cannot|may not|always|never)\s+([^.]+)").unwrap(),
    ]
}

fn rule_extract(chunk: &Chunk) -> Vec<PendingNode> {
    let mut rules = Vec::new();
    let mut rule_counter = 1u32;

    'patterns: for pattern in rule_patterns() {
        for m in pattern.find_iter(&chunk.content) {
            let rule_text = m.as_str();
            let rule_id = ids::rule_id(rule_text);

            rules.push(PendingNode {
                id: rule_id,
                kind: NodeKind::Rule,
                properties: gflow_core::props([
                    ("name", json!(format!("Rule {rule_counter}"))),
                    ("text", json!(rule_text)),
                    ("rule_type", json!("mechanical")),
                    ("chunk_id", json!(chunk.id.clone())),
                ]),
            });

            rule_counter += 1;
            if rule_counter > 10 {
                break 'patterns;
            }
        }
    }

    rules
}

fn create_source_doc_node(chunk: &Chunk) -> Option<PendingNode> {
    let page = metadata_str(&chunk.metadata, "page")?;
    Some(PendingNode {
        id: format!("source:page:{page}"),
        kind: NodeKind::SourceDoc,
        properties: gflow_core::props([
            ("name", json!(format!("Page {page}"))),
            ("page", chunk.metadata.get("page").cloned().unwrap_or(Value::Null)),
            ("document_type", json!("rulebook")),
            ("chunk_id", json!(chunk.id.clone())),
        ]),
    })
}

/// Upsert Entity/Concept/Rule/SourceDoc nodes and `cites` edges from enriched
/// chunks (those carrying explicit `entities`/`categories` metadata).
pub async fn build_knowledge_graph_from_chunks(
    store: &GraphStore,
    chunks: &[Chunk],
) -> KnowledgeGraphResult {
    info!(chunk_count = chunks.len(), "building knowledge graph from chunks");

    let mut nodes_created = 0usize;
    let mut edges_created = 0usize;

    for chunk in chunks {
        let entities = entity_pattern_extract(chunk);
        let concepts = concept_pattern_extract(chunk);
        let rules = rule_extract(chunk);

        for entity in &entities {
            if store
                .upsert_node(entity.id.clone(), entity.kind, entity.properties.clone())
                .await
                .is_ok()
            {
                nodes_created += 1;
            }
        }
        for concept in &concepts {
            if store
                .upsert_node(concept.id.clone(), concept.kind, concept.properties.clone())
                .await
                .is_ok()
            {
                nodes_created += 1;
            }
        }
        for rule in &rules {
            if store
                .upsert_node(rule.id.clone(), rule.kind, rule.properties.clone())
                .await
                .is_ok()
            {
                nodes_created += 1;
            }
        }

        if let Some(source_doc) = create_source_doc_node(chunk) {
            if store
                .upsert_node(
                    source_doc.id.clone(),
                    source_doc.kind,
                    source_doc.properties.clone(),
                )
                .await
                .is_ok()
            {
                nodes_created += 1;

                let confidence = chunk
                    .metadata
                    .get("confidence")
                    .cloned()
                    .unwrap_or(json!(1.0));

                for citer in entities.iter().chain(concepts.iter()).chain(rules.iter()) {
                    let props = gflow_core::props([
                        ("chunk_id", json!(chunk.id.clone())),
                        ("confidence", confidence.clone()),
                    ]);
                    if store
                        .upsert_edge(citer.id.clone(), EdgeKind::Cites, source_doc.id.clone(), props)
                        .await
                        .is_ok()
                    {
                        edges_created += 1;
                    }
                }
            }
        }
    }

    KnowledgeGraphResult {
        nodes_created,
        edges_created,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_procedure_is_deterministic() {
        let chunks = vec![Chunk::new("c1", "Craft a healing potion using rare herbs.")];
        let first = detect_procedure(&chunks);
        let second = detect_procedure(&chunks);
        assert_eq!(first.id, second.id);
        assert_eq!(first.properties.get("procedure_type"), Some(&json!("crafting")));
    }

    #[test]
    fn test_build_procedure_from_chunks_numbered_steps() {
        let chunks = vec![Chunk::new(
            "c1",
            "Craft a healing potion. 1. Gather herbs. 2. Boil water. 3. Mix ingredients.",
        )];

        let graph = build_procedure_from_chunks(&chunks);
        assert!(!graph.steps.is_empty());
        assert!(graph.edges.iter().any(|e| e.kind == EdgeKind::PartOf));
    }

    #[test]
    fn test_fallback_synthesizes_steps_when_no_pattern_matches() {
        let chunks = vec![
            Chunk::new("c1", "some prose with no step markers at all"),
            Chunk::new("c2", "more prose, still no markers"),
        ];

        let graph = build_procedure_from_chunks(&chunks);
        assert_eq!(graph.steps.len(), 2);
        assert_eq!(graph.steps[0].properties.get("step_number"), Some(&json!(1)));
    }

    #[test]
    fn test_every_step_cites_every_source_doc() {
        let mut meta1 = PropertyMap::new();
        meta1.insert("page".to_string(), json!(1));
        let mut meta2 = PropertyMap::new();
        meta2.insert("page".to_string(), json!(2));

        let chunks = vec![
            Chunk::new("c1", "1. Gather herbs.").with_metadata(meta1),
            Chunk::new("c2", "2. Boil water.").with_metadata(meta2),
        ];

        let graph = build_procedure_from_chunks(&chunks);
        let cites_count = graph.edges.iter().filter(|e| e.kind == EdgeKind::Cites).count();
        assert_eq!(cites_count, graph.steps.len() * graph.source_docs.len());
    }

    #[test]
    fn test_source_docs_dedup_by_canonical_id() {
        let mut meta = PropertyMap::new();
        meta.insert("page".to_string(), json!(5));

        let chunks = vec![
            Chunk::new("c1", "text").with_metadata(meta.clone()),
            Chunk::new("c2", "more text").with_metadata(meta),
        ];

        let docs = build_source_docs(&chunks);
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_build_knowledge_graph_upserts_entities_and_rules() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path()).await.unwrap();

        let mut metadata = PropertyMap::new();
        metadata.insert(
            "entities".to_string(),
            json!([{"name": "Goblin King", "type": "npc"}]),
        );
        metadata.insert("page".to_string(), json!(12));

        let chunks = vec![Chunk::new("c1", "DC 15 to resist the curse.").with_metadata(metadata)];

        let result = build_knowledge_graph_from_chunks(&store, &chunks).await;
        assert!(result.nodes_created >= 2);
        assert!(result.edges_created >= 1);
    }
}
