//! Versioned property-graph store
//!
//! In-memory node/edge maps backed by a JSON snapshot plus an append-only
//! write-ahead log. Every mutation is logged before the in-memory maps are
//! updated and the snapshot is rewritten after each mutation, so a cold
//! start can recover by loading the snapshot and replaying the log tail.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gflow_core::{props, GflowError, PropertyMap, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Traversal and fan-out limits enforced by `neighbors`
pub const MAX_DEPTH: usize = 10;
pub const MAX_NEIGHBORS: usize = 1000;

/// Closed enumeration of node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum NodeKind {
    Rule,
    Concept,
    Procedure,
    Step,
    Entity,
    SourceDoc,
    Artifact,
    Decision,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "Rule",
            Self::Concept => "Concept",
            Self::Procedure => "Procedure",
            Self::Step => "Step",
            Self::Entity => "Entity",
            Self::SourceDoc => "SourceDoc",
            Self::Artifact => "Artifact",
            Self::Decision => "Decision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Rule" => Some(Self::Rule),
            "Concept" => Some(Self::Concept),
            "Procedure" => Some(Self::Procedure),
            "Step" => Some(Self::Step),
            "Entity" => Some(Self::Entity),
            "SourceDoc" => Some(Self::SourceDoc),
            "Artifact" => Some(Self::Artifact),
            "Decision" => Some(Self::Decision),
            _ => None,
        }
    }
}

/// Closed enumeration of edge kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DependsOn,
    PartOf,
    Implements,
    Cites,
    Produces,
    VariantOf,
    Prereq,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::PartOf => "part_of",
            Self::Implements => "implements",
            Self::Cites => "cites",
            Self::Produces => "produces",
            Self::VariantOf => "variant_of",
            Self::Prereq => "prereq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "depends_on" => Some(Self::DependsOn),
            "part_of" => Some(Self::PartOf),
            "implements" => Some(Self::Implements),
            "cites" => Some(Self::Cites),
            "produces" => Some(Self::Produces),
            "variant_of" => Some(Self::VariantOf),
            "prereq" => Some(Self::Prereq),
            _ => None,
        }
    }
}

/// A versioned graph node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub properties: PropertyMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// A versioned graph edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub target: String,
    pub properties: PropertyMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalEntry {
    id: String,
    operation: String,
    data: Value,
    timestamp: DateTime<Utc>,
}

/// Aggregate counts returned by `statistics()`
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_types: HashMap<String, usize>,
    pub edge_types: HashMap<String, usize>,
    pub write_ahead_log_entries: usize,
}

struct Inner {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    wal: Vec<WalEntry>,
}

/// Versioned property-graph store with PII scrubbing and a write-ahead log
pub struct GraphStore {
    inner: RwLock<Inner>,
    storage_path: PathBuf,
}

const PII_PATTERNS: &[&str] = &["email", "phone", "ssn", "password", "token", "key", "api_key"];
const REDACTION_SENTINEL: &str = "***REDACTED***";
const MAX_STRING_LEN: usize = 1000;

fn sanitize_properties(properties: PropertyMap) -> PropertyMap {
    properties
        .into_iter()
        .map(|(key, value)| {
            let key_lower = key.to_lowercase();
            if PII_PATTERNS.iter().any(|p| key_lower.contains(p)) {
                (key, Value::String(REDACTION_SENTINEL.to_string()))
            } else if let Value::String(s) = &value {
                if s.chars().count() > MAX_STRING_LEN {
                    let truncated: String = s.chars().take(MAX_STRING_LEN).collect();
                    (key, Value::String(format!("{truncated}...")))
                } else {
                    (key, value)
                }
            } else {
                (key, value)
            }
        })
        .collect()
}

impl GraphStore {
    /// Open (or create) a graph store rooted at `storage_path`, replaying any
    /// existing snapshot and write-ahead log found there.
    pub async fn open(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        tokio::fs::create_dir_all(&storage_path).await?;

        let nodes = load_json::<HashMap<String, Node>>(&storage_path.join("nodes.json"))
            .await?
            .unwrap_or_default();
        let edges = load_json::<HashMap<String, Edge>>(&storage_path.join("edges.json"))
            .await?
            .unwrap_or_default();
        let wal = load_json::<Vec<WalEntry>>(&storage_path.join("write_ahead_log.json"))
            .await?
            .unwrap_or_default();

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "graph store opened"
        );

        Ok(Self {
            inner: RwLock::new(Inner { nodes, edges, wal }),
            storage_path,
        })
    }

    pub async fn upsert_node(
        &self,
        id: impl Into<String>,
        kind: NodeKind,
        properties: PropertyMap,
    ) -> Result<Node> {
        let id = id.into();
        let sanitized = sanitize_properties(properties);
        let now = Utc::now();

        let mut guard = self.inner.write().await;

        let node = if let Some(existing) = guard.nodes.get_mut(&id) {
            existing.properties.extend(sanitized.clone());
            existing.updated_at = now;
            existing.version += 1;
            debug!(node_id = %id, version = existing.version, "updated node");
            existing.clone()
        } else {
            let node = Node {
                id: id.clone(),
                kind,
                properties: sanitized.clone(),
                created_at: now,
                updated_at: now,
                version: 1,
            };
            guard.nodes.insert(id.clone(), node.clone());
            debug!(node_id = %id, "created node");
            node
        };

        let entry = WalEntry {
            id: uuid::Uuid::new_v4().to_string(),
            operation: "upsert_node".to_string(),
            data: serde_json::json!({
                "node_id": id,
                "type": kind.as_str(),
                "properties": sanitized,
            }),
            timestamp: now,
        };
        guard.wal.push(entry);

        self.flush(&guard).await;
        Ok(node)
    }

    pub async fn upsert_edge(
        &self,
        source: impl Into<String>,
        kind: EdgeKind,
        target: impl Into<String>,
        properties: PropertyMap,
    ) -> Result<Edge> {
        let source = source.into();
        let target = target.into();
        let sanitized = sanitize_properties(properties);
        let now = Utc::now();

        let mut guard = self.inner.write().await;

        if !guard.nodes.contains_key(&source) {
            return Err(GflowError::missing_node(source));
        }
        if !guard.nodes.contains_key(&target) {
            return Err(GflowError::missing_node(target));
        }

        let id = gflow_core::ids::edge_id(&source, kind.as_str(), &target);

        let edge = if let Some(existing) = guard.edges.get_mut(&id) {
            existing.properties.extend(sanitized.clone());
            existing.updated_at = now;
            existing.version += 1;
            debug!(edge_id = %id, version = existing.version, "updated edge");
            existing.clone()
        } else {
            let edge = Edge {
                id: id.clone(),
                source: source.clone(),
                kind,
                target: target.clone(),
                properties: sanitized.clone(),
                created_at: now,
                updated_at: now,
                version: 1,
            };
            guard.edges.insert(id.clone(), edge.clone());
            debug!(edge_id = %id, "created edge");
            edge
        };

        let entry = WalEntry {
            id: uuid::Uuid::new_v4().to_string(),
            operation: "upsert_edge".to_string(),
            data: serde_json::json!({
                "source": source,
                "type": kind.as_str(),
                "target": target,
                "properties": sanitized,
            }),
            timestamp: now,
        };
        guard.wal.push(entry);

        self.flush(&guard).await;
        Ok(edge)
    }

    pub async fn get_node(&self, id: &str) -> Option<Node> {
        self.inner.read().await.nodes.get(id).cloned()
    }

    /// Snapshot every node currently in the store. Used by callers (the
    /// graph-guided reasoner's seeding step) that need to score the whole
    /// node set rather than walk from a known id.
    pub async fn all_nodes(&self) -> Vec<Node> {
        self.inner.read().await.nodes.values().cloned().collect()
    }

    /// Breadth-first neighbor traversal, bounded by `MAX_DEPTH`/`MAX_NEIGHBORS`.
    pub async fn neighbors(
        &self,
        id: &str,
        etypes: Option<&[EdgeKind]>,
        depth: usize,
    ) -> Vec<Node> {
        let depth = depth.min(MAX_DEPTH);
        let guard = self.inner.read().await;

        if !guard.nodes.contains_key(id) || depth == 0 {
            return Vec::new();
        }

        let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut discovered: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut current_level: std::collections::HashSet<String> =
            std::iter::once(id.to_string()).collect();

        for _ in 0..depth {
            let mut next_level = std::collections::HashSet::new();

            for current in &current_level {
                if visited.contains(current) {
                    continue;
                }
                visited.insert(current.clone());

                for edge in guard.edges.values() {
                    if &edge.source == current {
                        if etypes.map_or(true, |types| types.contains(&edge.kind)) {
                            if edge.target != id {
                                discovered.insert(edge.target.clone());
                            }
                            next_level.insert(edge.target.clone());
                        }
                    } else if &edge.target == current {
                        if etypes.map_or(true, |types| types.contains(&edge.kind)) {
                            if edge.source != id {
                                discovered.insert(edge.source.clone());
                            }
                            next_level.insert(edge.source.clone());
                        }
                    }
                }
            }

            current_level = next_level;

            if discovered.len() >= MAX_NEIGHBORS {
                warn!(node_id = %id, "neighbor search truncated at MAX_NEIGHBORS");
                break;
            }
        }

        discovered
            .into_iter()
            .filter_map(|nid| guard.nodes.get(&nid).cloned())
            .collect()
    }

    /// Parameterized query. The only supported pattern shape, per contract:
    /// "MATCH (n:Kind) WHERE ..." — matches all nodes of `Kind` whose
    /// properties satisfy every `(key, value)` pair in `params`. Parameters
    /// bind by name and never alter the pattern's structure.
    pub async fn query(&self, pattern: &str, params: &PropertyMap) -> Vec<Node> {
        let guard = self.inner.read().await;
        let mut results = Vec::new();

        if pattern.starts_with("MATCH") && pattern.contains("WHERE") {
            if pattern.contains("n:Procedure") {
                for node in guard.nodes.values() {
                    if node.kind == NodeKind::Procedure && matches_params(node, params) {
                        results.push(node.clone());
                    }
                }
            } else if let Some(kind) = extract_kind(pattern) {
                for node in guard.nodes.values() {
                    if node.kind == kind && matches_params(node, params) {
                        results.push(node.clone());
                    }
                }
            }
        }

        results.truncate(100);
        results
    }

    pub async fn statistics(&self) -> Stats {
        let guard = self.inner.read().await;
        let mut node_types = HashMap::new();
        let mut edge_types = HashMap::new();

        for node in guard.nodes.values() {
            *node_types.entry(node.kind.as_str().to_string()).or_insert(0) += 1;
        }
        for edge in guard.edges.values() {
            *edge_types.entry(edge.kind.as_str().to_string()).or_insert(0) += 1;
        }

        debug!(
            total_nodes = guard.nodes.len(),
            total_edges = guard.edges.len(),
            "graph statistics computed"
        );

        Stats {
            total_nodes: guard.nodes.len(),
            total_edges: guard.edges.len(),
            node_types,
            edge_types,
            write_ahead_log_entries: guard.wal.len(),
        }
    }

    async fn flush(&self, guard: &Inner) {
        if let Err(err) = write_json(&self.storage_path.join("nodes.json"), &guard.nodes).await {
            warn!(error = %err, "failed to persist node snapshot");
        }
        if let Err(err) = write_json(&self.storage_path.join("edges.json"), &guard.edges).await {
            warn!(error = %err, "failed to persist edge snapshot");
        }
        if let Err(err) =
            write_json(&self.storage_path.join("write_ahead_log.json"), &guard.wal).await
        {
            warn!(error = %err, "failed to persist write-ahead log");
        }
    }
}

fn matches_params(node: &Node, params: &PropertyMap) -> bool {
    params
        .iter()
        .all(|(key, value)| node.properties.get(key).map_or(true, |v| v == value))
}

fn extract_kind(pattern: &str) -> Option<NodeKind> {
    let start = pattern.find("n:")? + 2;
    let rest = &pattern[start..];
    let end = rest.find(|c: char| !c.is_alphanumeric()).unwrap_or(rest.len());
    NodeKind::parse(&rest[..end])
}

async fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = tokio::fs::read(path).await?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(Some(value))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

pub fn node_props(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> PropertyMap {
    props(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_store() -> (GraphStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_upsert_node_versions_from_one() {
        let (store, _dir) = test_store().await;
        let node = store
            .upsert_node("proc:1", NodeKind::Procedure, node_props([("name", json!("Craft Potion"))]))
            .await
            .unwrap();
        assert_eq!(node.version, 1);

        let node = store
            .upsert_node("proc:1", NodeKind::Procedure, node_props([("name", json!("Craft Potion"))]))
            .await
            .unwrap();
        assert_eq!(node.version, 2);
    }

    #[tokio::test]
    async fn test_upsert_edge_requires_both_endpoints() {
        let (store, _dir) = test_store().await;
        store
            .upsert_node("a", NodeKind::Step, PropertyMap::new())
            .await
            .unwrap();

        let err = store
            .upsert_edge("a", EdgeKind::PartOf, "missing", PropertyMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GflowError::MissingNode(_)));
    }

    #[tokio::test]
    async fn test_upsert_edge_id_is_deterministic() {
        let (store, _dir) = test_store().await;
        store.upsert_node("a", NodeKind::Step, PropertyMap::new()).await.unwrap();
        store.upsert_node("b", NodeKind::Step, PropertyMap::new()).await.unwrap();

        let e1 = store
            .upsert_edge("a", EdgeKind::Prereq, "b", PropertyMap::new())
            .await
            .unwrap();
        let e2 = store
            .upsert_edge("a", EdgeKind::Prereq, "b", PropertyMap::new())
            .await
            .unwrap();
        assert_eq!(e1.id, e2.id);
        assert_eq!(e2.version, 2);
    }

    #[tokio::test]
    async fn test_pii_keys_are_redacted() {
        let (store, _dir) = test_store().await;
        let node = store
            .upsert_node(
                "entity:1",
                NodeKind::Entity,
                node_props([("api_key", json!("sk-super-secret")), ("name", json!("Bob"))]),
            )
            .await
            .unwrap();

        assert_eq!(
            node.properties.get("api_key"),
            Some(&json!("***REDACTED***"))
        );
        assert_eq!(node.properties.get("name"), Some(&json!("Bob")));
    }

    #[tokio::test]
    async fn test_long_strings_are_truncated() {
        let (store, _dir) = test_store().await;
        let long_value = "x".repeat(1500);
        let node = store
            .upsert_node(
                "entity:2",
                NodeKind::Entity,
                node_props([("description", json!(long_value))]),
            )
            .await
            .unwrap();

        let stored = node.properties.get("description").unwrap().as_str().unwrap();
        assert!(stored.ends_with("..."));
        assert_eq!(stored.len(), 1000 + 3);
    }

    #[tokio::test]
    async fn test_neighbors_depth_zero_is_empty() {
        let (store, _dir) = test_store().await;
        store.upsert_node("a", NodeKind::Step, PropertyMap::new()).await.unwrap();
        let result = store.neighbors("a", None, 0).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_neighbors_respects_etype_filter() {
        let (store, _dir) = test_store().await;
        store.upsert_node("proc", NodeKind::Procedure, PropertyMap::new()).await.unwrap();
        store.upsert_node("step1", NodeKind::Step, PropertyMap::new()).await.unwrap();
        store.upsert_node("source1", NodeKind::SourceDoc, PropertyMap::new()).await.unwrap();
        store
            .upsert_edge("proc", EdgeKind::PartOf, "step1", PropertyMap::new())
            .await
            .unwrap();
        store
            .upsert_edge("step1", EdgeKind::Cites, "source1", PropertyMap::new())
            .await
            .unwrap();

        let part_of_only = store.neighbors("proc", Some(&[EdgeKind::PartOf]), 1).await;
        assert_eq!(part_of_only.len(), 1);
        assert_eq!(part_of_only[0].id, "step1");
    }

    #[tokio::test]
    async fn test_query_matches_procedure_by_property() {
        let (store, _dir) = test_store().await;
        store
            .upsert_node(
                "proc:1",
                NodeKind::Procedure,
                node_props([("name", json!("Craft Healing Potion"))]),
            )
            .await
            .unwrap();
        store
            .upsert_node(
                "proc:2",
                NodeKind::Procedure,
                node_props([("name", json!("Forge Sword"))]),
            )
            .await
            .unwrap();

        let mut params = PropertyMap::new();
        params.insert("name".to_string(), json!("Craft Healing Potion"));

        let results = store
            .query("MATCH (n:Procedure) WHERE n.name = $name", &params)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "proc:1");
    }

    #[tokio::test]
    async fn test_all_nodes_returns_every_node() {
        let (store, _dir) = test_store().await;
        store.upsert_node("a", NodeKind::Procedure, PropertyMap::new()).await.unwrap();
        store.upsert_node("b", NodeKind::Step, PropertyMap::new()).await.unwrap();

        let mut ids: Vec<String> = store.all_nodes().await.into_iter().map(|n| n.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_statistics_counts_by_kind() {
        let (store, _dir) = test_store().await;
        store.upsert_node("a", NodeKind::Procedure, PropertyMap::new()).await.unwrap();
        store.upsert_node("b", NodeKind::Step, PropertyMap::new()).await.unwrap();

        let stats = store.statistics().await;
        assert_eq!(stats.total_nodes, 2);
        assert_eq!(stats.node_types.get("Procedure"), Some(&1));
        assert_eq!(stats.node_types.get("Step"), Some(&1));
    }

    #[tokio::test]
    async fn test_reopen_replays_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = GraphStore::open(dir.path()).await.unwrap();
            store
                .upsert_node("a", NodeKind::Procedure, node_props([("name", json!("Test"))]))
                .await
                .unwrap();
        }

        let reopened = GraphStore::open(dir.path()).await.unwrap();
        let node = reopened.get_node("a").await;
        assert!(node.is_some());
        assert_eq!(node.unwrap().version, 1);
    }
}
