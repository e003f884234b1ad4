//! Graph admin command handlers: add-node, add-edge, stats

use anyhow::{anyhow, Result};
use colored::Colorize;
use gflow_graph::{EdgeKind, NodeKind};

use crate::context::GflowContext;

fn parse_properties(raw: &str) -> Result<gflow_core::PropertyMap> {
    if raw.trim().is_empty() {
        return Ok(gflow_core::PropertyMap::new());
    }
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| anyhow!("invalid properties JSON: {e}"))?;
    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(anyhow!("properties must be a JSON object")),
    }
}

pub async fn handle_add_node(ctx: &GflowContext, id: String, kind: String, properties: String) -> Result<()> {
    let node_kind = NodeKind::parse(&kind).ok_or_else(|| anyhow!("unknown node type '{kind}'"))?;
    let props = parse_properties(&properties)?;

    let node = ctx.graph().upsert_node(id, node_kind, props).await?;
    println!("{} node {} (version {})", "upserted".green(), node.id, node.version);
    Ok(())
}

pub async fn handle_add_edge(ctx: &GflowContext, source: String, kind: String, target: String) -> Result<()> {
    let edge_kind = EdgeKind::parse(&kind).ok_or_else(|| anyhow!("unknown edge type '{kind}'"))?;

    let edge = ctx
        .graph()
        .upsert_edge(source, edge_kind, target, gflow_core::PropertyMap::new())
        .await?;
    println!("{} edge {} -[{}]-> {}", "upserted".green(), edge.source, edge.kind.as_str(), edge.target);
    Ok(())
}

pub async fn handle_stats(ctx: &GflowContext) -> Result<()> {
    let stats = ctx.graph().statistics().await;

    println!("{}", "Graph statistics".bold().underline());
    println!("  nodes: {}", stats.total_nodes);
    println!("  edges: {}", stats.total_edges);
    println!("  write-ahead log entries: {}", stats.write_ahead_log_entries);
    println!();

    println!("{}", "Node types".bold());
    let mut node_types: Vec<_> = stats.node_types.iter().collect();
    node_types.sort_by_key(|(k, _)| k.clone());
    for (kind, count) in node_types {
        println!("  {kind:<16} {count}");
    }

    println!("{}", "Edge types".bold());
    let mut edge_types: Vec<_> = stats.edge_types.iter().collect();
    edge_types.sort_by_key(|(k, _)| k.clone());
    for (kind, count) in edge_types {
        println!("  {kind:<16} {count}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties_rejects_non_object() {
        let result = parse_properties("[1, 2, 3]");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_properties_empty_string_is_empty_map() {
        let props = parse_properties("").unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn test_parse_properties_parses_object() {
        let props = parse_properties(r#"{"name": "Forge Sword"}"#).unwrap();
        assert_eq!(props.get("name").and_then(|v| v.as_str()), Some("Forge Sword"));
    }
}
