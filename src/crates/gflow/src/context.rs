//! Bundles the resources every subcommand needs: the graph store, the
//! workflow state store, the model catalog and the resolved configuration.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use gflow_budget::{default_catalog, ModelConfig};
use gflow_executor::{RetryPolicy, WorkflowExecutor};
use gflow_graph::GraphStore;
use gflow_planner::PlanConstraints;
use gflow_state::WorkflowStateStore;
use tracing::info;

use crate::config::GflowConfig;

/// Shared resources wired together once at CLI startup and handed to every
/// subcommand handler.
pub struct GflowContext {
    config: GflowConfig,
    graph: Arc<GraphStore>,
    state_store: Arc<WorkflowStateStore>,
    catalog: HashMap<String, ModelConfig>,
}

impl GflowContext {
    pub async fn build(config: GflowConfig) -> Result<Self> {
        let graph_path = config.graph_path();
        let state_path = config.state_path();

        info!(graph = %graph_path.display(), state = %state_path.display(), "opening gflow storage");

        let graph = Arc::new(GraphStore::open(graph_path).await?);
        let state_store = Arc::new(WorkflowStateStore::open(state_path).await?);
        let catalog = default_catalog();

        Ok(Self { config, graph, state_store, catalog })
    }

    pub fn config(&self) -> &GflowConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn state_store(&self) -> &Arc<WorkflowStateStore> {
        &self.state_store
    }

    pub fn catalog(&self) -> &HashMap<String, ModelConfig> {
        &self.catalog
    }

    pub fn plan_constraints(&self) -> PlanConstraints {
        PlanConstraints {
            max_tokens: self.config.planner.max_tokens,
            max_time_s: self.config.planner.max_time_s,
        }
    }

    /// A freshly configured executor; cheap to construct since it only holds
    /// an `Arc` to the shared state store plus scalar settings.
    pub fn executor(&self) -> WorkflowExecutor {
        let retry = RetryPolicy {
            max_attempts: self.config.executor.max_attempts,
            base_delay_s: self.config.executor.base_delay_s,
            ..RetryPolicy::default()
        };

        WorkflowExecutor::new(self.state_store.clone(), self.config.executor.max_parallel).with_retry_policy(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_opens_storage_under_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GflowConfig::default();
        config.storage.graph_path = dir.path().join("graph").to_string_lossy().to_string();
        config.storage.state_path = dir.path().join("workflows").to_string_lossy().to_string();

        let context = GflowContext::build(config).await.unwrap();
        assert_eq!(context.graph().statistics().await.total_nodes, 0);
        assert!(context.catalog().contains_key("claude-3-haiku"));
    }
}
