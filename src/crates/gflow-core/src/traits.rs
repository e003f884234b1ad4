//! Narrow capability traits consumed by the Executor and the Reasoner
//!
//! `TaskTool` and `Retriever` are the only ways the core calls out to the
//! outside world. Neither trait is implemented anywhere in this workspace;
//! concrete LLM/retriever/tool wiring is an external collaborator's job.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One chunk of retrieved context, as returned by a `Retriever`
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub source: Option<String>,
    pub page: Option<String>,
    pub score: Option<f64>,
}

/// Narrow retrieval capability consumed by the graph-guided reasoner
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>>;
}

/// Outcome of a single task attempt, as produced by a `TaskTool`
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: Value,
    pub artifacts: Vec<Value>,
}

impl ToolOutcome {
    pub fn new(output: Value) -> Self {
        Self {
            output,
            artifacts: Vec::new(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Value>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

/// One invocation input handed to a `TaskTool`
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub task_id: String,
    pub task_type: String,
    pub tool: String,
    pub model: String,
    pub prompt: String,
    pub parameters: Value,
}

/// Narrow task-execution capability consumed by the Executor.
///
/// The coordinator owns retries and backoff; a `TaskTool` implementation is
/// called exactly once per attempt and should be synchronous-per-attempt from
/// the coordinator's point of view (no internal retry loop).
#[async_trait]
pub trait TaskTool: Send + Sync {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl TaskTool for EchoTool {
        async fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutcome> {
            Ok(ToolOutcome::new(Value::String(invocation.prompt.clone())))
        }
    }

    #[tokio::test]
    async fn test_mock_tool_invocation_round_trips_prompt() {
        let tool = EchoTool;
        let invocation = ToolInvocation {
            task_id: "task:1".into(),
            task_type: "retrieval".into(),
            tool: "retriever".into(),
            model: "claude-3-haiku".into(),
            prompt: "find the healing potion recipe".into(),
            parameters: Value::Null,
        };

        let outcome = tool.invoke(&invocation).await.unwrap();
        assert_eq!(outcome.output, Value::String(invocation.prompt));
        assert!(outcome.artifacts.is_empty());
    }
}
