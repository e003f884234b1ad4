//! Task types and the `WorkflowPlan` container

use serde::{Deserialize, Serialize};

/// A single unit of work inside a `WorkflowPlan`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub name: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub tool: String,
    pub model: String,
    pub prompt: String,
    pub parameters: serde_json::Value,
    pub estimated_tokens: u64,
    pub estimated_time_s: u64,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub checkpoint: bool,
}

/// A directed dependency edge between two task ids
pub type TaskEdge = (String, String);

/// A complete, estimated, checkpoint-annotated workflow plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub id: String,
    pub goal: String,
    pub procedure_id: Option<String>,
    pub tasks: Vec<WorkflowTask>,
    pub edges: Vec<TaskEdge>,
    pub total_estimated_tokens: u64,
    pub total_estimated_time_s: u64,
    pub checkpoints: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Plan-level resource constraints, overridable per call to `plan_from_goal`
#[derive(Debug, Clone, Copy)]
pub struct PlanConstraints {
    pub max_tokens: u64,
    pub max_time_s: u64,
}

impl Default for PlanConstraints {
    fn default() -> Self {
        Self {
            max_tokens: 50_000,
            max_time_s: 300,
        }
    }
}

pub const MAX_TASKS: usize = 20;
