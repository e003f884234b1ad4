//! Task and workflow state types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gflow_planner::WorkflowPlan;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of an individual task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution state of one task within a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub id: String,
    pub status: TaskStatus,
    pub dependencies: Vec<String>,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
}

impl TaskState {
    pub fn new(id: impl Into<String>, dependencies: Vec<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            dependencies,
            retries: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            output: None,
            error: None,
            artifacts: Vec::new(),
        }
    }

    /// Wall-clock duration from start to completion, if both are recorded.
    pub fn duration_s(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

/// Overall workflow run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Error,
    PartialFailure,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::PartialFailure => "partial_failure",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Complete execution state of a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    pub plan_id: Option<String>,
    pub goal: String,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: HashMap<String, TaskState>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
    pub error: Option<String>,
    pub resumed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checkpoints: Vec<Value>,
    /// The plan this run executes. Persisted alongside task state so
    /// `resume_workflow` can restore the true dependency graph instead of
    /// reconstructing an approximate one from task ids alone.
    #[serde(default)]
    pub plan: Option<WorkflowPlan>,
}

impl WorkflowState {
    pub fn new(id: impl Into<String>, goal: impl Into<String>, plan: WorkflowPlan) -> Self {
        Self {
            id: id.into(),
            plan_id: Some(plan.id.clone()),
            goal: goal.into(),
            status: WorkflowStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            tasks: HashMap::new(),
            artifacts: Vec::new(),
            error: None,
            resumed_at: None,
            checkpoints: Vec::new(),
            plan: Some(plan),
        }
    }

    pub fn duration_s(&self) -> Option<f64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_round_trips_through_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::Skipped,
            TaskStatus::Blocked,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_task_state_duration_requires_both_timestamps() {
        let mut task = TaskState::new("t1", vec![]);
        assert!(task.duration_s().is_none());

        task.started_at = Some(Utc::now());
        assert!(task.duration_s().is_none());

        task.completed_at = Some(task.started_at.unwrap() + chrono::Duration::seconds(5));
        assert!((task.duration_s().unwrap() - 5.0).abs() < 0.01);
    }
}
