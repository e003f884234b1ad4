//! # gflow-state
//!
//! Persistent, JSON-file-backed storage for workflow execution state, task
//! state, and task-produced artifacts.

pub mod state;
pub mod store;

pub use state::{TaskState, TaskStatus, WorkflowState, WorkflowStatus};
pub use store::{safe_name, WorkflowStateStore, WorkflowSummary};
