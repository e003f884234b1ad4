//! Bounded-parallel DAG execution over `WorkflowPlan`s produced by `gflow-planner`.
//!
//! Tasks run concurrently up to a configurable limit, retry with exponential
//! backoff on failure, and propagate `blocked` status transitively to every
//! downstream task once a dependency is exhausted. Every state transition is
//! persisted through `gflow-state` before the executor proceeds, so a crashed
//! process can resume from the last durable checkpoint.

mod dispatch;
mod executor;
mod retry;

pub use executor::{CancelToken, WorkflowExecutor};
pub use retry::RetryPolicy;
