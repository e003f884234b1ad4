//! # gflow-planner
//!
//! Graph-aware decomposition of a user goal into an executable, cost-
//! estimated, checkpoint-annotated task DAG, plus cycle/budget validation.

pub mod plan;
pub mod planner;
pub mod validator;

pub use plan::{PlanConstraints, TaskEdge, WorkflowPlan, WorkflowTask, MAX_TASKS};
pub use planner::{emergency_fallback_plan, plan_from_goal, sanitize};
pub use validator::validate_plan;
