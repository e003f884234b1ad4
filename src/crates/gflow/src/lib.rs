//! # gflow
//!
//! CLI front-end that wires `GraphStore`, `gflow-planner`, `gflow-budget`,
//! `gflow-executor` and `gflow-reasoner` into a single graph-centered
//! workflow engine.

pub mod cli;
pub mod config;
pub mod context;
pub mod init;
pub mod retriever;

pub use config::{load_config, GflowConfig};
pub use context::GflowContext;
