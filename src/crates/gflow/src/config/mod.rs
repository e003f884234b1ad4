//! Configuration management for gflow
//!
//! Supports dual-location configuration:
//! - User-level: ~/.gflow/gflow.toml
//! - Project-level: ./.gflow/gflow.toml
//!
//! Project-level config overrides user-level config.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{BudgetConfig, ExecutorConfig, GflowConfig, LoggingConfig, PlannerConfig, StorageConfig};

use anyhow::Result;

/// Load configuration from both locations with project config taking precedence.
pub async fn load_config() -> Result<GflowConfig> {
    ConfigLoader::new().load().await
}
