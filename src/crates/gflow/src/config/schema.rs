//! Configuration schema for the gflow CLI

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level gflow configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GflowConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the graph store and workflow state store keep their data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Graph store directory, relative to ~/.gflow unless absolute
    pub graph_path: String,
    /// Workflow state store directory, relative to ~/.gflow unless absolute
    pub state_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            graph_path: "graph".to_string(),
            state_path: "workflows".to_string(),
        }
    }
}

/// Planner resource ceilings, mirrors `gflow_planner::PlanConstraints`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub max_tokens: u64,
    pub max_time_s: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 50_000,
            max_time_s: 300,
        }
    }
}

/// Executor concurrency and retry defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub max_parallel: usize,
    pub max_attempts: u32,
    pub base_delay_s: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: 3,
            max_attempts: 3,
            base_delay_s: 1.0,
        }
    }
}

/// Default requesting-role used when a subcommand doesn't specify `--role`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub default_role: String,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_role: "guest".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    pub colored: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            colored: true,
        }
    }
}

impl GflowConfig {
    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: GflowConfig) {
        self.storage = other.storage;
        self.planner = other.planner;
        self.executor = other.executor;
        self.budget = other.budget;
        self.logging = other.logging;
    }

    /// Resolve `${VAR_NAME}` interpolation in string fields that plausibly
    /// carry environment-supplied values.
    pub fn resolve_env_vars(&mut self) {
        self.storage.graph_path = Self::expand_env_var(&self.storage.graph_path);
        self.storage.state_path = Self::expand_env_var(&self.storage.state_path);
    }

    fn expand_env_var(value: &str) -> String {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// Resolve `storage.graph_path` to an absolute path under `~/.gflow`.
    pub fn graph_path(&self) -> PathBuf {
        Self::resolve_under_home(&self.storage.graph_path)
    }

    /// Resolve `storage.state_path` to an absolute path under `~/.gflow`.
    pub fn state_path(&self) -> PathBuf {
        Self::resolve_under_home(&self.storage.state_path)
    }

    fn resolve_under_home(path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".gflow")
                .join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GflowConfig::default();
        assert_eq!(config.storage.graph_path, "graph");
        assert_eq!(config.executor.max_parallel, 3);
        assert_eq!(config.budget.default_role, "guest");
    }

    #[test]
    fn test_merge_config() {
        let mut base = GflowConfig::default();
        let mut override_config = GflowConfig::default();
        override_config.executor.max_parallel = 8;
        override_config.budget.default_role = "admin".to_string();

        base.merge(override_config);

        assert_eq!(base.executor.max_parallel, 8);
        assert_eq!(base.budget.default_role, "admin");
        assert_eq!(base.planner.max_tokens, 50_000);
    }

    #[test]
    fn test_env_var_expansion() {
        let mut config = GflowConfig::default();
        config.storage.graph_path = "${TEST_GFLOW_GRAPH_PATH}".to_string();

        std::env::set_var("TEST_GFLOW_GRAPH_PATH", "/tmp/gflow-graph");
        config.resolve_env_vars();

        assert_eq!(config.storage.graph_path, "/tmp/gflow-graph");
        std::env::remove_var("TEST_GFLOW_GRAPH_PATH");
    }

    #[test]
    fn test_graph_path_relative_resolves_under_home() {
        let config = GflowConfig::default();
        let path = config.graph_path();
        assert!(path.to_string_lossy().contains(".gflow"));
        assert!(path.to_string_lossy().ends_with("graph"));
    }

    #[test]
    fn test_graph_path_absolute_is_unchanged() {
        let mut config = GflowConfig::default();
        config.storage.graph_path = "/tmp/some-graph".to_string();
        assert_eq!(config.graph_path(), PathBuf::from("/tmp/some-graph"));
    }
}
