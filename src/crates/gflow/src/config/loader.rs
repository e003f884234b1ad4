//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.gflow/gflow.toml
//! 3. Project-level config: ./.gflow/gflow.toml
//!
//! Later configs override earlier ones.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use super::schema::GflowConfig;

pub struct ConfigLoader {
    user_config_path: PathBuf,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: Self::user_config_path(),
            project_config_path: Self::project_config_path(),
        }
    }

    fn user_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gflow")
            .join("gflow.toml")
    }

    fn project_config_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".gflow")
            .join("gflow.toml")
    }

    /// Load configuration from both locations with project taking precedence.
    pub async fn load(&self) -> Result<GflowConfig> {
        let mut config = GflowConfig::default();
        info!("loading gflow configuration with defaults");

        match self.load_from_path(&self.user_config_path).await {
            Ok(user_config) => {
                debug!(path = %self.user_config_path.display(), "loaded user-level config");
                config.merge(user_config);
            }
            Err(e) => {
                debug!(path = %self.user_config_path.display(), error = %e, "user-level config not found, using defaults");
            }
        }

        match self.load_from_path(&self.project_config_path).await {
            Ok(project_config) => {
                debug!(path = %self.project_config_path.display(), "loaded project-level config");
                config.merge(project_config);
            }
            Err(e) => {
                debug!(path = %self.project_config_path.display(), error = %e, "project-level config not found");
            }
        }

        config.resolve_env_vars();
        Ok(config)
    }

    async fn load_from_path(&self, path: &PathBuf) -> Result<GflowConfig> {
        if !path.exists() {
            return Err(anyhow!("config file not found: {}", path.display()));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("failed to read config: {e}"))?;

        toml::from_str(&content).map_err(|e| anyhow!("failed to parse config: {e}"))
    }

    pub fn user_config_path_ref(&self) -> &PathBuf {
        &self.user_config_path
    }

    pub fn project_config_path_ref(&self) -> &PathBuf {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
