//! First-time setup: home directory creation and default configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{info, warn};

pub const CONFIG_DIR: &str = ".gflow";
pub const CONFIG_FILE: &str = "gflow.toml";

/// `~/.gflow`
pub fn get_gflow_home() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR))
        .ok_or_else(|| anyhow!("could not determine home directory"))
}

pub fn get_user_config_path() -> Result<PathBuf> {
    Ok(get_gflow_home()?.join(CONFIG_FILE))
}

/// True once `~/.gflow/gflow.toml` exists.
pub fn is_initialized() -> bool {
    get_user_config_path().map(|p| p.exists()).unwrap_or(false)
}

/// Create `~/.gflow` and a default `gflow.toml` inside it.
///
/// Graph/workflow storage subdirectories are created lazily by
/// `GraphStore::open`/`WorkflowStateStore::open` on first use, so this only
/// has to lay down the config file.
pub fn initialize(force: bool) -> Result<()> {
    let home = get_gflow_home()?;
    info!(path = %home.display(), "initializing gflow home");

    if !home.exists() {
        fs::create_dir_all(&home).map_err(|e| anyhow!("failed to create directory: {e}"))?;
        info!(path = %home.display(), "created gflow home directory");
    } else {
        info!(path = %home.display(), "gflow home directory already exists");
    }

    let config_path = home.join(CONFIG_FILE);
    if !config_path.exists() || force {
        create_default_config(&config_path)?;
        info!(path = %config_path.display(), "created default configuration");
    } else {
        warn!(path = %config_path.display(), "configuration already exists (use --force to overwrite)");
    }

    Ok(())
}

fn create_default_config(path: &Path) -> Result<()> {
    let default_config = r#"# gflow configuration
#
# User-level settings. Project-specific overrides go in ./.gflow/gflow.toml

[storage]
# Graph store directory (relative to ~/.gflow unless absolute)
graph_path = "graph"
# Workflow state store directory (relative to ~/.gflow unless absolute)
state_path = "workflows"

[planner]
max_tokens = 50000
max_time_s = 300

[executor]
max_parallel = 3
max_attempts = 3
base_delay_s = 1.0

[budget]
# "admin", "player" or "guest"
default_role = "guest"

[logging]
level = "info"
colored = true
"#;

    fs::write(path, default_config).map_err(|e| anyhow!("failed to write configuration: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_gflow_home_contains_config_dir() {
        let home = get_gflow_home().unwrap();
        assert!(home.to_string_lossy().contains(CONFIG_DIR));
    }

    #[test]
    fn test_create_default_config_writes_all_sections() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        create_default_config(&config_path).unwrap();
        let content = fs::read_to_string(&config_path).unwrap();

        assert!(content.contains("[storage]"));
        assert!(content.contains("[planner]"));
        assert!(content.contains("[executor]"));
        assert!(content.contains("[budget]"));
        assert!(content.contains("[logging]"));
    }
}
