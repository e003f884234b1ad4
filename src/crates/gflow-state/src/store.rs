//! JSON-file-backed persistence for workflow state and task artifacts

use std::path::{Path, PathBuf};

use chrono::Utc;
use gflow_core::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::state::WorkflowState;

fn safe_name_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap())
}

/// Sanitize an arbitrary id for use as a path segment across operating
/// systems, replacing every disallowed character with `_`.
pub fn safe_name(s: &str) -> String {
    safe_name_pattern().replace_all(s, "_").to_string()
}

/// Summary row returned by `list_workflows`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub goal: String,
    pub status: String,
    pub started_at: chrono::DateTime<Utc>,
    pub completed_at: Option<chrono::DateTime<Utc>>,
    pub duration_s: Option<f64>,
    pub task_count: usize,
    pub artifact_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredArtifact {
    id: String,
    workflow_id: String,
    task_id: String,
    created_at: chrono::DateTime<Utc>,
    data: Value,
}

/// Persistent storage for workflow state and task artifacts, backed by a
/// directory of one JSON file per workflow plus a per-workflow artifacts
/// subdirectory.
pub struct WorkflowStateStore {
    storage_path: PathBuf,
    artifacts_path: PathBuf,
}

impl WorkflowStateStore {
    pub async fn open(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        tokio::fs::create_dir_all(&storage_path).await?;

        let artifacts_path = storage_path.join("artifacts");
        tokio::fs::create_dir_all(&artifacts_path).await?;

        info!(path = %storage_path.display(), "workflow state store initialized");

        Ok(Self { storage_path, artifacts_path })
    }

    fn state_file(&self, workflow_id: &str) -> PathBuf {
        self.storage_path.join(format!("{}.json", safe_name(workflow_id)))
    }

    pub async fn save_workflow_state(&self, state: &WorkflowState) -> bool {
        match write_json(&self.state_file(&state.id), state).await {
            Ok(()) => {
                debug!(workflow_id = %state.id, "saved workflow state");
                true
            }
            Err(err) => {
                warn!(workflow_id = %state.id, error = %err, "error saving workflow state");
                false
            }
        }
    }

    pub async fn get_workflow_state(&self, workflow_id: &str) -> Option<WorkflowState> {
        let path = self.state_file(workflow_id);
        match load_json::<WorkflowState>(&path).await {
            Ok(Some(state)) => {
                debug!(workflow_id, "loaded workflow state");
                Some(state)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(workflow_id, error = %err, "error loading workflow state");
                None
            }
        }
    }

    pub async fn list_workflows(&self, status_filter: Option<&str>) -> Vec<WorkflowSummary> {
        let mut workflows = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.storage_path).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "error listing workflows");
                return Vec::new();
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match load_json::<WorkflowState>(&path).await {
                Ok(Some(state)) => {
                    if let Some(filter) = status_filter {
                        if state.status.as_str() != filter {
                            continue;
                        }
                    }

                    workflows.push(WorkflowSummary {
                        id: state.id.clone(),
                        goal: state.goal.chars().take(100).collect(),
                        status: state.status.as_str().to_string(),
                        started_at: state.started_at,
                        completed_at: state.completed_at,
                        duration_s: state.duration_s(),
                        task_count: state.tasks.len(),
                        artifact_count: state.artifacts.len(),
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not read workflow state file");
                }
            }
        }

        workflows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        workflows
    }

    /// Save an artifact produced by `task_id` within `workflow_id`. Returns
    /// the artifact's logical id (distinct from the filesystem-safe name
    /// used for its filename) or an empty string on failure.
    pub async fn save_artifact(&self, workflow_id: &str, task_id: &str, artifact_data: Value) -> String {
        let artifact_id = format!("artifact:{workflow_id}:{task_id}:{}", Utc::now().timestamp_millis());

        let workflow_dir = self.artifacts_path.join(safe_name(workflow_id));
        if let Err(err) = tokio::fs::create_dir_all(&workflow_dir).await {
            warn!(workflow_id, error = %err, "error creating artifacts directory");
            return String::new();
        }

        let artifact = StoredArtifact {
            id: artifact_id.clone(),
            workflow_id: workflow_id.to_string(),
            task_id: task_id.to_string(),
            created_at: Utc::now(),
            data: artifact_data,
        };

        let artifact_file = workflow_dir.join(format!("{}.json", safe_name(&artifact_id)));
        match write_json(&artifact_file, &artifact).await {
            Ok(()) => {
                debug!(artifact_id = %artifact_id, workflow_id, "saved artifact");
                artifact_id
            }
            Err(err) => {
                warn!(workflow_id, error = %err, "error saving artifact");
                String::new()
            }
        }
    }

    /// Retrieve an artifact by id, searching every workflow's artifact
    /// subdirectory. This is a development-grade brute-force search: it
    /// does not index by id, so lookup cost is linear in artifact count.
    pub async fn get_artifact(&self, artifact_id: &str) -> Option<Value> {
        let safe_artifact = safe_name(artifact_id);
        let target_name = format!("{safe_artifact}.json");

        let mut workflow_dirs = tokio::fs::read_dir(&self.artifacts_path).await.ok()?;
        while let Ok(Some(workflow_dir)) = workflow_dirs.next_entry().await {
            if !workflow_dir.path().is_dir() {
                continue;
            }

            let candidate = workflow_dir.path().join(&target_name);
            if candidate.exists() {
                match load_json::<StoredArtifact>(&candidate).await {
                    Ok(Some(artifact)) => return serde_json::to_value(artifact).ok(),
                    _ => continue,
                }
            }
        }

        None
    }

    pub async fn delete_workflow(&self, workflow_id: &str) -> bool {
        let state_file = self.state_file(workflow_id);
        if state_file.exists() {
            if let Err(err) = tokio::fs::remove_file(&state_file).await {
                warn!(workflow_id, error = %err, "error deleting workflow state file");
                return false;
            }
        }

        let artifacts_dir = self.artifacts_path.join(safe_name(workflow_id));
        if artifacts_dir.exists() {
            if let Err(err) = tokio::fs::remove_dir_all(&artifacts_dir).await {
                warn!(workflow_id, error = %err, "error deleting workflow artifacts");
                return false;
            }
        }

        info!(workflow_id, "deleted workflow and artifacts");
        true
    }

    pub async fn get_workflow_artifacts(&self, workflow_id: &str) -> Vec<Value> {
        let artifacts_dir = self.artifacts_path.join(safe_name(workflow_id));
        let mut artifacts = Vec::new();

        let Ok(mut entries) = tokio::fs::read_dir(&artifacts_dir).await else {
            return artifacts;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(Some(artifact)) = load_json::<StoredArtifact>(&entry.path()).await {
                if let Ok(value) = serde_json::to_value(&artifact) {
                    artifacts.push((artifact.created_at, value));
                }
            }
        }

        artifacts.sort_by_key(|(created_at, _)| *created_at);
        artifacts.into_iter().map(|(_, v)| v).collect()
    }
}

async fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }
    let bytes = tokio::fs::read(path).await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{TaskState, TaskStatus, WorkflowStatus};
    use gflow_planner::{PlanConstraints, WorkflowPlan};

    fn minimal_plan() -> WorkflowPlan {
        WorkflowPlan {
            id: "plan:1".to_string(),
            goal: "test".to_string(),
            procedure_id: None,
            tasks: vec![],
            edges: vec![],
            total_estimated_tokens: 0,
            total_estimated_time_s: 0,
            checkpoints: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_safe_name_replaces_disallowed_characters() {
        assert_eq!(safe_name("workflow/../etc:passwd"), "workflow___etc_passwd");
        assert_eq!(safe_name("plain-ID.123"), "plain-ID.123");
    }

    #[tokio::test]
    async fn test_save_and_get_workflow_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStateStore::open(dir.path()).await.unwrap();

        let mut state = WorkflowState::new("wf:1", "brew a potion", minimal_plan());
        state.tasks.insert("t1".to_string(), TaskState::new("t1", vec![]));

        assert!(store.save_workflow_state(&state).await);
        let loaded = store.get_workflow_state("wf:1").await.unwrap();
        assert_eq!(loaded.goal, "brew a potion");
        assert_eq!(loaded.tasks.len(), 1);
        assert!(loaded.plan.is_some());
    }

    #[tokio::test]
    async fn test_get_workflow_state_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStateStore::open(dir.path()).await.unwrap();
        assert!(store.get_workflow_state("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_list_workflows_filters_by_status_and_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStateStore::open(dir.path()).await.unwrap();

        let mut older = WorkflowState::new("wf:old", "goal a", minimal_plan());
        older.status = WorkflowStatus::Completed;
        older.started_at = Utc::now() - chrono::Duration::seconds(100);

        let mut newer = WorkflowState::new("wf:new", "goal b", minimal_plan());
        newer.status = WorkflowStatus::Running;

        store.save_workflow_state(&older).await;
        store.save_workflow_state(&newer).await;

        let all = store.list_workflows(None).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "wf:new");

        let running_only = store.list_workflows(Some("running")).await;
        assert_eq!(running_only.len(), 1);
        assert_eq!(running_only[0].id, "wf:new");
    }

    #[tokio::test]
    async fn test_save_and_get_artifact_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStateStore::open(dir.path()).await.unwrap();

        let artifact_id = store
            .save_artifact("wf:1", "t1", serde_json::json!({"result": "success"}))
            .await;
        assert!(!artifact_id.is_empty());

        let fetched = store.get_artifact(&artifact_id).await;
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_get_workflow_artifacts_sorted_by_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStateStore::open(dir.path()).await.unwrap();

        store.save_artifact("wf:1", "t1", serde_json::json!({"n": 1})).await;
        store.save_artifact("wf:1", "t2", serde_json::json!({"n": 2})).await;

        let artifacts = store.get_workflow_artifacts("wf:1").await;
        assert_eq!(artifacts.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_workflow_removes_state_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkflowStateStore::open(dir.path()).await.unwrap();

        let state = WorkflowState::new("wf:del", "goal", minimal_plan());
        store.save_workflow_state(&state).await;
        store.save_artifact("wf:del", "t1", serde_json::json!({})).await;

        assert!(store.delete_workflow("wf:del").await);
        assert!(store.get_workflow_state("wf:del").await.is_none());
        assert!(store.get_workflow_artifacts("wf:del").await.is_empty());
    }
}
