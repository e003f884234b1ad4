//! Bounded-parallel DAG executor: scheduling, retries, blocked-successor
//! propagation, durable state and resume.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use gflow_core::{GflowError, Result, TaskTool, ToolInvocation};
use gflow_planner::{WorkflowPlan, WorkflowTask};
use gflow_state::{TaskState, TaskStatus, WorkflowState, WorkflowStateStore, WorkflowStatus};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::dispatch_builtin;
use crate::retry::RetryPolicy;

/// Cooperative cancellation handle shared between a caller and an in-flight
/// `run_plan`/`resume_workflow` call. Cancelling transitions every
/// non-terminal task to `blocked`; terminal statuses are never reverted.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum TaskEvent {
    Retrying { retries: u32 },
    Succeeded { output: Value, artifacts: Vec<Value> },
    Failed { error: String, retries: u32 },
}

/// Executes workflow plans with DAG dependencies, bounded parallelism,
/// retries, and durable state tracking.
pub struct WorkflowExecutor {
    state_store: Arc<WorkflowStateStore>,
    max_parallel: usize,
    default_retry: RetryPolicy,
}

impl WorkflowExecutor {
    pub fn new(state_store: Arc<WorkflowStateStore>, max_parallel: usize) -> Self {
        Self {
            state_store,
            max_parallel: max_parallel.max(1),
            default_retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Execute `plan` to completion, optionally routing every task through a
    /// caller-supplied `TaskTool`. Falls back to the built-in per-type
    /// dispatcher when `tool` is `None`.
    pub async fn run_plan(&self, plan: WorkflowPlan, tool: Option<Arc<dyn TaskTool>>) -> WorkflowState {
        self.run_plan_cancellable(plan, tool, CancelToken::new()).await
    }

    pub async fn run_plan_cancellable(
        &self,
        plan: WorkflowPlan,
        tool: Option<Arc<dyn TaskTool>>,
        cancel: CancelToken,
    ) -> WorkflowState {
        let workflow_id = format!("wf:{}", Uuid::new_v4().simple());
        info!(workflow_id = %workflow_id, goal = %plan.goal, "starting workflow execution");

        let mut state = WorkflowState::new(workflow_id.clone(), plan.goal.clone(), plan.clone());
        for task in &plan.tasks {
            state
                .tasks
                .insert(task.id.clone(), TaskState::new(task.id.clone(), task.dependencies.clone()));
        }
        self.state_store.save_workflow_state(&state).await;

        self.execute_dag(&mut state, &plan.tasks, tool, cancel).await;

        let all_succeeded = state.tasks.values().all(|t| t.status == TaskStatus::Succeeded);
        state.status = if all_succeeded { WorkflowStatus::Completed } else { WorkflowStatus::Failed };
        state.completed_at = Some(Utc::now());
        self.state_store.save_workflow_state(&state).await;

        info!(workflow_id = %workflow_id, status = %state.status, "workflow execution finished");
        state
    }

    /// Resume a previously persisted workflow: every `failed`/`blocked` task
    /// resets to `pending` (retries cleared) and re-runs; tasks already
    /// `succeeded` are left untouched (at-most-once on success).
    pub async fn resume_workflow(&self, workflow_id: &str, tool: Option<Arc<dyn TaskTool>>) -> Result<WorkflowState> {
        self.resume_workflow_cancellable(workflow_id, tool, CancelToken::new()).await
    }

    pub async fn resume_workflow_cancellable(
        &self,
        workflow_id: &str,
        tool: Option<Arc<dyn TaskTool>>,
        cancel: CancelToken,
    ) -> Result<WorkflowState> {
        let mut state = self
            .state_store
            .get_workflow_state(workflow_id)
            .await
            .ok_or_else(|| GflowError::not_found(format!("workflow {workflow_id}")))?;

        let plan = state
            .plan
            .clone()
            .ok_or_else(|| GflowError::validation("workflow has no persisted plan to resume from"))?;

        let mut reset_any = false;
        for task_state in state.tasks.values_mut() {
            if matches!(task_state.status, TaskStatus::Failed | TaskStatus::Blocked) {
                task_state.status = TaskStatus::Pending;
                task_state.retries = 0;
                task_state.error = None;
                reset_any = true;
            }
        }

        if !reset_any {
            info!(workflow_id, "no failed or blocked tasks found, nothing to resume");
            return Ok(state);
        }

        self.state_store.save_workflow_state(&state).await;

        self.execute_dag(&mut state, &plan.tasks, tool, cancel).await;

        let all_succeeded = state.tasks.values().all(|t| t.status == TaskStatus::Succeeded);
        state.status = if all_succeeded { WorkflowStatus::Completed } else { WorkflowStatus::PartialFailure };
        state.resumed_at = Some(Utc::now());
        self.state_store.save_workflow_state(&state).await;

        Ok(state)
    }

    async fn execute_dag(
        &self,
        state: &mut WorkflowState,
        tasks: &[WorkflowTask],
        tool: Option<Arc<dyn TaskTool>>,
        cancel: CancelToken,
    ) {
        let task_by_id: HashMap<&str, &WorkflowTask> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut running: HashMap<String, JoinHandle<()>> = HashMap::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, TaskEvent)>();

        loop {
            if cancel.is_cancelled() {
                for (_, handle) in running.drain() {
                    handle.abort();
                }
                self.block_non_terminal(state, "workflow cancelled");
                self.state_store.save_workflow_state(state).await;
                break;
            }

            loop {
                if running.len() >= self.max_parallel {
                    break;
                }
                let Some(task_id) = self.find_next_ready(state, tasks, &running) else {
                    break;
                };
                let task = task_by_id[task_id.as_str()];

                let task_state = state.tasks.get_mut(&task_id).unwrap();
                task_state.status = TaskStatus::Running;
                task_state.started_at = Some(Utc::now());
                self.state_store.save_workflow_state(state).await;

                let retry_policy = self.default_retry;
                let tool = tool.clone();
                let owned_task = task.clone();
                let tx = tx.clone();

                let handle = tokio::spawn(async move {
                    run_task_with_retries(owned_task, tool, retry_policy, tx).await;
                });
                running.insert(task_id, handle);
            }

            if running.is_empty() {
                break;
            }

            let Some((task_id, event)) = rx.recv().await else { break };
            self.apply_event(state, &task_id, event, &mut running).await;

            while let Ok((task_id, event)) = rx.try_recv() {
                self.apply_event(state, &task_id, event, &mut running).await;
            }
        }
    }

    fn find_next_ready(
        &self,
        state: &WorkflowState,
        tasks: &[WorkflowTask],
        running: &HashMap<String, JoinHandle<()>>,
    ) -> Option<String> {
        for task in tasks {
            let task_state = &state.tasks[&task.id];
            if task_state.status != TaskStatus::Pending || running.contains_key(&task.id) {
                continue;
            }
            let deps_satisfied = task
                .dependencies
                .iter()
                .all(|dep| state.tasks.get(dep).is_some_and(|d| d.status == TaskStatus::Succeeded));
            if deps_satisfied {
                return Some(task.id.clone());
            }
        }
        None
    }

    async fn apply_event(
        &self,
        state: &mut WorkflowState,
        task_id: &str,
        event: TaskEvent,
        running: &mut HashMap<String, JoinHandle<()>>,
    ) {
        match event {
            TaskEvent::Retrying { retries } => {
                if let Some(task_state) = state.tasks.get_mut(task_id) {
                    task_state.retries = retries;
                }
                self.state_store.save_workflow_state(state).await;
            }
            TaskEvent::Succeeded { output, artifacts } => {
                running.remove(task_id);
                let completed_at = Utc::now();
                if let Some(task_state) = state.tasks.get_mut(task_id) {
                    task_state.status = TaskStatus::Succeeded;
                    task_state.completed_at = Some(completed_at);
                    task_state.output = Some(output);
                    task_state.artifacts = artifacts.clone();
                }
                for artifact in artifacts {
                    state.artifacts.push(stamp_artifact(task_id, artifact, completed_at));
                }
                info!(task_id, "task completed successfully");
                self.state_store.save_workflow_state(state).await;
            }
            TaskEvent::Failed { error, retries } => {
                running.remove(task_id);
                if let Some(task_state) = state.tasks.get_mut(task_id) {
                    task_state.status = TaskStatus::Failed;
                    task_state.completed_at = Some(Utc::now());
                    task_state.retries = retries;
                    task_state.error = Some(error);
                }
                warn!(task_id, "task failed after exhausting retries");
                self.mark_dependents_blocked(state, task_id);
                self.state_store.save_workflow_state(state).await;
            }
        }
    }

    /// Transitively block every pending task that (directly or indirectly)
    /// depends on `failed_task_id`.
    fn mark_dependents_blocked(&self, state: &mut WorkflowState, failed_task_id: &str) {
        let mut queue = vec![failed_task_id.to_string()];
        while let Some(newly_blocked) = queue.pop() {
            let dependents: Vec<String> = state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending && t.dependencies.contains(&newly_blocked))
                .map(|t| t.id.clone())
                .collect();

            for dep_id in dependents {
                if let Some(task_state) = state.tasks.get_mut(&dep_id) {
                    task_state.status = TaskStatus::Blocked;
                    task_state.error = Some(format!("dependency {newly_blocked} failed"));
                    task_state.completed_at = Some(Utc::now());
                }
                warn!(task_id = %dep_id, dependency = %newly_blocked, "task blocked by failed dependency");
                queue.push(dep_id);
            }
        }
    }

    fn block_non_terminal(&self, state: &mut WorkflowState, reason: &str) {
        for task_state in state.tasks.values_mut() {
            if matches!(task_state.status, TaskStatus::Pending | TaskStatus::Running) {
                task_state.status = TaskStatus::Blocked;
                task_state.error = Some(reason.to_string());
                task_state.completed_at = Some(Utc::now());
            }
        }
    }
}

fn stamp_artifact(task_id: &str, artifact: Value, created_at: chrono::DateTime<Utc>) -> Value {
    serde_json::json!({
        "task_id": task_id,
        "artifact": artifact,
        "created_at": created_at,
    })
}

async fn run_task_with_retries(
    task: WorkflowTask,
    tool: Option<Arc<dyn TaskTool>>,
    retry_policy: RetryPolicy,
    tx: mpsc::UnboundedSender<(String, TaskEvent)>,
) {
    let invocation = ToolInvocation {
        task_id: task.id.clone(),
        task_type: task.task_type.clone(),
        tool: task.tool.clone(),
        model: task.model.clone(),
        prompt: task.prompt.clone(),
        parameters: task.parameters.clone(),
    };

    for attempt in 1..=retry_policy.max_attempts {
        let result = match &tool {
            Some(tool) => tool.invoke(&invocation).await,
            None => Ok(dispatch_builtin(&invocation)),
        };

        match result {
            Ok(outcome) => {
                let _ = tx.send((
                    task.id.clone(),
                    TaskEvent::Succeeded { output: outcome.output, artifacts: outcome.artifacts },
                ));
                return;
            }
            Err(err) => {
                if attempt < retry_policy.max_attempts {
                    let _ = tx.send((task.id.clone(), TaskEvent::Retrying { retries: attempt }));
                    let delay = retry_policy.delay_for_failed_attempt(attempt);
                    tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
                } else {
                    let _ = tx.send((
                        task.id.clone(),
                        TaskEvent::Failed { error: err.to_string(), retries: attempt - 1 },
                    ));
                    return;
                }
            }
        }
    }
}
