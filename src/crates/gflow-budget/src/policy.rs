//! Plan-level budget enforcement: optimize-then-approve workflow

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::budget::{check_budget_compliance, estimate_workflow_cost, BudgetConstraints, TaskCostInput, WorkflowCostEstimate};
use crate::model::ModelConfig;

/// A task slice the budget optimizer can mutate in place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: String,
    pub task_type: String,
    pub model: String,
    pub estimated_tokens: u64,
    pub dependencies: Vec<String>,
}

fn type_weight(task_type: &str) -> i32 {
    match task_type {
        "reasoning" | "synthesis" => 3,
        "verification" => 2,
        "retrieval" | "computation" => 1,
        _ => 2,
    }
}

fn task_importance(task: &PlanTask, all_tasks: &[PlanTask]) -> i32 {
    let dependents = all_tasks
        .iter()
        .filter(|t| t.dependencies.contains(&task.id))
        .count() as i32;
    dependents + type_weight(&task.task_type)
}

fn cheaper_alternatives(
    catalog: &HashMap<String, ModelConfig>,
    current_model: &str,
    task_type: &str,
) -> Vec<String> {
    let current_cost = catalog
        .get(current_model)
        .map(|m| m.cost_per_1k_tokens)
        .unwrap_or(f64::INFINITY);

    let mut alternatives: Vec<&ModelConfig> = catalog
        .values()
        .filter(|m| m.cost_per_1k_tokens < current_cost && m.has_capability(task_type))
        .collect();
    alternatives.sort_by(|a, b| a.cost_per_1k_tokens.total_cmp(&b.cost_per_1k_tokens));
    alternatives.into_iter().map(|m| m.name.clone()).collect()
}

fn estimate(catalog: &HashMap<String, ModelConfig>, tasks: &[PlanTask]) -> WorkflowCostEstimate {
    let inputs: Vec<TaskCostInput> = tasks
        .iter()
        .map(|t| TaskCostInput {
            id: t.id.clone(),
            model: Some(t.model.clone()),
            estimated_tokens: Some(t.estimated_tokens),
        })
        .collect();
    estimate_workflow_cost(catalog, &inputs)
}

/// Downgrade models for the least important tasks first until the plan fits
/// `budget`'s cost ceiling, or no further downgrade is possible.
pub fn optimize_plan_models(
    catalog: &HashMap<String, ModelConfig>,
    tasks: &[PlanTask],
    budget: &BudgetConstraints,
) -> Vec<PlanTask> {
    let mut tasks = tasks.to_vec();

    if estimate(catalog, &tasks).total_cost_usd <= budget.max_total_cost_usd {
        return tasks;
    }

    let snapshot = tasks.clone();
    let mut order: Vec<usize> = (0..tasks.len()).collect();
    order.sort_by_key(|&i| task_importance(&snapshot[i], &snapshot));

    for idx in order {
        let task_type = tasks[idx].task_type.clone();
        let original_model = tasks[idx].model.clone();
        let alternatives = cheaper_alternatives(catalog, &original_model, &task_type);

        for alt in alternatives {
            tasks[idx].model = alt.clone();
            if estimate(catalog, &tasks).total_cost_usd <= budget.max_total_cost_usd {
                info!(task_id = %tasks[idx].id, from = %original_model, to = %alt, "optimized task model");
                break;
            }
            tasks[idx].model = original_model.clone();
        }

        if estimate(catalog, &tasks).total_cost_usd <= budget.max_total_cost_usd {
            break;
        }
    }

    tasks
}

/// Outcome of `enforce_plan`
#[derive(Debug, Clone, Serialize)]
pub struct PlanEnforcement {
    pub approved: bool,
    pub estimate: WorkflowCostEstimate,
    pub violations: Vec<String>,
    pub optimized_plan: Option<Vec<PlanTask>>,
    pub optimized_estimate: Option<WorkflowCostEstimate>,
    pub requires_approval: bool,
}

/// Check `tasks` against `role`'s budget; if non-compliant, attempt a
/// cost-downgrade optimization and re-check before giving up.
pub fn enforce_plan(
    catalog: &HashMap<String, ModelConfig>,
    plan_id: &str,
    tasks: &[PlanTask],
    role: &str,
) -> PlanEnforcement {
    let budget = BudgetConstraints::for_role(role);
    let plan_estimate = estimate(catalog, tasks);
    let (compliant, violations) = check_budget_compliance(&plan_estimate, &budget);

    if compliant {
        return PlanEnforcement {
            approved: true,
            estimate: plan_estimate,
            violations,
            optimized_plan: None,
            optimized_estimate: None,
            requires_approval: false,
        };
    }

    warn!(plan_id, ?violations, "plan violates budget, attempting optimization");
    let optimized_tasks = optimize_plan_models(catalog, tasks, &budget);
    let optimized_estimate = estimate(catalog, &optimized_tasks);
    let (optimized_compliant, _) = check_budget_compliance(&optimized_estimate, &budget);

    if optimized_compliant {
        info!(plan_id, "optimization brought plan within budget");
        PlanEnforcement {
            approved: true,
            estimate: plan_estimate,
            violations,
            optimized_plan: Some(optimized_tasks),
            optimized_estimate: Some(optimized_estimate),
            requires_approval: false,
        }
    } else {
        PlanEnforcement {
            approved: false,
            estimate: plan_estimate,
            violations,
            optimized_plan: Some(optimized_tasks),
            optimized_estimate: Some(optimized_estimate),
            requires_approval: true,
        }
    }
}

/// A checkpoint requiring human sign-off before a plan may proceed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalCheckpoint {
    pub checkpoint_id: String,
    pub plan_id: String,
    #[serde(rename = "type")]
    pub checkpoint_type: String,
    pub reason: String,
    pub estimate: WorkflowCostEstimate,
    pub created_at: chrono::DateTime<Utc>,
    pub status: String,
    pub approval_url: String,
}

pub fn create_approval_checkpoint(
    plan_id: &str,
    reason: impl Into<String>,
    estimate: WorkflowCostEstimate,
) -> ApprovalCheckpoint {
    let created_at = Utc::now();
    let checkpoint_id = format!(
        "approval:{plan_id}:{}:{}",
        created_at.timestamp(),
        uuid::Uuid::new_v4()
    );
    let approval_url = format!("/workflow/{plan_id}/approve?checkpoint={checkpoint_id}");

    ApprovalCheckpoint {
        checkpoint_id,
        plan_id: plan_id.to_string(),
        checkpoint_type: "budget_approval".to_string(),
        reason: reason.into(),
        estimate,
        created_at,
        status: "pending".to_string(),
        approval_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_catalog;

    fn expensive_plan() -> Vec<PlanTask> {
        vec![
            PlanTask {
                id: "t1".to_string(),
                task_type: "retrieval".to_string(),
                model: "gpt-4".to_string(),
                estimated_tokens: 2000,
                dependencies: vec![],
            },
            PlanTask {
                id: "t2".to_string(),
                task_type: "reasoning".to_string(),
                model: "gpt-4".to_string(),
                estimated_tokens: 2000,
                dependencies: vec!["t1".to_string()],
            },
        ]
    }

    #[test]
    fn test_optimize_plan_models_downgrades_least_important_first() {
        let catalog = default_catalog();
        let budget = BudgetConstraints::for_role("player");
        let original_cost = estimate(&catalog, &expensive_plan()).total_cost_usd;
        let optimized = optimize_plan_models(&catalog, &expensive_plan(), &budget);

        let final_estimate = estimate(&catalog, &optimized);
        assert!(final_estimate.total_cost_usd < original_cost);
        assert!(final_estimate.total_cost_usd <= budget.max_total_cost_usd);
    }

    #[test]
    fn test_enforce_plan_optimizes_noncompliant_plan() {
        let catalog = default_catalog();
        let result = enforce_plan(&catalog, "plan:1", &expensive_plan(), "guest");
        assert!(!result.violations.is_empty());
        assert!(result.optimized_plan.is_some());
    }

    #[test]
    fn test_enforce_plan_compliant_plan_needs_no_optimization() {
        let catalog = default_catalog();
        let cheap_plan = vec![PlanTask {
            id: "t1".to_string(),
            task_type: "computation".to_string(),
            model: "local".to_string(),
            estimated_tokens: 500,
            dependencies: vec![],
        }];

        let result = enforce_plan(&catalog, "plan:2", &cheap_plan, "admin");
        assert!(result.approved);
        assert!(result.optimized_plan.is_none());
    }

    #[test]
    fn test_create_approval_checkpoint_is_pending() {
        let estimate = WorkflowCostEstimate {
            total_cost_usd: 5.0,
            total_time_s: 10.0,
            total_tokens: 5000,
            task_breakdown: vec![],
        };
        let checkpoint = create_approval_checkpoint("plan:1", "exceeds budget", estimate);
        assert_eq!(checkpoint.status, "pending");
        assert_eq!(checkpoint.checkpoint_type, "budget_approval");
        assert!(checkpoint.checkpoint_id.starts_with("approval:plan:1:"));
        assert_eq!(
            checkpoint.approval_url,
            format!("/workflow/plan:1/approve?checkpoint={}", checkpoint.checkpoint_id)
        );
    }
}
