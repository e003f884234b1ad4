//! Budget envelopes, per-task cost estimation and compliance checking

use serde::{Deserialize, Serialize};

use crate::model::ModelConfig;

/// Resource ceilings for a workflow, selected by the requesting user's role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConstraints {
    pub max_total_tokens: u64,
    pub max_total_cost_usd: f64,
    pub max_time_s: u64,
    pub max_parallel_tasks: usize,
    pub user_role: String,
}

impl BudgetConstraints {
    pub fn for_role(role: &str) -> Self {
        match role {
            "admin" => Self {
                max_total_tokens: 100_000,
                max_total_cost_usd: 10.0,
                max_time_s: 600,
                max_parallel_tasks: 10,
                user_role: "admin".to_string(),
            },
            "player" => Self {
                max_total_tokens: 20_000,
                max_total_cost_usd: 2.0,
                max_time_s: 120,
                max_parallel_tasks: 3,
                user_role: "player".to_string(),
            },
            _ => Self {
                max_total_tokens: 5_000,
                max_total_cost_usd: 0.5,
                max_time_s: 30,
                max_parallel_tasks: 1,
                user_role: "guest".to_string(),
            },
        }
    }
}

/// A single task's estimated model, token count, cost and time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCostEstimate {
    pub task_id: String,
    pub model: String,
    pub tokens: u64,
    pub cost_usd: f64,
    pub time_s: f64,
}

/// Aggregate cost/time/token estimate across a set of tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCostEstimate {
    pub total_cost_usd: f64,
    pub total_time_s: f64,
    pub total_tokens: u64,
    pub task_breakdown: Vec<TaskCostEstimate>,
}

/// Minimal view of a task needed for cost estimation; planner's
/// `WorkflowTask` converts into this at the boundary.
pub struct TaskCostInput {
    pub id: String,
    pub model: Option<String>,
    pub estimated_tokens: Option<u64>,
}

const UNKNOWN_MODEL_COST_PER_1K: f64 = 5.0;
const UNKNOWN_MODEL_TIME_S: f64 = 2.0;
const DEFAULT_MODEL: &str = "claude-3-haiku";
const DEFAULT_TOKENS: u64 = 1000;

pub fn estimate_workflow_cost(
    catalog: &std::collections::HashMap<String, ModelConfig>,
    tasks: &[TaskCostInput],
) -> WorkflowCostEstimate {
    let mut total_cost = 0.0;
    let mut total_time = 0.0;
    let mut total_tokens = 0u64;
    let mut task_breakdown = Vec::with_capacity(tasks.len());

    for task in tasks {
        let model_name = task.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let tokens = task.estimated_tokens.unwrap_or(DEFAULT_TOKENS);

        let (task_cost, task_time) = match catalog.get(&model_name) {
            Some(model) => (
                (tokens as f64 / 1000.0) * model.cost_per_1k_tokens,
                model.latency_ms as f64 / 1000.0,
            ),
            None => ((tokens as f64 / 1000.0) * UNKNOWN_MODEL_COST_PER_1K, UNKNOWN_MODEL_TIME_S),
        };

        total_cost += task_cost;
        total_time += task_time;
        total_tokens += tokens;

        task_breakdown.push(TaskCostEstimate {
            task_id: task.id.clone(),
            model: model_name,
            tokens,
            cost_usd: task_cost,
            time_s: task_time,
        });
    }

    WorkflowCostEstimate {
        total_cost_usd: (total_cost * 10_000.0).round() / 10_000.0,
        total_time_s: (total_time * 10.0).round() / 10.0,
        total_tokens,
        task_breakdown,
    }
}

/// Check `estimate` against `budget`, returning every violated limit.
pub fn check_budget_compliance(
    estimate: &WorkflowCostEstimate,
    budget: &BudgetConstraints,
) -> (bool, Vec<String>) {
    let mut violations = Vec::new();

    if estimate.total_tokens > budget.max_total_tokens {
        violations.push(format!(
            "Token limit exceeded: {}/{}",
            estimate.total_tokens, budget.max_total_tokens
        ));
    }
    if estimate.total_cost_usd > budget.max_total_cost_usd {
        violations.push(format!(
            "Cost limit exceeded: ${}/{}",
            estimate.total_cost_usd, budget.max_total_cost_usd
        ));
    }
    if estimate.total_time_s > budget.max_time_s as f64 {
        violations.push(format!(
            "Time limit exceeded: {}s/{}s",
            estimate.total_time_s, budget.max_time_s
        ));
    }
    if estimate.task_breakdown.len() > budget.max_parallel_tasks {
        violations.push(format!(
            "Too many parallel tasks: {}/{}",
            estimate.task_breakdown.len(),
            budget.max_parallel_tasks
        ));
    }

    (violations.is_empty(), violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_catalog;

    #[test]
    fn test_budget_for_role_falls_back_to_guest() {
        let budget = BudgetConstraints::for_role("nonexistent");
        assert_eq!(budget.user_role, "guest");
        assert_eq!(budget.max_parallel_tasks, 1);
    }

    #[test]
    fn test_estimate_unknown_model_uses_conservative_defaults() {
        let catalog = default_catalog();
        let tasks = vec![TaskCostInput {
            id: "t1".to_string(),
            model: Some("made-up-model".to_string()),
            estimated_tokens: Some(2000),
        }];

        let estimate = estimate_workflow_cost(&catalog, &tasks);
        assert_eq!(estimate.total_cost_usd, 10.0);
        assert_eq!(estimate.total_time_s, 2.0);
    }

    #[test]
    fn test_check_budget_compliance_reports_every_violation() {
        let budget = BudgetConstraints::for_role("guest");
        let estimate = WorkflowCostEstimate {
            total_cost_usd: 5.0,
            total_time_s: 100.0,
            total_tokens: 10_000,
            task_breakdown: vec![
                TaskCostEstimate {
                    task_id: "a".to_string(),
                    model: "gpt-4".to_string(),
                    tokens: 5000,
                    cost_usd: 2.5,
                    time_s: 50.0,
                },
                TaskCostEstimate {
                    task_id: "b".to_string(),
                    model: "gpt-4".to_string(),
                    tokens: 5000,
                    cost_usd: 2.5,
                    time_s: 50.0,
                },
            ],
        };

        let (compliant, violations) = check_budget_compliance(&estimate, &budget);
        assert!(!compliant);
        assert_eq!(violations.len(), 4);
    }
}
