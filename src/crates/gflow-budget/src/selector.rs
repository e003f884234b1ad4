//! Capability-filtered, priority-scored model selection

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::ModelConfig;

/// Scoring priority for `select_model`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Speed,
    Cost,
    Quality,
    Balanced,
}

impl Priority {
    pub fn from_str(s: &str) -> Self {
        match s {
            "speed" => Self::Speed,
            "cost" => Self::Cost,
            "quality" => Self::Quality,
            _ => Self::Balanced,
        }
    }
}

fn score_model(model: &ModelConfig, priority: Priority) -> f64 {
    match priority {
        Priority::Speed => 1.0 / model.latency_ms as f64,
        Priority::Cost => 1.0 / model.cost_per_1k_tokens.max(f64::MIN_POSITIVE),
        Priority::Quality => model.cost_per_1k_tokens,
        Priority::Balanced => {
            let cost_score = 1.0 / model.cost_per_1k_tokens.max(f64::MIN_POSITIVE);
            let speed_score = 1.0 / model.latency_ms as f64;
            let quality_score = model.cost_per_1k_tokens / 10.0;
            (cost_score + speed_score + quality_score) / 3.0
        }
    }
}

const SAFE_FALLBACK_MODEL: &str = "claude-3-haiku";

/// Select the best model for `task_type`/`estimated_tokens` under `priority`,
/// widening to context-window-safe alternatives if the winner can't fit the
/// estimate within a 90% safety margin.
pub fn select_model(
    catalog: &HashMap<String, ModelConfig>,
    task_type: &str,
    estimated_tokens: u64,
    priority: Priority,
) -> String {
    let mut capable: Vec<&ModelConfig> = catalog
        .values()
        .filter(|m| m.has_capability(task_type))
        .collect();

    if capable.is_empty() {
        capable = catalog.values().filter(|m| m.has_capability("reasoning")).collect();
    }

    let Some(mut best) = capable
        .iter()
        .copied()
        .max_by(|a, b| score_model(a, priority).total_cmp(&score_model(b, priority)))
    else {
        warn!(task_type, "no capable models found, using safe fallback");
        return SAFE_FALLBACK_MODEL.to_string();
    };

    if estimated_tokens as f64 > best.context_window as f64 * 0.9 {
        let mut large_context: Vec<&ModelConfig> = capable
            .iter()
            .copied()
            .filter(|m| m.context_window as f64 > estimated_tokens as f64 * 1.1)
            .collect();
        large_context.sort_by(|a, b| a.cost_per_1k_tokens.total_cmp(&b.cost_per_1k_tokens));
        if let Some(cheapest) = large_context.first() {
            best = cheapest;
        }
    }

    debug!(model = %best.name, task_type, estimated_tokens, "selected model");
    best.name.clone()
}

/// Estimate tokens from task complexity, then derive a priority from latency/
/// cost constraints (or complexity for "high") and delegate to `select_model`.
pub fn select_for_task(
    catalog: &HashMap<String, ModelConfig>,
    task_type: &str,
    complexity: &str,
    max_latency_ms: Option<u32>,
    max_cost_usd: Option<f64>,
) -> String {
    let estimated_tokens = match complexity {
        "low" => 1000,
        "high" => 8000,
        _ => 3000,
    };

    let priority = if max_latency_ms.map_or(false, |l| l < 1000) {
        Priority::Speed
    } else if max_cost_usd.map_or(false, |c| c < 0.01) {
        Priority::Cost
    } else if complexity == "high" {
        Priority::Quality
    } else {
        Priority::Balanced
    };

    select_model(catalog, task_type, estimated_tokens, priority)
}
