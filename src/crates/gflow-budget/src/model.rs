//! Model catalog: cost, latency, context window and capability metadata
//!
//! The default catalog mirrors published per-1k-token pricing at the time
//! this port was authored, so cost estimates stay stable across runs without
//! a live pricing lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single model's cost/performance/capability profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub provider: String,
    pub cost_per_1k_tokens: f64,
    pub latency_ms: u32,
    pub context_window: u32,
    pub capabilities: Vec<String>,
}

impl ModelConfig {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// The built-in model catalog, keyed by model name
pub fn default_catalog() -> HashMap<String, ModelConfig> {
    let entries = [
        ModelConfig {
            name: "claude-3-haiku".to_string(),
            provider: "anthropic".to_string(),
            cost_per_1k_tokens: 0.25,
            latency_ms: 800,
            context_window: 200_000,
            capabilities: vec!["reasoning".into(), "retrieval".into(), "verification".into()],
        },
        ModelConfig {
            name: "claude-3-sonnet".to_string(),
            provider: "anthropic".to_string(),
            cost_per_1k_tokens: 3.0,
            latency_ms: 1500,
            context_window: 200_000,
            capabilities: vec!["reasoning".into(), "synthesis".into(), "complex_analysis".into()],
        },
        ModelConfig {
            name: "gpt-3.5-turbo".to_string(),
            provider: "openai".to_string(),
            cost_per_1k_tokens: 1.0,
            latency_ms: 1000,
            context_window: 16_000,
            capabilities: vec!["reasoning".into(), "retrieval".into(), "computation".into()],
        },
        ModelConfig {
            name: "gpt-4".to_string(),
            provider: "openai".to_string(),
            cost_per_1k_tokens: 30.0,
            latency_ms: 3000,
            context_window: 8_000,
            capabilities: vec![
                "complex_reasoning".into(),
                "synthesis".into(),
                "verification".into(),
            ],
        },
        ModelConfig {
            name: "local".to_string(),
            provider: "local".to_string(),
            cost_per_1k_tokens: 0.0,
            latency_ms: 100,
            context_window: 4_000,
            capabilities: vec!["computation".into(), "formatting".into()],
        },
    ];

    entries.into_iter().map(|m| (m.name.clone(), m)).collect()
}

/// Overrides loaded from a `config/budget_policies.yaml`-style document;
/// unrecognized model names are added, recognized ones have only the
/// present fields overridden.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelOverride {
    pub cost_per_1k_tokens: Option<f64>,
    pub latency_ms: Option<u32>,
    pub context_window: Option<u32>,
    pub capabilities: Option<Vec<String>>,
}

pub fn apply_overrides(catalog: &mut HashMap<String, ModelConfig>, overrides: HashMap<String, ModelOverride>) {
    for (name, over) in overrides {
        if let Some(existing) = catalog.get_mut(&name) {
            if let Some(cost) = over.cost_per_1k_tokens {
                existing.cost_per_1k_tokens = cost;
            }
            if let Some(latency) = over.latency_ms {
                existing.latency_ms = latency;
            }
            if let Some(ctx) = over.context_window {
                existing.context_window = ctx;
            }
            if let Some(caps) = over.capabilities {
                existing.capabilities = caps;
            }
        } else {
            catalog.insert(
                name.clone(),
                ModelConfig {
                    name,
                    provider: "custom".to_string(),
                    cost_per_1k_tokens: over.cost_per_1k_tokens.unwrap_or(1.0),
                    latency_ms: over.latency_ms.unwrap_or(1000),
                    context_window: over.context_window.unwrap_or(8_000),
                    capabilities: over.capabilities.unwrap_or_default(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_five_models() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.contains_key("claude-3-haiku"));
        assert!(catalog.contains_key("local"));
    }

    #[test]
    fn test_override_updates_existing_model_cost_only() {
        let mut catalog = default_catalog();
        let mut overrides = HashMap::new();
        overrides.insert(
            "local".to_string(),
            ModelOverride {
                cost_per_1k_tokens: Some(0.01),
                latency_ms: None,
                context_window: None,
                capabilities: None,
            },
        );

        apply_overrides(&mut catalog, overrides);
        let local = &catalog["local"];
        assert_eq!(local.cost_per_1k_tokens, 0.01);
        assert_eq!(local.latency_ms, 100);
    }

    #[test]
    fn test_override_adds_unknown_model() {
        let mut catalog = default_catalog();
        let mut overrides = HashMap::new();
        overrides.insert(
            "mistral-large".to_string(),
            ModelOverride {
                cost_per_1k_tokens: Some(2.0),
                latency_ms: Some(900),
                context_window: Some(32_000),
                capabilities: Some(vec!["reasoning".into()]),
            },
        );

        apply_overrides(&mut catalog, overrides);
        assert!(catalog.contains_key("mistral-large"));
        assert_eq!(catalog.len(), 6);
    }
}
