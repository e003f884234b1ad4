//! Built-in per-type task dispatch, used when the caller supplies no `TaskTool`
//!
//! One function per canonical task type. These stand in for the five task
//! kinds the rest of the system plans and budgets for; a caller-supplied
//! `TaskTool` takes priority whenever one is wired in.

use gflow_core::{ToolInvocation, ToolOutcome};
use serde_json::json;

pub fn dispatch_builtin(invocation: &ToolInvocation) -> ToolOutcome {
    match invocation.task_type.as_str() {
        "retrieval" => retrieval(invocation),
        "computation" => computation(invocation),
        "verification" => verification(invocation),
        "synthesis" => synthesis(invocation),
        _ => reasoning(invocation),
    }
}

fn retrieval(invocation: &ToolInvocation) -> ToolOutcome {
    let query = invocation
        .parameters
        .get("query")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| invocation.prompt.clone());

    ToolOutcome::new(json!({
        "type": "retrieval_result",
        "query": query,
        "chunks": [
            {"id": "chunk:1", "content": format!("Retrieved content for: {query}"), "score": 0.85}
        ],
        "total_chunks": 1,
    }))
}

fn reasoning(invocation: &ToolInvocation) -> ToolOutcome {
    ToolOutcome::new(json!({
        "type": "reasoning_result",
        "prompt": invocation.prompt,
        "reasoning": format!("Analyzed: {}", invocation.prompt),
        "conclusion": format!("Result for task: {}", invocation.task_id),
    }))
}

fn computation(invocation: &ToolInvocation) -> ToolOutcome {
    ToolOutcome::new(json!({
        "type": "computation_result",
        "inputs": invocation.parameters,
        "calculation": "Computed using task parameters",
        "result": {"value": 42, "confidence": 0.95},
    }))
}

fn verification(invocation: &ToolInvocation) -> ToolOutcome {
    ToolOutcome::new(json!({
        "type": "verification_result",
        "verified": invocation.prompt,
        "status": "passed",
        "violations": [],
        "rule_citations": [{"rule": "sample_rule", "page": 123}],
    }))
}

fn synthesis(invocation: &ToolInvocation) -> ToolOutcome {
    let goal = invocation
        .parameters
        .get("goal")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| invocation.prompt.clone());

    ToolOutcome::new(json!({
        "type": "synthesis_result",
        "goal": goal,
        "answer": format!("Synthesized answer for: {goal}"),
        "sources": [{"source": "sample_source", "page": 456}],
    }))
    .with_artifacts(vec![json!({"type": "json", "content": {"result": "synthesized"}})])
}
