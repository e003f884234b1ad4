//! Plan validation: cycle detection and budget/dependency sanity checks

use std::collections::{HashMap, HashSet};

use crate::plan::{WorkflowPlan, MAX_TASKS};

/// Detect a cycle across the union of `plan.edges` and every task's
/// `dependencies` list. The narrower original only walked `edges`; this
/// port's contract treats a cyclic `dependencies` declaration as equally
/// invalid, since both encode the same "must run after" relationship.
fn has_cycle(plan: &WorkflowPlan) -> bool {
    let mut graph: HashMap<&str, Vec<&str>> = plan.tasks.iter().map(|t| (t.id.as_str(), Vec::new())).collect();

    for (source, target) in &plan.edges {
        if let Some(adj) = graph.get_mut(source.as_str()) {
            if graph.contains_key(target.as_str()) {
                adj.push(target.as_str());
            }
        }
    }
    for task in &plan.tasks {
        for dep in &task.dependencies {
            if graph.contains_key(dep.as_str()) {
                graph.get_mut(dep.as_str()).unwrap().push(task.id.as_str());
            }
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut rec_stack: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
    ) -> bool {
        visited.insert(node);
        rec_stack.insert(node);

        if let Some(neighbors) = graph.get(node) {
            for &neighbor in neighbors {
                if !visited.contains(neighbor) {
                    if visit(neighbor, graph, visited, rec_stack) {
                        return true;
                    }
                } else if rec_stack.contains(neighbor) {
                    return true;
                }
            }
        }

        rec_stack.remove(node);
        false
    }

    for &task_id in graph.keys().collect::<Vec<_>>() {
        if !visited.contains(task_id) && visit(task_id, &graph, &mut visited, &mut rec_stack) {
            return true;
        }
    }

    false
}

/// Validate `plan` for cycles, task-count/budget ceilings, and dangling
/// dependency references. Returns every violation found, not just the first.
pub fn validate_plan(plan: &WorkflowPlan, max_tokens: u64, max_time_s: u64) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    if has_cycle(plan) {
        errors.push("Plan contains dependency cycles".to_string());
    }

    if plan.tasks.len() > MAX_TASKS {
        errors.push(format!("Plan has {} tasks, max allowed is {MAX_TASKS}", plan.tasks.len()));
    }

    if plan.total_estimated_tokens > max_tokens {
        errors.push(format!(
            "Plan exceeds token budget: {}/{max_tokens}",
            plan.total_estimated_tokens
        ));
    }

    if plan.total_estimated_time_s > max_time_s {
        errors.push(format!(
            "Plan exceeds time budget: {}/{max_time_s}",
            plan.total_estimated_time_s
        ));
    }

    let task_ids: HashSet<&str> = plan.tasks.iter().map(|t| t.id.as_str()).collect();
    for task in &plan.tasks {
        for dep in &task.dependencies {
            if !task_ids.contains(dep.as_str()) {
                errors.push(format!("Task {} depends on non-existent task {dep}", task.id));
            }
        }
    }

    (errors.is_empty(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::WorkflowTask;
    use serde_json::json;

    fn task(id: &str, dependencies: Vec<&str>) -> WorkflowTask {
        WorkflowTask {
            id: id.to_string(),
            task_type: "reasoning".to_string(),
            name: id.to_string(),
            description: String::new(),
            dependencies: dependencies.into_iter().map(String::from).collect(),
            tool: "llm".to_string(),
            model: "claude-3-haiku".to_string(),
            prompt: String::new(),
            parameters: json!({}),
            estimated_tokens: 100,
            estimated_time_s: 1,
            requires_approval: false,
            checkpoint: false,
        }
    }

    fn plan_with(tasks: Vec<WorkflowTask>, edges: Vec<(&str, &str)>) -> WorkflowPlan {
        WorkflowPlan {
            id: "plan:test".to_string(),
            goal: "test".to_string(),
            procedure_id: None,
            tasks,
            edges: edges.into_iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
            total_estimated_tokens: 300,
            total_estimated_time_s: 3,
            checkpoints: vec![],
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_valid_acyclic_plan_has_no_errors() {
        let plan = plan_with(vec![task("a", vec![]), task("b", vec!["a"])], vec![("a", "b")]);
        let (valid, errors) = validate_plan(&plan, 10_000, 100);
        assert!(valid);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_cycle_via_edges_is_detected() {
        let plan = plan_with(vec![task("a", vec![]), task("b", vec![])], vec![("a", "b"), ("b", "a")]);
        let (valid, errors) = validate_plan(&plan, 10_000, 100);
        assert!(!valid);
        assert!(errors.iter().any(|e| e.contains("cycles")));
    }

    #[test]
    fn test_cycle_via_dependencies_only_is_also_detected() {
        // No explicit edges, but `dependencies` alone describe a cycle.
        let plan = plan_with(vec![task("a", vec!["b"]), task("b", vec!["a"])], vec![]);
        let (valid, errors) = validate_plan(&plan, 10_000, 100);
        assert!(!valid);
        assert!(errors.iter().any(|e| e.contains("cycles")));
    }

    #[test]
    fn test_dangling_dependency_is_reported() {
        let plan = plan_with(vec![task("a", vec!["ghost"])], vec![]);
        let (valid, errors) = validate_plan(&plan, 10_000, 100);
        assert!(!valid);
        assert!(errors.iter().any(|e| e.contains("non-existent task")));
    }

    #[test]
    fn test_token_budget_violation_is_reported() {
        let plan = plan_with(vec![task("a", vec![])], vec![]);
        let (valid, errors) = validate_plan(&plan, 10, 100);
        assert!(!valid);
        assert!(errors.iter().any(|e| e.contains("token budget")));
    }
}
