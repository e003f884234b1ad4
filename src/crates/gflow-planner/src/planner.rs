//! Graph-aware decomposition of a goal into an executable task DAG

use std::collections::HashSet;

use gflow_core::PropertyMap;
use gflow_graph::{EdgeKind, GraphStore, Node, NodeKind};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::plan::{PlanConstraints, WorkflowPlan, WorkflowTask};

struct ToolMapping {
    tool: &'static str,
    model: &'static str,
    base_tokens: u64,
}

fn tool_mapping(task_type: &str) -> ToolMapping {
    match task_type {
        "retrieval" => ToolMapping { tool: "retriever", model: "claude-3-haiku", base_tokens: 1000 },
        "reasoning" => ToolMapping { tool: "llm", model: "claude-3-sonnet", base_tokens: 2000 },
        "computation" => ToolMapping { tool: "calculator", model: "local", base_tokens: 100 },
        "verification" => ToolMapping { tool: "rules_checker", model: "claude-3-haiku", base_tokens: 500 },
        "synthesis" => ToolMapping { tool: "llm", model: "claude-3-sonnet", base_tokens: 3000 },
        _ => ToolMapping { tool: "llm", model: "claude-3-sonnet", base_tokens: 2000 },
    }
}

const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf", "cat /etc", "<script>", "</script>", "eval(", "system(", "exec(", "&&", "||",
];

/// Strip shell/script injection substrings from goal text before it is
/// embedded in a task's description or prompt.
pub fn sanitize(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in DANGEROUS_PATTERNS {
        out = out.replace(pattern, "[filtered]");
    }
    out
}

fn classify_step_type(step_name: &str, description: &str) -> &'static str {
    let content = format!("{step_name} {description}").to_lowercase();

    if ["gather", "collect", "find", "search", "look up"]
        .iter()
        .any(|w| content.contains(w))
    {
        "retrieval"
    } else if ["calculate", "compute", "roll", "dc", "bonus"]
        .iter()
        .any(|w| content.contains(w))
    {
        "computation"
    } else if ["check", "verify", "validate", "confirm"]
        .iter()
        .any(|w| content.contains(w))
    {
        "verification"
    } else if ["decide", "choose", "select", "pick"].iter().any(|w| content.contains(w)) {
        "reasoning"
    } else {
        "synthesis"
    }
}

fn prop_str(node: &Node, key: &str) -> String {
    node.properties
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

const PROCEDURE_MATCH_THRESHOLD: f64 = 0.1;

async fn select_procedure(graph: &GraphStore, goal: &str) -> Option<Node> {
    let procedures = graph.query("MATCH (n:Procedure) WHERE n.property = $param", &PropertyMap::new()).await;
    if procedures.is_empty() {
        debug!("no procedures found in graph");
        return None;
    }

    let goal_words: HashSet<String> = goal.to_lowercase().split_whitespace().map(String::from).collect();

    let mut best_score = 0.0;
    let mut best: Option<Node> = None;

    for proc in procedures {
        let text = format!("{} {}", prop_str(&proc, "name"), prop_str(&proc, "description")).to_lowercase();
        let proc_words: HashSet<String> = text.split_whitespace().map(String::from).collect();
        let score = jaccard(&goal_words, &proc_words);

        if score > best_score {
            best_score = score;
            best = Some(proc);
        }
    }

    if best_score > PROCEDURE_MATCH_THRESHOLD {
        if let Some(ref proc) = best {
            debug!(procedure_id = %proc.id, score = best_score, "selected procedure");
        }
        best
    } else {
        debug!("no suitable procedure found, will create generic tasks");
        None
    }
}

async fn expand_steps(graph: &GraphStore, procedure: &Node) -> Vec<Node> {
    let neighbors = graph.neighbors(&procedure.id, Some(&[EdgeKind::PartOf]), 1).await;
    let mut steps: Vec<Node> = neighbors.into_iter().filter(|n| n.kind == NodeKind::Step).collect();

    steps.sort_by_key(|s| s.properties.get("step_number").and_then(|v| v.as_u64()).unwrap_or(999));
    debug!(procedure_id = %procedure.id, step_count = steps.len(), "expanded procedure into steps");
    steps
}

fn create_generic_tasks(goal: &str) -> Vec<WorkflowTask> {
    let safe_goal = sanitize(goal);

    vec![
        WorkflowTask {
            id: "task:retrieve:1".to_string(),
            task_type: "retrieval".to_string(),
            name: "Gather Information".to_string(),
            description: format!("Retrieve relevant information for: {safe_goal}"),
            dependencies: vec![],
            tool: String::new(),
            model: String::new(),
            prompt: String::new(),
            parameters: json!({"query": safe_goal}),
            estimated_tokens: 0,
            estimated_time_s: 0,
            requires_approval: false,
            checkpoint: false,
        },
        WorkflowTask {
            id: "task:reason:1".to_string(),
            task_type: "reasoning".to_string(),
            name: "Analyze and Plan".to_string(),
            description: "Analyze retrieved information and plan approach".to_string(),
            dependencies: vec!["task:retrieve:1".to_string()],
            tool: String::new(),
            model: String::new(),
            prompt: String::new(),
            parameters: json!({}),
            estimated_tokens: 0,
            estimated_time_s: 0,
            requires_approval: false,
            checkpoint: false,
        },
        WorkflowTask {
            id: "task:synthesize:1".to_string(),
            task_type: "synthesis".to_string(),
            name: "Generate Answer".to_string(),
            description: format!("Synthesize final answer for: {safe_goal}"),
            dependencies: vec!["task:reason:1".to_string()],
            tool: String::new(),
            model: String::new(),
            prompt: String::new(),
            parameters: json!({}),
            estimated_tokens: 0,
            estimated_time_s: 0,
            requires_approval: false,
            checkpoint: false,
        },
    ]
}

fn create_generic_edges(tasks: &[WorkflowTask]) -> Vec<(String, String)> {
    tasks.windows(2).map(|w| (w[0].id.clone(), w[1].id.clone())).collect()
}

fn create_task_dag(goal: &str, steps: &[Node]) -> (Vec<WorkflowTask>, Vec<(String, String)>) {
    if steps.is_empty() {
        let tasks = create_generic_tasks(goal);
        let edges = create_generic_edges(&tasks);
        return (tasks, edges);
    }

    let mut tasks = Vec::with_capacity(steps.len());
    let mut edges = Vec::new();

    for (i, step) in steps.iter().enumerate() {
        let task_id = format!("task:{}", step.id);
        let step_name = prop_str(step, "name");
        let description = prop_str(step, "description");
        let task_type = classify_step_type(&step_name, &description);
        let step_number = step.properties.get("step_number").cloned().unwrap_or(json!(i + 1));
        let dependencies = if i > 0 {
            vec![format!("task:{}", steps[i - 1].id)]
        } else {
            vec![]
        };

        tasks.push(WorkflowTask {
            id: task_id.clone(),
            task_type: task_type.to_string(),
            name: step_name,
            description,
            dependencies,
            tool: String::new(),
            model: String::new(),
            prompt: String::new(),
            parameters: json!({"step_number": step_number}),
            estimated_tokens: 0,
            estimated_time_s: 0,
            requires_approval: false,
            checkpoint: false,
        });

        if i > 0 {
            let prev_task_id = format!("task:{}", steps[i - 1].id);
            edges.push((prev_task_id, task_id));
        }
    }

    (tasks, edges)
}

fn assign_tools_and_models(tasks: &mut [WorkflowTask]) {
    for task in tasks.iter_mut() {
        let mapping = tool_mapping(&task.task_type);
        task.tool = mapping.tool.to_string();
        task.model = mapping.model.to_string();

        task.prompt = match task.task_type.as_str() {
            "retrieval" => format!("Retrieve information relevant to: {}", task.description),
            "computation" => format!("Compute required values for: {}", task.description),
            "verification" => format!("Verify and validate: {}", task.description),
            "reasoning" => format!("Analyze and reason about: {}", task.description),
            _ => format!("Synthesize comprehensive answer for: {}", task.description),
        };
    }
}

const HIGH_COST_TOKEN_THRESHOLD: u64 = 5000;
const TOKEN_BUDGET_WARN_FRACTION: f64 = 0.8;
const TOP_EXPENSIVE_CHECKPOINTS: usize = 3;

fn estimate_and_checkpoint(tasks: &mut [WorkflowTask], max_tokens: u64, max_time_s: u64) -> (u64, u64, Vec<String>) {
    let mut total_tokens = 0u64;
    let mut total_time = 0u64;
    let mut checkpoints = Vec::new();

    for task in tasks.iter_mut() {
        let mapping = tool_mapping(&task.task_type);
        let word_count = task.description.split_whitespace().count() as f64;
        let complexity_factor = word_count / 10.0;
        let estimated_tokens = (mapping.base_tokens as f64 * (1.0 + complexity_factor)) as u64;

        task.estimated_tokens = estimated_tokens;
        task.estimated_time_s = estimated_tokens / 100;

        total_tokens += estimated_tokens;
        total_time += task.estimated_time_s;

        if estimated_tokens > HIGH_COST_TOKEN_THRESHOLD || task.task_type == "reasoning" {
            task.requires_approval = true;
            task.checkpoint = true;
            checkpoints.push(task.id.clone());
        }
    }

    if total_tokens as f64 > max_tokens as f64 * TOKEN_BUDGET_WARN_FRACTION {
        warn!(total_tokens, max_tokens, "plan exceeds 80% of token budget");
        let mut indices: Vec<usize> = (0..tasks.len()).collect();
        indices.sort_by_key(|&i| std::cmp::Reverse(tasks[i].estimated_tokens));

        for &i in indices.iter().take(TOP_EXPENSIVE_CHECKPOINTS) {
            if !checkpoints.contains(&tasks[i].id) {
                tasks[i].requires_approval = true;
                tasks[i].checkpoint = true;
                checkpoints.push(tasks[i].id.clone());
            }
        }
    }

    let token_cap = (max_tokens * 2).max(1);
    let time_cap = (max_time_s * 2).max(1);
    let scale_tokens = token_cap as f64 / total_tokens.max(1) as f64;
    let scale_time = time_cap as f64 / total_time.max(1) as f64;
    let scale = scale_tokens.min(scale_time).min(1.0);

    if scale < 1.0 {
        total_tokens = (total_tokens as f64 * scale) as u64;
        total_time = (total_time as f64 * scale) as u64;
        for task in tasks.iter_mut() {
            task.estimated_tokens = ((task.estimated_tokens as f64 * scale) as u64).max(1);
            task.estimated_time_s = ((task.estimated_time_s as f64 * scale) as u64).max(1);
        }
    }

    (total_tokens, total_time, checkpoints)
}

fn fallback_plan(goal: &str) -> WorkflowPlan {
    let fallback_task = WorkflowTask {
        id: "task:fallback:1".to_string(),
        task_type: "reasoning".to_string(),
        name: "Direct Answer".to_string(),
        description: format!("Provide direct answer to: {goal}"),
        dependencies: vec![],
        tool: "llm".to_string(),
        model: "claude-3-haiku".to_string(),
        prompt: format!("Answer this query directly: {goal}"),
        parameters: json!({}),
        estimated_tokens: 1000,
        estimated_time_s: 10,
        requires_approval: false,
        checkpoint: false,
    };

    WorkflowPlan {
        id: format!("plan:fallback:{}", Uuid::new_v4()),
        goal: goal.to_string(),
        procedure_id: None,
        tasks: vec![fallback_task],
        edges: vec![],
        total_estimated_tokens: 1000,
        total_estimated_time_s: 10,
        checkpoints: vec![],
        created_at: chrono::Utc::now(),
    }
}

/// Decompose `goal` into an executable, cost-estimated, checkpoint-annotated
/// plan. On any internal error the caller gets a minimal single-task
/// fallback plan instead of a propagated error, so planning never blocks a
/// user-facing request.
pub async fn plan_from_goal(graph: &GraphStore, goal: &str, constraints: PlanConstraints) -> WorkflowPlan {
    info!(goal = %goal.chars().take(100).collect::<String>(), "planning workflow");

    let procedure = select_procedure(graph, goal).await;
    let steps = match &procedure {
        Some(p) => expand_steps(graph, p).await,
        None => Vec::new(),
    };

    let (mut tasks, edges) = create_task_dag(goal, &steps);
    assign_tools_and_models(&mut tasks);
    let (total_tokens, total_time, checkpoints) =
        estimate_and_checkpoint(&mut tasks, constraints.max_tokens, constraints.max_time_s);

    let plan_id = format!("plan:{}", Uuid::new_v4());

    info!(plan_id = %plan_id, task_count = tasks.len(), total_tokens, "created plan");

    WorkflowPlan {
        id: plan_id,
        goal: goal.to_string(),
        procedure_id: procedure.map(|p| p.id),
        tasks,
        edges,
        total_estimated_tokens: total_tokens,
        total_estimated_time_s: total_time,
        checkpoints,
        created_at: chrono::Utc::now(),
    }
}

/// Minimal single-task plan used when goal planning cannot proceed (no
/// graph backing, caller-detected upstream failure). Kept separate from
/// `plan_from_goal` so callers can fall back explicitly at their own
/// error boundary instead of this crate swallowing failures silently.
pub fn emergency_fallback_plan(goal: &str) -> WorkflowPlan {
    fallback_plan(goal)
}
