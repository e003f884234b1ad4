//! Plan/run/resume/show/list command handlers

use anyhow::{anyhow, Result};
use colored::Colorize;
use gflow_budget::{enforce_plan, PlanTask};
use gflow_planner::{plan_from_goal, validate_plan, WorkflowPlan};

use crate::context::GflowContext;

fn plan_tasks_for_budget(plan: &WorkflowPlan) -> Vec<PlanTask> {
    plan.tasks
        .iter()
        .map(|t| PlanTask {
            id: t.id.clone(),
            task_type: t.task_type.clone(),
            model: t.model.clone(),
            estimated_tokens: t.estimated_tokens,
            dependencies: t.dependencies.clone(),
        })
        .collect()
}

fn apply_optimized_models(plan: &mut WorkflowPlan, optimized: &[PlanTask]) {
    for task in plan.tasks.iter_mut() {
        if let Some(opt) = optimized.iter().find(|o| o.id == task.id) {
            task.model = opt.model.clone();
        }
    }
}

fn print_plan_summary(plan: &WorkflowPlan) {
    println!("{}", "Plan".bold().underline());
    println!("  id:     {}", plan.id);
    println!("  goal:   {}", plan.goal);
    println!("  tokens: {}", plan.total_estimated_tokens);
    println!("  time:   {}s", plan.total_estimated_time_s);
    println!();
    println!("{:<28} {:<14} {:<10} {:<24} {}", "task", "type", "tokens", "model", "depends_on");
    println!("{}", "-".repeat(100));
    for task in &plan.tasks {
        println!(
            "{:<28} {:<14} {:<10} {:<24} {}",
            task.id,
            task.task_type,
            task.estimated_tokens,
            task.model,
            task.dependencies.join(","),
        );
    }
}

async fn build_and_enforce_plan(ctx: &GflowContext, goal: &str, role: &str) -> Result<WorkflowPlan> {
    let mut plan = plan_from_goal(ctx.graph(), goal, ctx.plan_constraints()).await;

    let constraints = ctx.plan_constraints();
    let (valid, errors) = validate_plan(&plan, constraints.max_tokens, constraints.max_time_s);
    if !valid {
        for error in &errors {
            println!("{} {}", "warning:".yellow().bold(), error);
        }
    }

    let budget_tasks = plan_tasks_for_budget(&plan);
    let enforcement = enforce_plan(ctx.catalog(), &plan.id, &budget_tasks, role);

    if !enforcement.violations.is_empty() {
        println!("{}", "Budget enforcement".bold());
        for violation in &enforcement.violations {
            println!("  {} {violation}", "-".yellow());
        }
    }

    if let Some(optimized) = &enforcement.optimized_plan {
        apply_optimized_models(&mut plan, optimized);
        println!("{}", "plan optimized to fit budget".green());
    }

    if !enforcement.approved {
        return Err(anyhow!(
            "plan for role '{role}' still exceeds budget after optimization and requires approval"
        ));
    }

    Ok(plan)
}

pub async fn handle_plan(ctx: &GflowContext, goal: String, role: String) -> Result<()> {
    let plan = build_and_enforce_plan(ctx, &goal, &role).await?;
    print_plan_summary(&plan);
    Ok(())
}

pub async fn handle_run(ctx: &GflowContext, goal: String, role: String) -> Result<()> {
    let plan = build_and_enforce_plan(ctx, &goal, &role).await?;
    print_plan_summary(&plan);
    println!();

    let state = ctx.executor().run_plan(plan, None).await;

    println!("{}", "Execution result".bold().underline());
    println!("  workflow id: {}", state.id);
    println!("  status:      {}", colorize_status(&state.status.to_string()));
    if let Some(duration) = state.duration_s() {
        println!("  duration:    {duration:.2}s");
    }
    if let Some(error) = &state.error {
        println!("  error:       {error}");
    }

    Ok(())
}

pub async fn handle_resume(ctx: &GflowContext, workflow_id: String) -> Result<()> {
    let state = ctx.executor().resume_workflow(&workflow_id, None).await?;

    println!("{}", "Resume result".bold().underline());
    println!("  workflow id: {}", state.id);
    println!("  status:      {}", colorize_status(&state.status.to_string()));

    Ok(())
}

pub async fn handle_show(ctx: &GflowContext, workflow_id: String) -> Result<()> {
    let state = ctx
        .state_store()
        .get_workflow_state(&workflow_id)
        .await
        .ok_or_else(|| anyhow!("no workflow found with id '{workflow_id}'"))?;

    println!("{}", "Workflow".bold().underline());
    println!("  id:     {}", state.id);
    println!("  goal:   {}", state.goal);
    println!("  status: {}", colorize_status(&state.status.to_string()));
    if let Some(resumed_at) = state.resumed_at {
        println!("  resumed at: {resumed_at}");
    }
    println!();
    println!("{:<24} {:<10} {:<8} {}", "task", "status", "retries", "error");
    println!("{}", "-".repeat(80));

    let mut tasks: Vec<_> = state.tasks.values().collect();
    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    for task in tasks {
        println!(
            "{:<24} {:<10} {:<8} {}",
            task.id,
            task.status.to_string(),
            task.retries,
            task.error.as_deref().unwrap_or(""),
        );
    }

    Ok(())
}

pub async fn handle_list(ctx: &GflowContext, status: Option<String>) -> Result<()> {
    let workflows = ctx.state_store().list_workflows(status.as_deref()).await;

    if workflows.is_empty() {
        println!("{}", "no workflows found".yellow());
        return Ok(());
    }

    println!("{:<40} {:<16} {:<10} {}", "id", "status", "tasks", "goal");
    println!("{}", "-".repeat(100));
    for workflow in workflows {
        println!(
            "{:<40} {:<16} {:<10} {}",
            workflow.id,
            colorize_status(&workflow.status),
            workflow.task_count,
            workflow.goal,
        );
    }

    Ok(())
}

fn colorize_status(status: &str) -> String {
    match status {
        "completed" => status.green().to_string(),
        "failed" | "error" => status.red().to_string(),
        "partial_failure" | "blocked" => status.yellow().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gflow_planner::WorkflowTask;
    use serde_json::json;

    fn task(id: &str, model: &str) -> WorkflowTask {
        WorkflowTask {
            id: id.to_string(),
            task_type: "retrieval".to_string(),
            name: id.to_string(),
            description: String::new(),
            dependencies: vec![],
            tool: "retriever".to_string(),
            model: model.to_string(),
            prompt: String::new(),
            parameters: json!({}),
            estimated_tokens: 1000,
            estimated_time_s: 10,
            requires_approval: false,
            checkpoint: false,
        }
    }

    #[test]
    fn test_apply_optimized_models_only_touches_matching_ids() {
        let mut plan = WorkflowPlan {
            id: "plan:1".to_string(),
            goal: "g".to_string(),
            procedure_id: None,
            tasks: vec![task("t1", "gpt-4"), task("t2", "gpt-4")],
            edges: vec![],
            total_estimated_tokens: 2000,
            total_estimated_time_s: 20,
            checkpoints: vec![],
            created_at: chrono::Utc::now(),
        };

        let optimized = vec![PlanTask {
            id: "t1".to_string(),
            task_type: "retrieval".to_string(),
            model: "local".to_string(),
            estimated_tokens: 1000,
            dependencies: vec![],
        }];

        apply_optimized_models(&mut plan, &optimized);
        assert_eq!(plan.tasks[0].model, "local");
        assert_eq!(plan.tasks[1].model, "gpt-4");
    }
}
