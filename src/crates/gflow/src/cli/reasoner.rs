//! Graph-guided reasoning ("ask") command handler

use anyhow::Result;
use colored::Colorize;
use gflow_reasoner::graph_guided_answer;

use crate::context::GflowContext;
use crate::retriever::GraphTextRetriever;

pub async fn handle_ask(ctx: &GflowContext, goal: String) -> Result<()> {
    let retriever = GraphTextRetriever::new(ctx.graph().clone());
    let answer = graph_guided_answer(ctx.graph(), &retriever, &goal).await;

    println!("{}", "Answer".bold().underline());
    println!("{}", answer.answer);
    println!();
    println!("confidence: {:.2}  ({} hop(s), {:.2}s)", answer.final_confidence, answer.hops.len(), answer.duration_s);

    if !answer.hops.is_empty() {
        println!();
        println!("{}", "Reasoning hops".bold());
        for hop in &answer.hops {
            println!(
                "  [{}] {} ({}) — confidence {:.2} — {}",
                hop.hop_number, hop.focus_node_id, hop.focus_node_type, hop.confidence, hop.reasoning
            );
        }
    }

    if !answer.sources.is_empty() {
        println!();
        println!("{}", "Sources".bold());
        for source in &answer.sources {
            match &source.page {
                Some(page) => println!("  {} (page {page})", source.source),
                None => println!("  {}", source.source),
            }
        }
    }

    Ok(())
}
