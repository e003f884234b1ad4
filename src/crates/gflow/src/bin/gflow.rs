//! gflow CLI — graph-centered workflow planning, execution and reasoning.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gflow")]
#[command(about = "Graph-centered workflow engine: plan, run, resume and reason over a property graph", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize ~/.gflow and write a default configuration
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Decompose a goal into a cost-estimated task plan without running it
    Plan {
        /// Natural-language goal to decompose
        goal: String,
        /// Requesting role: admin, player or guest
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Plan and execute a goal end to end
    Run {
        /// Natural-language goal to decompose and execute
        goal: String,
        /// Requesting role: admin, player or guest
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Resume a workflow whose failed/blocked tasks should be retried
    Resume {
        /// Workflow id, as printed by `run`
        workflow_id: String,
    },

    /// Show a workflow's current task-by-task state
    Show {
        /// Workflow id
        workflow_id: String,
    },

    /// List stored workflows, optionally filtered by status
    List {
        /// Filter by status: running, completed, failed, error, partial_failure
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Answer a question via graph-guided multi-hop reasoning
    Ask {
        /// Question or goal to reason about
        goal: String,
    },

    /// Graph administration commands
    #[command(subcommand)]
    Graph(GraphCommands),
}

#[derive(Subcommand)]
enum GraphCommands {
    /// Create or update a node
    AddNode {
        /// Node id
        id: String,
        /// Node type: Rule, Concept, Procedure, Step, Entity, SourceDoc, Artifact, Decision
        #[arg(short, long)]
        kind: String,
        /// Properties as a JSON object, e.g. '{"name": "Forge Sword"}'
        #[arg(short, long, default_value = "")]
        properties: String,
    },
    /// Create or update an edge between two existing nodes
    AddEdge {
        /// Source node id
        source: String,
        /// Edge type: depends_on, part_of, implements, cites, produces, variant_of, prereq
        #[arg(short, long)]
        kind: String,
        /// Target node id
        target: String,
    },
    /// Show node/edge counts by type
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { force }) => {
            println!("Initializing gflow...");
            gflow::init::initialize(force)?;
            println!("✓ gflow initialized successfully");
            println!("  Configuration: {}", gflow::init::get_user_config_path()?.display());
            println!("\nEdit the configuration file to change storage paths or executor parallelism.");
            Ok(())
        }

        Some(Commands::Plan { goal, role }) => {
            let ctx = build_context().await?;
            gflow::cli::workflow::handle_plan(&ctx, goal, resolve_role(&ctx, role)).await
        }

        Some(Commands::Run { goal, role }) => {
            let ctx = build_context().await?;
            gflow::cli::workflow::handle_run(&ctx, goal, resolve_role(&ctx, role)).await
        }

        Some(Commands::Resume { workflow_id }) => {
            let ctx = build_context().await?;
            gflow::cli::workflow::handle_resume(&ctx, workflow_id).await
        }

        Some(Commands::Show { workflow_id }) => {
            let ctx = build_context().await?;
            gflow::cli::workflow::handle_show(&ctx, workflow_id).await
        }

        Some(Commands::List { status }) => {
            let ctx = build_context().await?;
            gflow::cli::workflow::handle_list(&ctx, status).await
        }

        Some(Commands::Ask { goal }) => {
            let ctx = build_context().await?;
            gflow::cli::reasoner::handle_ask(&ctx, goal).await
        }

        Some(Commands::Graph(graph_cmd)) => {
            let ctx = build_context().await?;
            match graph_cmd {
                GraphCommands::AddNode { id, kind, properties } => {
                    gflow::cli::graph::handle_add_node(&ctx, id, kind, properties).await
                }
                GraphCommands::AddEdge { source, kind, target } => {
                    gflow::cli::graph::handle_add_edge(&ctx, source, kind, target).await
                }
                GraphCommands::Stats => gflow::cli::graph::handle_stats(&ctx).await,
            }
        }

        None => {
            println!("gflow - graph-centered workflow engine. Run 'gflow --help' for usage.");
            Ok(())
        }
    }
}

async fn build_context() -> anyhow::Result<gflow::GflowContext> {
    if !gflow::cli::is_initialized() {
        eprintln!("{}", gflow::cli::get_init_instructions());
        return Err(anyhow::anyhow!("gflow not initialized"));
    }

    let config = gflow::load_config().await?;
    gflow::GflowContext::build(config).await
}

fn resolve_role(ctx: &gflow::GflowContext, role: Option<String>) -> String {
    role.unwrap_or_else(|| ctx.config().budget.default_role.clone())
}
