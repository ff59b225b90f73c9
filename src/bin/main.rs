use clap::Parser;
use hierarchical_agent_orchestrator::{Goal, Orchestrator, OrchestratorConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run a goal through the agent hierarchy and print the final report.
#[derive(Debug, Parser)]
#[command(name = "orchestrator", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, default_value = "orchestrator.toml")]
    config: PathBuf,

    /// Domain tag used for role exclusions
    #[arg(short, long, default_value = "general")]
    domain: String,

    /// Skip role selection and refinement; delegate the goal directly
    #[arg(long)]
    delegate_only: bool,

    /// Print the full summary as JSON
    #[arg(long)]
    json: bool,

    /// Goal or problem statement
    #[arg(required = true, num_args = 1..)]
    goal: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::load(&cli.config)?;
    let goal = Goal::new(cli.goal.join(" "), cli.domain);

    info!(config = %cli.config.display(), domain = %goal.domain, "Orchestrator starting");

    let orchestrator = Orchestrator::from_config(config)?;
    let summary = if cli.delegate_only {
        orchestrator.delegate_goal(&goal.description).await
    } else {
        orchestrator.run(&goal).await
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", summary.final_report);
    if let Some(executive) = summary.run.as_ref().and_then(|r| r.executive_summary.as_deref()) {
        println!("\n=== EXECUTIVE SUMMARY ===\n{}", executive);
    }
    Ok(())
}
