use hierarchical_agent_orchestrator::{api::start_server, Orchestrator, OrchestratorConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("ORCHESTRATOR_CONFIG").unwrap_or_else(|_| "orchestrator.toml".to_string());

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!(config = %config_path, port = api_port, "Hierarchical Agent Orchestrator - API Server");

    let config = OrchestratorConfig::load(&config_path)?;
    let orchestrator = Arc::new(Orchestrator::from_config(config)?);

    info!("Orchestrator initialized, starting API server");

    start_server(orchestrator, api_port).await?;

    Ok(())
}
