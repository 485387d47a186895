mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use agentcore_engine::{AgentCatalog, Runtime};
use agentcore_http::{AppState, Paths};
use agentcore_model::{MockProvider, ModelProvider};
use agentcore_storage::Storage;
use agentcore_tools::ToolRegistry;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = agentcore_config::load(cli.config.as_deref())?;

    if matches!(cli.command, Some(Commands::ShowConfig)) {
        println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
        return Ok(());
    }

    let bind = match &cli.command {
        Some(Commands::Serve { bind: Some(bind) }) => bind.clone(),
        _ => config.server.bind.clone(),
    };

    serve(config, bind).await
}

async fn serve(config: agentcore_config::Config, bind: String) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir(&config)?;
    tracing::info!(data_dir = %data_dir.display(), bind = %bind, "starting agentcored");

    let storage = Storage::new(data_dir.clone());
    let tools = ToolRegistry::new();
    let providers: Vec<Arc<dyn ModelProvider>> = vec![Arc::new(MockProvider)];
    let agents: AgentCatalog = config.agent_catalog();

    let runtime = Runtime::new(storage, tools, providers, agents, config.max_retries);

    let paths = Paths {
        data: data_dir.clone(),
        config: None,
        storage: data_dir.clone(),
        directory: std::env::current_dir().context("resolving working directory")?,
        worktree: None,
    };
    let state = AppState::new(runtime, paths);
    let app = agentcore_http::router(state, &config.server.cors_whitelist);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(bind = %bind, "listening");
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}

fn resolve_data_dir(config: &agentcore_config::Config) -> anyhow::Result<std::path::PathBuf> {
    if let Some(dir) = &config.data_dir {
        return Ok(std::path::PathBuf::from(dir));
    }
    dirs::data_dir().map(|dir| dir.join("agentcore")).context("resolving platform data directory")
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(false)).init();
}
