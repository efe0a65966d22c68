mod cli;
mod shell;

use clap::Parser;
use cli::{Cli, apply_cli_overrides};
use conduit_core::agent::{AgentOptions, ChatSession};
use conduit_core::config::{AppConfig, ConfigError};
use conduit_core::model::{ModelProvider, ModelSettings, ProviderFactory};
use conduit_core::tooling::{ServerManager, ToolInvokeError, ToolSession};
use shell::{ShellError, ShellOptions};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tools(#[from] ToolInvokeError),
    #[error(transparent)]
    Shell(#[from] ShellError),
}

impl AppError {
    fn user_message(&self) -> String {
        match self {
            AppError::Config(err) => err.to_string(),
            AppError::Tools(err) => err.user_message(),
            AppError::Shell(err) => err.to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(?cli, "CLI arguments parsed");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "conduit exited with an error");
            eprintln!("Error: {}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut config)?;
    let provider_config = config.active_provider()?.clone();
    info!(
        provider = provider_config.id.as_str(),
        model = config.model.as_str(),
        servers = config.servers.len(),
        "Configuration ready"
    );
    if config.servers.is_empty() {
        warn!("No MCP servers configured; the model will have no tools");
    }

    let model: Arc<dyn ModelProvider> = Arc::from(ProviderFactory::create(
        &provider_config,
        ModelSettings::from(&config),
    ));
    let manager =
        Arc::new(ServerManager::connect(config.servers.clone(), config.tool_timeout()).await?);

    let result = chat(&config, model, manager.clone(), cli.show_tools).await;
    manager.shutdown().await;
    info!("Client execution finished");
    result
}

async fn chat(
    config: &AppConfig,
    model: Arc<dyn ModelProvider>,
    manager: Arc<ServerManager>,
    show_tools: bool,
) -> Result<(), AppError> {
    let tools = manager.list_tools().await?;
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    println!("\nConnected to server with tools: {names:?}");

    let mut session = ChatSession::new(model, manager, AgentOptions::from(config));
    shell::run(
        &mut session,
        BufReader::new(io::stdin()),
        io::stdout(),
        ShellOptions { show_tools },
    )
    .await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
