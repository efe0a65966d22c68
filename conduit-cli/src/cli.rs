use std::path::PathBuf;

use clap::Parser;
use conduit_core::config::{AppConfig, ConfigError, ServerConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "conduit",
    version,
    about = "Chat with a language model that can call MCP tool servers"
)]
pub struct Cli {
    /// Path to client.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Provider id from the config to use instead of `default_provider`
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// Extra server script (.py or .js); may be repeated
    #[arg(long = "server", value_name = "SCRIPT")]
    pub servers: Vec<PathBuf>,
    /// Server scripts given positionally
    #[arg(value_name = "SERVER_SCRIPT")]
    pub scripts: Vec<PathBuf>,
    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
    /// Print each tool call before the answer
    #[arg(long)]
    pub show_tools: bool,
}

pub fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Some(provider) = &cli.provider {
        info!(provider = provider.as_str(), "Overriding default provider from CLI flag");
        config.default_provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        info!(model = model.as_str(), "Overriding model from CLI flag");
        config.model = model.clone();
    }

    for script in cli.scripts.iter().chain(&cli.servers) {
        let server = ServerConfig::from_script_path(script)?;
        if config.servers.iter().any(|existing| existing.name == server.name) {
            return Err(ConfigError::DuplicateServer {
                server: server.name,
            });
        }
        config.servers.push(server);
    }

    config.active_provider()?;
    Ok(())
}
