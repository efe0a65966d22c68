use super::error::ConfigError;
use super::provider::ModelProviderConfig;
use super::server::ServerConfig;
use crate::constants::{
    DEFAULT_MAX_ROUNDS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PROVIDER_ID,
    DEFAULT_TOOL_TIMEOUT_SECS,
};
use std::path::Path;
use std::time::Duration;

/// Application configuration loaded from client.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub max_rounds: usize,
    pub tool_timeout_secs: u64,
    pub parallel_tool_calls: bool,
    pub providers: Vec<ModelProviderConfig>,
    pub servers: Vec<ServerConfig>,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// The provider entry named by `default_provider`.
    pub fn active_provider(&self) -> Result<&ModelProviderConfig, ConfigError> {
        self.providers
            .iter()
            .find(|provider| provider.id == self.default_provider)
            .ok_or_else(|| ConfigError::ProviderNotFound {
                provider: self.default_provider.clone(),
            })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: DEFAULT_PROVIDER_ID.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            parallel_tool_calls: true,
            providers: ModelProviderConfig::builtin(),
            servers: Vec::new(),
        }
    }
}
