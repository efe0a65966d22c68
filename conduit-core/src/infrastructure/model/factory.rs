//! Provider factory - creates clients from config

use super::clients::{AnthropicClient, OpenAIClient};
use super::traits::ModelProvider;
use super::types::ModelSettings;
use crate::config::ModelProviderConfig;
use std::env;
use tracing::warn;

/// Resolve API key from the environment variable named in config.
///
/// Accepts either a bare variable name or the `${NAME}` form.
pub fn resolve_api_key(provider: &str, spec: Option<&str>) -> Option<String> {
    let raw = spec.map(str::trim)?;
    let name = raw
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(raw);
    if name.is_empty() {
        return None;
    }
    match env::var(name) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                provider,
                env_var = name,
                %err,
                "API key environment variable is not set"
            );
            None
        }
    }
}

/// Factory for creating model clients from provider config.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates a model client based on provider type.
    ///
    /// Supported types:
    /// - `anthropic` → Anthropic Messages API
    /// - Others → OpenAI-compatible format (default)
    pub fn create(config: &ModelProviderConfig, settings: ModelSettings) -> Box<dyn ModelProvider> {
        if config.is_anthropic() {
            Box::new(AnthropicClient::from_config(config, settings))
        } else {
            Box::new(OpenAIClient::from_config(config, settings))
        }
    }
}
