use super::AppConfig;
use super::error::ConfigError;
use super::provider::{ModelProviderConfig, RawProviderConfig};
use super::server::{RawServer, ServerConfig};
use crate::constants::{
    CONFIG_PATH, DEFAULT_MAX_ROUNDS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PROVIDER_ID,
    DEFAULT_TOOL_TIMEOUT_SECS, ENV_PATHS,
};
use dotenvy::from_filename;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::{debug, info};

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    pub model: Option<String>,
    pub default_provider: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub max_rounds: Option<usize>,
    pub tool_timeout_secs: Option<u64>,
    pub parallel_tool_calls: Option<bool>,
    pub providers: Option<Vec<RawProviderConfig>>,
    #[serde(default)]
    pub servers: Vec<RawServer>,
}

/// Loads `.env` files once per process so API keys become visible.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        for path in ENV_PATHS {
            if from_filename(path).is_ok() {
                debug!(path, "Loaded environment file");
            }
        }
    });
}

/// Load and validate configuration.
///
/// An explicit path must exist. Without one, the default path is tried and
/// built-in defaults are used when it is absent.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    if let Some(path) = path {
        return read_config(path);
    }
    match read_config(Path::new(CONFIG_PATH)) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound { .. }) => {
            info!("Configuration file not found; using defaults");
            Ok(AppConfig::default())
        }
        Err(other) => Err(other),
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading client configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_config(&content).map_err(|err| match err {
        ParseFailure::Toml(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Invalid(err) => err,
    })
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn parse_config(content: &str) -> Result<AppConfig, ParseFailure> {
    let parsed: RawConfig = toml::from_str(content).map_err(ParseFailure::Toml)?;
    validate_and_build(parsed).map_err(ParseFailure::Invalid)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let providers: Vec<ModelProviderConfig> = match parsed.providers {
        None => ModelProviderConfig::builtin(),
        Some(raw) if raw.is_empty() => return Err(ConfigError::NoProvidersConfigured),
        Some(raw) => {
            let mut providers = Vec::with_capacity(raw.len());
            for raw_provider in raw {
                if raw_provider.endpoint.is_none() {
                    return Err(ConfigError::MissingEndpoint {
                        provider: raw_provider.id.clone(),
                    });
                }
                providers.push(ModelProviderConfig::from(raw_provider));
            }
            providers
        }
    };

    let default_provider = parsed
        .default_provider
        .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string());
    if !providers.iter().any(|p| p.id == default_provider) {
        return Err(ConfigError::ProviderNotFound {
            provider: default_provider,
        });
    }

    let max_rounds = parsed.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS);
    if max_rounds == 0 {
        return Err(ConfigError::InvalidMaxRounds);
    }

    let servers: Vec<ServerConfig> = parsed.servers.into_iter().map(ServerConfig::from).collect();
    let mut seen = HashSet::new();
    for server in &servers {
        if !seen.insert(server.name.as_str()) {
            return Err(ConfigError::DuplicateServer {
                server: server.name.clone(),
            });
        }
    }

    Ok(AppConfig {
        default_provider,
        model: parsed.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        system_prompt: parsed
            .system_prompt
            .filter(|prompt| !prompt.trim().is_empty()),
        max_tokens: parsed.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        max_rounds,
        tool_timeout_secs: parsed.tool_timeout_secs.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS),
        parallel_tool_calls: parsed.parallel_tool_calls.unwrap_or(true),
        providers,
        servers,
    })
}
