//! # Provider Configuration
//!
//! | Type | Description | API Key Required |
//! |------|-------------|-----------------|
//! | `anthropic` | Anthropic Messages API | Yes |
//! | `openai` | OpenAI-compatible chat completions | Yes |

use crate::constants::{DEFAULT_ANTHROPIC_ENDPOINT, DEFAULT_OPENAI_ENDPOINT};
use serde::{Deserialize, Serialize};

/// Configuration for a model provider endpoint.
///
/// # Example
///
/// ```toml
/// [[providers]]
/// id = "anthropic"
/// type = "anthropic"
/// endpoint = "https://api.anthropic.com"
/// api_key = "ANTHROPIC_API_KEY"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelProviderConfig {
    /// Unique identifier for this provider
    pub id: String,
    /// Determines the wire format: "anthropic" or "openai"
    #[serde(rename = "type")]
    pub provider_type: String,
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API path override (e.g. "/v1/messages")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawProviderConfig {
    pub(super) id: String,
    #[serde(rename = "type", default)]
    pub(super) provider_type: String,
    pub(super) endpoint: Option<String>,
    pub(super) api_key: Option<String>,
    #[serde(default)]
    pub(super) api_path: Option<String>,
}

impl From<RawProviderConfig> for ModelProviderConfig {
    fn from(raw: RawProviderConfig) -> Self {
        Self {
            id: raw.id,
            provider_type: raw.provider_type,
            endpoint: raw.endpoint.unwrap_or_default(),
            api_key: raw.api_key,
            api_path: raw.api_path,
        }
    }
}

impl ModelProviderConfig {
    pub fn is_anthropic(&self) -> bool {
        self.provider_type.eq_ignore_ascii_case("anthropic")
    }

    /// Providers available when the config file declares none.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self {
                id: "anthropic".to_string(),
                provider_type: "anthropic".to_string(),
                endpoint: DEFAULT_ANTHROPIC_ENDPOINT.to_string(),
                api_key: Some("ANTHROPIC_API_KEY".to_string()),
                api_path: None,
            },
            Self {
                id: "openai".to_string(),
                provider_type: "openai".to_string(),
                endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
                api_key: Some("OPENAI_API_KEY".to_string()),
                api_path: None,
            },
        ]
    }
}
