//! Anthropic Messages API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ModelProviderConfig;
use crate::domain::types::{
    CompletionResult, ContentBlock, Message, StopReason, ToolArguments, ToolDescriptor,
};
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::factory::resolve_api_key;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{ModelError, ModelSettings, non_empty};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
    api_path: String,
    settings: ModelSettings,
}

impl AnthropicClient {
    pub fn from_config(config: &ModelProviderConfig, settings: ModelSettings) -> Self {
        let api_key = resolve_api_key(&config.id, config.api_key.as_deref());
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), api_key),
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| "/v1/messages".to_string()),
            settings,
        }
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDescriptor]) -> AnthropicRequest {
        AnthropicRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            system: self.settings.system_prompt.clone(),
            messages: MessageAdapter::to_anthropic_format(messages),
            tools: MessageAdapter::tools_to_anthropic(tools),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionResult, ModelError> {
        let url = self.base.build_url(&self.api_path);
        let payload = self.build_request(messages, tools);

        info!(
            provider = self.base.id.as_str(),
            model = self.settings.model.as_str(),
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "Sending request to Anthropic"
        );

        let response: AnthropicResponse = self
            .base
            .post_with_key_header(
                &url,
                "x-api-key",
                &[("anthropic-version", ANTHROPIC_VERSION)],
                &payload,
            )
            .await?;
        debug!(
            stop_reason = response.stop_reason.as_deref(),
            blocks = response.content.len(),
            "Received response from Anthropic"
        );

        Ok(response.into_completion())
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

impl AnthropicResponse {
    fn into_completion(self) -> CompletionResult {
        let content = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(ContentBlock::text(text)),
                AnthropicBlock::ToolUse { id, name, input } => {
                    let input = match input {
                        Value::Object(map) => map,
                        _ => ToolArguments::new(),
                    };
                    Some(ContentBlock::tool_use(id, name, input))
                }
                AnthropicBlock::Unsupported => None,
            })
            .collect();
        let stop_reason = self.stop_reason.as_deref().map(StopReason::parse);
        non_empty(CompletionResult::new(content, stop_reason))
    }
}
