//! OpenAI-compatible client implementation

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

/// OpenAI-compatible client (works with OpenAI, Mistral, Groq, local gateways, etc.)
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
    api_path: String,
    settings: ModelSettings,
}

impl OpenAIClient {
    pub fn from_config(config: &ModelProviderConfig, settings: ModelSettings) -> Self {
        let api_key = resolve_api_key(&config.id, config.api_key.as_deref());
        Self {
            base: HttpClientBase::new(config.id.clone(), config.endpoint.clone(), api_key),
            api_path: config
                .api_path
                .clone()
                .unwrap_or_else(|| "/v1/chat/completions".to_string()),
            settings,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAIClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionResult, ModelError> {
        let url = self.base.build_url(&self.api_path);

        let payload = OpenAIRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            messages: MessageAdapter::to_openai_format(
                messages,
                self.settings.system_prompt.as_deref(),
            ),
            tools: MessageAdapter::tools_to_openai(tools),
            stream: false,
        };

        info!(
            provider = self.base.id.as_str(),
            model = self.settings.model.as_str(),
            messages = payload.messages.len(),
            "Sending request to OpenAI-compatible provider"
        );

        let response: OpenAIResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!("Received response from OpenAI-compatible provider");

        into_completion(&self.base.id, response)
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn into_completion(
    provider: &str,
    response: OpenAIResponse,
) -> Result<CompletionResult, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::invalid_response(provider, "missing choices"))?;
    let stop_reason = choice.finish_reason.as_deref().map(StopReason::parse);

    let mut content = Vec::new();
    if let Some(message) = choice.message {
        if let Some(text) = message.content {
            content.push(ContentBlock::text(text));
        }
        for call in message.tool_calls {
            let input = parse_arguments(provider, &call.function.arguments)?;
            content.push(ContentBlock::tool_use(call.id, call.function.name, input));
        }
    }

    Ok(non_empty(CompletionResult::new(content, stop_reason)))
}

fn parse_arguments(provider: &str, raw: &str) -> Result<ToolArguments, ModelError> {
    if raw.trim().is_empty() {
        return Ok(ToolArguments::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ModelError::invalid_response(
            provider,
            "tool call arguments are not a JSON object",
        )),
        Err(err) => Err(ModelError::invalid_response(
            provider,
            format!("tool call arguments are not valid JSON: {err}"),
        )),
    }
}
