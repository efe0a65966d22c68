//! Message adapters - convert the conversation to provider wire formats

use crate::domain::types::{ContentBlock, Message, Role, ToolDescriptor};
use serde_json::{Value, json};

/// Adapter for converting messages to different API formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// Anthropic Messages format.
    ///
    /// Empty text blocks are dropped, messages left without content are
    /// skipped, and consecutive messages with the same role are merged so the
    /// result alternates user/assistant.
    pub fn to_anthropic_format(messages: &[Message]) -> Vec<Value> {
        let mut output: Vec<(Role, Vec<Value>)> = Vec::new();

        for message in messages {
            let blocks: Vec<Value> = message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } if text.is_empty() => None,
                    ContentBlock::Text { text } => Some(json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentBlock::ToolUse { id, name, input } => Some(json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input,
                    })),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => Some(json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": content,
                        "is_error": is_error,
                    })),
                })
                .collect();

            if blocks.is_empty() {
                continue;
            }

            match output.last_mut() {
                Some((role, existing)) if *role == message.role => existing.extend(blocks),
                _ => output.push((message.role, blocks)),
            }
        }

        output
            .into_iter()
            .map(|(role, content)| {
                json!({
                    "role": role.as_str(),
                    "content": content,
                })
            })
            .collect()
    }

    pub fn tools_to_anthropic(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                let mut entry = json!({
                    "name": tool.name,
                    "input_schema": tool.input_schema,
                });
                if let Some(description) = &tool.description {
                    entry["description"] = Value::String(description.clone());
                }
                entry
            })
            .collect()
    }

    /// OpenAI chat-completions format.
    ///
    /// Tool results become `role: tool` messages; assistant tool uses become
    /// `tool_calls` with JSON-encoded arguments.
    pub fn to_openai_format(messages: &[Message], system_prompt: Option<&str>) -> Vec<Value> {
        let mut output = Vec::new();
        if let Some(prompt) = system_prompt {
            output.push(json!({ "role": "system", "content": prompt }));
        }

        for message in messages {
            let mut texts = Vec::new();
            let mut tool_calls = Vec::new();
            let mut tool_messages = Vec::new();

            for block in &message.content {
                match block {
                    ContentBlock::Text { text } => {
                        if !text.is_empty() {
                            texts.push(text.as_str());
                        }
                    }
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": Value::Object(input.clone()).to_string(),
                        }
                    })),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => tool_messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    })),
                }
            }

            output.extend(tool_messages);

            match message.role {
                Role::Assistant => {
                    if texts.is_empty() && tool_calls.is_empty() {
                        continue;
                    }
                    let content = if texts.is_empty() {
                        Value::Null
                    } else {
                        Value::String(texts.join("\n"))
                    };
                    let mut entry = json!({ "role": "assistant", "content": content });
                    if !tool_calls.is_empty() {
                        entry["tool_calls"] = Value::Array(tool_calls);
                    }
                    output.push(entry);
                }
                Role::User => {
                    if !texts.is_empty() {
                        output.push(json!({ "role": "user", "content": texts.join("\n") }));
                    }
                }
            }
        }

        output
    }

    pub fn tools_to_openai(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect()
    }
}
