use super::ToolRuntime;
use super::validation::validate_arguments;
use crate::application::agent::errors::ToolError;
use crate::domain::types::{ContentBlock, ToolArguments, ToolOutcome};
use futures::future::join_all;
use tracing::{debug, info, warn};

/// A tool use taken from the latest assistant message.
#[derive(Debug, Clone)]
pub(crate) struct ToolRequest {
    pub id: String,
    pub name: String,
    pub input: ToolArguments,
}

impl ToolRequest {
    pub fn from_block(block: &ContentBlock) -> Option<Self> {
        match block {
            ContentBlock::ToolUse { id, name, input } => Some(Self {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            ContentBlock::Text { .. } | ContentBlock::ToolResult { .. } => None,
        }
    }
}

pub(crate) struct ToolExecution {
    pub request: ToolRequest,
    pub outcome: ToolOutcome,
}

impl ToolRuntime<'_> {
    /// Runs every request and returns the executions in request order.
    pub(crate) async fn execute_all(
        &self,
        requests: &[ToolRequest],
        parallel: bool,
    ) -> Vec<ToolExecution> {
        if parallel {
            join_all(requests.iter().map(|request| self.execute(request))).await
        } else {
            let mut executions = Vec::with_capacity(requests.len());
            for request in requests {
                executions.push(self.execute(request).await);
            }
            executions
        }
    }

    pub(crate) async fn execute(&self, request: &ToolRequest) -> ToolExecution {
        let outcome = match self.dispatch(request).await {
            Ok(outcome) if !outcome.is_error => outcome,
            Ok(outcome) => {
                warn!(tool = %request.name, "Tool reported an error");
                ToolOutcome::error(format_error(&request.name, &outcome.content))
            }
            Err(err) => {
                warn!(tool = err.tool(), %err, "Tool call failed");
                ToolOutcome::error(format_error(&request.name, &err.to_string()))
            }
        };
        info!(tool = %request.name, is_error = outcome.is_error, "Tool executed");
        ToolExecution {
            request: request.clone(),
            outcome,
        }
    }

    async fn dispatch(&self, request: &ToolRequest) -> Result<ToolOutcome, ToolError> {
        let Some(descriptor) = self.index.get(request.name.as_str()) else {
            return Err(ToolError::UnknownTool(request.name.clone()));
        };

        validate_arguments(&descriptor.input_schema, &request.input).map_err(|reason| {
            ToolError::Validation {
                tool: request.name.clone(),
                reason,
            }
        })?;

        debug!(tool = %request.name, id = %request.id, "Dispatching tool via MCP");
        self.session
            .call_tool(&request.name, request.input.clone())
            .await
            .map_err(|source| ToolError::Execution {
                tool: request.name.clone(),
                source,
            })
    }
}

pub(crate) fn format_error(tool: &str, message: &str) -> String {
    format!("Error calling tool {tool}: {message}")
}
