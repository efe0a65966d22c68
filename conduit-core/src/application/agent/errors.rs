use crate::application::tooling::ToolInvokeError;
use crate::infrastructure::model::ModelError;
use thiserror::Error;

/// Failures that end a turn early.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Session(#[from] ToolInvokeError),
    #[error("turn requested tools more than {limit} times")]
    RoundLimitExceeded { limit: usize },
    #[error("turn cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(err) => err.user_message(),
            AgentError::Session(err) => err.user_message(),
            AgentError::RoundLimitExceeded { limit } => format!(
                "The model kept asking for tools after {limit} rounds; the turn was stopped."
            ),
            AgentError::Cancelled => "Cancelled.".to_string(),
        }
    }
}

/// Why a single tool call produced an error result. These never abort a
/// turn; they are reported back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {reason}")]
    Validation { tool: String, reason: String },
    #[error("{source}")]
    Execution {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::UnknownTool(tool) => tool,
            ToolError::Validation { tool, .. } | ToolError::Execution { tool, .. } => tool,
        }
    }
}
