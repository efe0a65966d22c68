use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("no connected MCP server provides tool '{tool}'")]
    UnknownTool { tool: String },
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' request timeout after {millis} ms")]
    Timeout { server: String, millis: u128 },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
}

impl ToolInvokeError {
    pub fn user_message(&self) -> String {
        match self {
            ToolInvokeError::Spawn { server, .. } => {
                format!("Could not start tool server '{server}'. Check the configured command.")
            }
            ToolInvokeError::Timeout { server, .. } => {
                format!("Tool server '{server}' did not answer in time.")
            }
            ToolInvokeError::Terminated { server } => {
                format!("Tool server '{server}' stopped unexpectedly.")
            }
            other => other.to_string(),
        }
    }
}
