use super::error::ToolInvokeError;
use super::interface::ToolSession;
use super::process::McpProcess;
use crate::config::ServerConfig;
use crate::domain::types::{ToolArguments, ToolDescriptor, ToolOutcome};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Owns every configured MCP server and presents them as one tool session.
///
/// Servers keep their configuration order. When two servers advertise the
/// same tool name, the earlier server owns it.
pub struct ServerManager {
    processes: Vec<McpProcess>,
}

impl ServerManager {
    pub fn new(configs: Vec<ServerConfig>, request_timeout: Duration) -> Self {
        let processes = configs
            .into_iter()
            .map(|config| McpProcess::new(config, request_timeout))
            .collect();
        Self { processes }
    }

    /// Starts every server and completes its handshake. On the first failure
    /// the servers already started are shut down again.
    pub async fn connect(
        configs: Vec<ServerConfig>,
        request_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        let manager = Self::new(configs, request_timeout);
        for process in &manager.processes {
            if let Err(err) = process.ensure_running().await {
                manager.shutdown().await;
                return Err(err);
            }
            info!(server = process.name(), "Connected to MCP server");
        }
        Ok(manager)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.processes.iter().map(McpProcess::name).collect()
    }

    pub async fn shutdown(&self) {
        for process in &self.processes {
            process.shutdown().await;
        }
    }

    async fn owner_of(&self, tool: &str) -> Option<&McpProcess> {
        for process in &self.processes {
            if let Err(err) = process.ensure_running().await {
                warn!(server = process.name(), %err, "Skipping unavailable MCP server");
                continue;
            }
            if process.provides(tool).await {
                return Some(process);
            }
        }
        None
    }
}

#[async_trait]
impl ToolSession for ServerManager {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        for process in &self.processes {
            for descriptor in process.list_tools().await? {
                if seen.insert(descriptor.name.clone()) {
                    merged.push(descriptor);
                } else {
                    warn!(
                        server = process.name(),
                        tool = %descriptor.name,
                        "Tool already provided by an earlier server; ignoring"
                    );
                }
            }
        }
        Ok(merged)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolOutcome, ToolInvokeError> {
        let process = self
            .owner_of(name)
            .await
            .ok_or_else(|| ToolInvokeError::UnknownTool {
                tool: name.to_string(),
            })?;
        process.call_tool(name, arguments).await
    }
}
