use async_trait::async_trait;

use super::error::ToolInvokeError;
use crate::domain::types::{ToolArguments, ToolDescriptor, ToolOutcome};

/// The session side of the agent: discovers tools and executes them.
///
/// A tool that runs and reports failure comes back as `Ok` with
/// `is_error = true`; `Err` is reserved for the call not completing.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolOutcome, ToolInvokeError>;
}
