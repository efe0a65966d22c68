//! Model traits

use super::types::ModelError;
use crate::domain::types::{CompletionResult, Message, ToolDescriptor};
use async_trait::async_trait;

/// An inference endpoint that continues a conversation.
///
/// Implementations return at least one content block; an empty completion
/// from the wire is reported as a single empty text block.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider id used in logs and error messages
    fn id(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionResult, ModelError>;
}
