use super::errors::AgentError;
use super::models::{AgentOptions, TurnOutcome};
use super::runner::Orchestrator;
use crate::application::tooling::ToolSession;
use crate::domain::types::Conversation;
use crate::infrastructure::model::ModelProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One interactive conversation: the query-in, answer-out surface the shell
/// talks to.
pub struct ChatSession {
    orchestrator: Orchestrator,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        session: Arc<dyn ToolSession>,
        options: AgentOptions,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(model, session, options),
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Runs one turn against the catalog as it stands right now, so tools
    /// added or removed between turns are picked up.
    pub async fn run_turn(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let catalog = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            catalog = self.orchestrator.session().list_tools() => catalog?,
        };
        debug!(
            session_id = self.conversation.id(),
            tools = catalog.len(),
            "Fetched tool catalogue"
        );
        self.orchestrator
            .run_turn(&mut self.conversation, query, &catalog, cancel)
            .await
    }
}
