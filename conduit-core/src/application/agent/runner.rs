use super::errors::AgentError;
use super::models::{AgentOptions, ToolStep, TurnOutcome, TurnState};
use super::runtime::{ToolExecution, ToolRequest, ToolRuntime};
use crate::application::tooling::ToolSession;
use crate::domain::types::{
    CompletionResult, ContentBlock, Conversation, Message, Role, ToolDescriptor,
};
use crate::infrastructure::model::ModelProvider;
use crate::infrastructure::model::types::non_empty;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one turn: completion, tool execution, and back, until the model
/// answers without requesting tools.
pub struct Orchestrator {
    model: Arc<dyn ModelProvider>,
    session: Arc<dyn ToolSession>,
    options: AgentOptions,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        session: Arc<dyn ToolSession>,
        options: AgentOptions,
    ) -> Self {
        Self {
            model,
            session,
            options,
        }
    }

    pub fn session(&self) -> &Arc<dyn ToolSession> {
        &self.session
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Appends the query and every message of the turn to `conversation`.
    ///
    /// On error the conversation still ends with a complete message: a
    /// cancelled tool round removes the assistant message whose tool uses
    /// were never answered.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        query: &str,
        catalog: &[ToolDescriptor],
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let session_id = conversation.id().to_string();
        info!(session_id = %session_id, tools = catalog.len(), "Turn started");

        conversation.push(Message::user_text(query));
        let runtime = ToolRuntime::new(catalog, self.session.as_ref());

        let mut state = TurnState::AwaitingCompletion;
        let mut answer: Vec<String> = Vec::new();
        let mut steps = Vec::new();
        let mut rounds = 0;
        let mut tool_rounds = 0;

        loop {
            debug!(session_id = %session_id, round = rounds, ?state, "Turn state");
            match state {
                TurnState::AwaitingCompletion => {
                    let completion = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(abort(&session_id, AgentError::Cancelled, &answer));
                        }
                        result = self.model.complete(conversation.messages(), catalog) => {
                            result.map_err(|err| abort(&session_id, err.into(), &answer))?
                        }
                    };
                    let completion = non_empty(completion);
                    rounds += 1;

                    let has_tool_use = completion.has_tool_use();
                    if has_tool_use && tool_rounds == self.options.max_rounds {
                        let err = AgentError::RoundLimitExceeded {
                            limit: self.options.max_rounds,
                        };
                        return Err(abort(&session_id, err, &answer));
                    }

                    answer.extend(completion.texts().map(str::to_string));
                    let CompletionResult { content, .. } = completion;
                    conversation.push(Message::assistant(content));

                    state = if has_tool_use {
                        tool_rounds += 1;
                        TurnState::ExecutingTools
                    } else {
                        TurnState::Done
                    };
                }
                TurnState::ExecutingTools => {
                    let checkpoint = conversation.len() - 1;
                    let requests: Vec<ToolRequest> = conversation
                        .last()
                        .map(|message| {
                            message
                                .content
                                .iter()
                                .filter_map(ToolRequest::from_block)
                                .collect()
                        })
                        .unwrap_or_default();
                    debug!(
                        session_id = %session_id,
                        round = rounds,
                        count = requests.len(),
                        "Executing tool uses"
                    );

                    let parallel = self.options.parallel_tool_calls;
                    let executions = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            conversation.truncate(checkpoint);
                            return Err(abort(&session_id, AgentError::Cancelled, &answer));
                        }
                        executions = runtime.execute_all(&requests, parallel) => executions,
                    };

                    let mut results = Vec::with_capacity(executions.len());
                    for ToolExecution { request, outcome } in executions {
                        steps.push(ToolStep {
                            tool: request.name,
                            input: request.input,
                            is_error: outcome.is_error,
                            output: outcome.content.clone(),
                        });
                        results.push(ContentBlock::tool_result(request.id, outcome));
                    }
                    conversation.push(Message::new(Role::User, results));
                    state = TurnState::AwaitingCompletion;
                }
                // Aborts return early, so only `Done` ends the loop.
                TurnState::Done | TurnState::Aborted => break,
            }
        }

        info!(
            session_id = %session_id,
            rounds,
            tool_calls = steps.len(),
            "Turn finished"
        );
        Ok(TurnOutcome {
            answer: answer.join("\n"),
            steps,
            rounds,
        })
    }
}

fn abort(session_id: &str, err: AgentError, answer: &[String]) -> AgentError {
    debug!(
        session_id,
        state = ?TurnState::Aborted,
        discarded_texts = answer.len(),
        "Turn aborted"
    );
    warn!(session_id, %err, "Turn failed");
    err
}
