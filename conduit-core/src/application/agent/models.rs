use crate::config::AppConfig;
use crate::constants::DEFAULT_MAX_ROUNDS;
use crate::domain::types::ToolArguments;
use serde::Serialize;

/// One tool call made during a turn, kept for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStep {
    pub tool: String,
    pub input: ToolArguments,
    pub is_error: bool,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Non-empty text blocks of the turn, newline-joined in emission order
    pub answer: String,
    pub steps: Vec<ToolStep>,
    /// Inference calls made
    pub rounds: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingCompletion,
    ExecutingTools,
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Completions per turn that may request tools
    pub max_rounds: usize,
    pub parallel_tool_calls: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            parallel_tool_calls: true,
        }
    }
}

impl From<&AppConfig> for AgentOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            parallel_tool_calls: config.parallel_tool_calls,
        }
    }
}
