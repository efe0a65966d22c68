mod errors;
mod models;
mod runner;
mod runtime;
mod session;

#[cfg(test)]
mod tests;

pub use errors::{AgentError, ToolError};
pub use models::{AgentOptions, ToolStep, TurnOutcome, TurnState};
pub use runner::Orchestrator;
pub use runtime::validate_arguments;
pub use session::ChatSession;
