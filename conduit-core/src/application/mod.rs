//! # Application Module
//!
//! ## Submodules
//!
//! - [`agent`] - Turn orchestration and the chat session surface
//! - [`tooling`] - MCP server processes and the tool session they expose

pub mod agent;
pub mod tooling;
