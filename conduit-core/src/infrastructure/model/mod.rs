//! Model infrastructure module
//!
//! # Structure
//! - `types` - settings and error types
//! - `traits` - the `ModelProvider` seam used by the orchestrator
//! - `adapter` - conversation to wire-format conversion
//! - `factory` - provider selection from configuration
//! - `clients` - HTTP client implementations

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod traits;
pub mod types;

pub use factory::ProviderFactory;
pub use traits::ModelProvider;
pub use types::{ModelError, ModelSettings};
