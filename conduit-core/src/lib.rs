pub mod application;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{agent, tooling};
pub use config::{AppConfig, ModelProviderConfig, ServerConfig};
pub use domain::types;
pub use infrastructure::model;
