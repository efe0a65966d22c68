pub mod app;
pub mod error;
pub mod loader;
pub mod provider;
pub mod server;

pub use app::AppConfig;
pub use error::ConfigError;
pub use loader::ensure_env_loaded;
pub use provider::ModelProviderConfig;
pub use server::ServerConfig;
