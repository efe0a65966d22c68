mod error;
mod interface;
mod manager;
mod process;

pub use error::ToolInvokeError;
pub use interface::ToolSession;
pub use manager::ServerManager;
pub use process::McpProcess;
