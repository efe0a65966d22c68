//! Application constants
//!
//! Single source of truth for paths and defaults.

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/client.toml";

/// Environment files loaded before configuration, in order
pub const ENV_PATHS: [&str; 2] = [".env", "config/.env"];

pub const DEFAULT_PROVIDER_ID: &str = "anthropic";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Tool-requesting completions allowed within a single turn
pub const DEFAULT_MAX_ROUNDS: usize = 10;

pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// MCP protocol revision sent during the initialize handshake
pub const PROTOCOL_VERSION: &str = "2025-06-18";
