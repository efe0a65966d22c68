//! Model clients

mod anthropic;
mod base;
mod openai;

pub use anthropic::AnthropicClient;
pub use base::HttpClientBase;
pub use openai::OpenAIClient;
