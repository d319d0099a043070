pub mod json;
pub mod openai;
pub mod provider;
pub mod service;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use json::parse_json_from_text;
pub use provider::LlmProvider;
pub use service::LlmService;
pub use types::{ChatMessage, ChatRequest};
