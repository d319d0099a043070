use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::GenerationError;

/// Generation + embedding capability. Implementations must be safe to call
/// concurrently from many requests.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name for logs (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, GenerationError>;

    /// one embedding per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, GenerationError>;
}
