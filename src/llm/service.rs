use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::core::config::LlmSettings;
use crate::core::errors::GenerationError;
use crate::llm::openai::OpenAiProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

const EMBED_BATCH_SIZE: usize = 64;

/// Shared handle to the generation capability. Cloning is cheap.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    temperature: Option<f64>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            temperature: None,
            limiter: None,
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(Arc::new(OpenAiProvider::new(settings)))
            .with_temperature(settings.temperature)
            .with_requests_per_minute(settings.requests_per_minute)
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Delays outbound calls to stay under the quota. Failed calls are never retried.
    pub fn with_requests_per_minute(mut self, rpm: Option<u32>) -> Self {
        self.limiter = rpm
            .and_then(NonZeroU32::new)
            .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, GenerationError> {
        let mut request = ChatRequest::new(messages);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        self.throttle().await;
        self.provider.chat(request).await
    }

    /// `generate(prompt, context?)`: the context, when given, is supplied as a system message.
    pub async fn generate(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            messages.push(ChatMessage::system(context));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(messages).await
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerationError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| GenerationError::Failed("provider returned no embedding".to_string()))
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GenerationError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            self.throttle().await;
            let vectors = self.provider.embed(batch).await?;
            if vectors.len() != batch.len() {
                return Err(GenerationError::Failed(format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
