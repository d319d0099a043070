//! Test-only scripted LLM provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::GenerationError;

type Responder = Arc<dyn Fn(&ChatRequest) -> Result<String, GenerationError> + Send + Sync>;

pub const MOCK_EMBEDDING_DIMS: usize = 64;

/// Replies come from the script first, then the responder, then `default_response`.
/// Embeddings are deterministic bag-of-words hashes, so texts sharing words score higher.
#[derive(Clone)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<Result<String, GenerationError>>>>,
    responder: Option<Responder>,
    pub default_response: String,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    embed_calls: Arc<AtomicUsize>,
    embed_error: Option<GenerationError>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            responder: None,
            default_response: "mock response".to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            embed_error: None,
        }
    }
}

impl MockProvider {
    pub fn with_responses(responses: Vec<&str>) -> Self {
        Self::with_script(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_script(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    pub fn failing_embeddings(mut self, err: GenerationError) -> Self {
        self.embed_error = Some(err);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; MOCK_EMBEDDING_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf29ce484222325u64, |acc, b| {
                (acc ^ b as u64).wrapping_mul(0x100000001b3)
            });
        vector[(hash % MOCK_EMBEDDING_DIMS as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        if let Some(responder) = &self.responder {
            return responder(&request);
        }
        Ok(self.default_response.clone())
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, GenerationError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.embed_error {
            return Err(err.clone());
        }
        Ok(inputs.iter().map(|text| bag_of_words(text)).collect())
    }
}
