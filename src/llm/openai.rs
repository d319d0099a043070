use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::GenerationError;

/// OpenAI-compatible `/chat/completions` + `/embeddings` client.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            embedding_model: settings.embedding_model.clone(),
            client: Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, GenerationError> {
        let url = format!("{}/{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(GenerationError::failed)?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = res.text().await.unwrap_or_default();
            return Err(GenerationError::RateLimited(error_message(&text, status)));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            tracing::error!("OpenAI API error {}: {}", status, text);
            return Err(GenerationError::Failed(error_message(&text, status)));
        }

        res.json().await.map_err(GenerationError::failed)
    }
}

fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("request failed with status {}", status))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, GenerationError> {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        let payload = self.post("chat/completions", &body).await?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::Failed("empty response from openai".to_string()))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, GenerationError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let payload = self.post("embeddings", &body).await?;

        let data = payload["data"]
            .as_array()
            .ok_or_else(|| GenerationError::Failed("embedding response has no data".to_string()))?;

        // The API may return items out of order; `index` is authoritative.
        let mut embeddings = vec![Vec::new(); inputs.len()];
        for (position, item) in data.iter().enumerate() {
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            let vector: Vec<f32> = item["embedding"]
                .as_array()
                .map(|vals| {
                    vals.iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect()
                })
                .unwrap_or_default();
            if let Some(slot) = embeddings.get_mut(index) {
                *slot = vector;
            }
        }

        if embeddings.iter().any(Vec::is_empty) {
            return Err(GenerationError::Failed(format!(
                "expected {} embeddings, received {}",
                inputs.len(),
                data.len()
            )));
        }

        Ok(embeddings)
    }
}
