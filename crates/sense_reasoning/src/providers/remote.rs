//! Remote OpenAI-compatible backend.

use crate::oracle::{ChatMessage, GenerationParams};
use reqwest::{Client, Response, StatusCode};
use sense_core::config::LlmConfig;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl RemoteBackend {
    pub fn new(client: Client, cfg: &LlmConfig) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
            api_key: cfg.api_key.trim().to_string(),
            model: cfg.model.clone(),
        }
    }

    /// Remote is only attempted with a key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `{base}/chat/completions`, then `{base}/v1/chat/completions` unless the
    /// base already ends in `/v1`.
    pub fn candidate_urls(&self) -> Vec<String> {
        let base = &self.base_url;
        if base.is_empty() {
            return Vec::new();
        }
        if base.ends_with("/v1") {
            return vec![format!("{base}/chat/completions")];
        }
        vec![
            format!("{base}/chat/completions"),
            format!("{base}/v1/chat/completions"),
        ]
    }

    pub fn payload(&self, messages: &[ChatMessage], params: GenerationParams) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        })
    }

    /// First candidate that answers with anything other than 404.
    /// `None` when every candidate was 404 or unreachable.
    pub async fn send(&self, messages: &[ChatMessage], params: GenerationParams) -> Option<Response> {
        let body = self.payload(messages, params);
        for url in self.candidate_urls() {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .timeout(params.timeout)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    tracing::debug!(url = %url, "Remote endpoint returned 404, trying next");
                }
                Ok(resp) => return Some(resp),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Remote endpoint unreachable");
                }
            }
        }
        None
    }
}
