//! Local Ollama fallback.
//!
//! Ollama serves both its native `/api/chat` (which can force JSON output)
//! and an OpenAI-compatible `/v1/chat/completions`. Native is tried first.

use super::Backend;
use crate::error::OracleError;
use crate::oracle::{ChatMessage, GenerationParams};
use reqwest::{Client, Response, StatusCode};
use sense_core::config::LlmConfig;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

const TAGS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

/// Result of the `/api/tags` probe, as reported by the status endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OllamaStatus {
    pub base_url: String,
    pub model: String,
    pub reachable: bool,
    pub model_ready: bool,
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OllamaBackend {
    pub fn new(client: Client, cfg: &LlmConfig) -> Self {
        Self {
            client,
            base_url: cfg.ollama_base_url.trim().trim_end_matches('/').to_string(),
            model: cfg.ollama_model.trim().to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Installed model names, or a short reason the daemon is unreachable.
    pub async fn list_models(&self) -> Result<Vec<String>, String> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(TAGS_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if resp.status() != StatusCode::OK {
            return Err(format!("HTTP {}", resp.status().as_u16()));
        }
        let body: Value = resp.json().await.map_err(|e| e.to_string())?;
        let names = body
            .get("models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    pub async fn status(&self) -> OllamaStatus {
        let (reachable, models, error) = match self.list_models().await {
            Ok(models) => (true, models, None),
            Err(e) => (false, Vec::new(), Some(e)),
        };
        OllamaStatus {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            reachable,
            model_ready: models.iter().any(|m| m == &self.model),
            models,
            error,
        }
    }

    fn native_payload(&self, messages: &[ChatMessage], params: GenerationParams) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        })
    }

    fn compat_payload(&self, messages: &[ChatMessage], params: GenerationParams) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        })
    }

    /// Probe, check the model is pulled, then try native and compatible chat.
    /// `remote_configured` only changes which diagnostic is reported.
    pub async fn send(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
        remote_configured: bool,
    ) -> Result<(Backend, Response), OracleError> {
        tracing::info!(base = %self.base_url, model = %self.model, "Trying local Ollama");

        let models = self.list_models().await.map_err(|reason| {
            if remote_configured {
                OracleError::LocalUnavailable {
                    base: self.base_url.clone(),
                    reason,
                }
            } else {
                OracleError::NoBackend {
                    base: self.base_url.clone(),
                }
            }
        })?;

        if !models.iter().any(|m| m == &self.model) {
            return Err(OracleError::ModelNotReady {
                model: self.model.clone(),
            });
        }

        let attempts = [
            (
                Backend::OllamaNative,
                format!("{}/api/chat", self.base_url),
                self.native_payload(messages, params),
            ),
            (
                Backend::OllamaCompat,
                format!("{}/v1/chat/completions", self.base_url),
                self.compat_payload(messages, params),
            ),
        ];

        for (backend, url, body) in attempts {
            let result = self
                .client
                .post(&url)
                .json(&body)
                .timeout(params.timeout)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    tracing::debug!(url = %url, "Ollama endpoint returned 404, trying next");
                }
                Ok(resp) => return Ok((backend, resp)),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Ollama endpoint failed");
                }
            }
        }

        if remote_configured {
            Err(OracleError::AllBackendsFailed)
        } else {
            Err(OracleError::LocalEndpointsFailed {
                model: self.model.clone(),
                base: self.base_url.clone(),
            })
        }
    }
}
