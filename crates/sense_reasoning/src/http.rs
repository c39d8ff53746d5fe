use crate::error::OracleError;
use crate::oracle::{ChatMessage, GenerationParams, Oracle};
use crate::providers::ollama::{OllamaBackend, OllamaStatus};
use crate::providers::remote::RemoteBackend;
use crate::providers::{extract_content, Backend};
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use sense_core::config::LlmConfig;
use serde::Serialize;

/// Production oracle: remote OpenAI-compatible endpoint when a key is set,
/// local Ollama otherwise or when every remote candidate is unavailable.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    remote: RemoteBackend,
    local: OllamaBackend,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteStatus {
    pub base_url: String,
    pub model: String,
    pub api_key_configured: bool,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleStatus {
    pub remote: RemoteStatus,
    pub ollama: OllamaStatus,
}

impl HttpOracle {
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            remote: RemoteBackend::new(client.clone(), cfg),
            local: OllamaBackend::new(client, cfg),
        })
    }

    /// Same as [`Oracle::generate`] but keeps the failure typed.
    pub async fn try_generate(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, OracleError> {
        tracing::debug!(
            messages = messages.len(),
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            "Oracle call"
        );

        match tokio::time::timeout(params.timeout, self.dispatch(messages, params)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout),
        }
    }

    /// Remote first when configured, local Ollama otherwise or when every
    /// remote candidate is unavailable.
    async fn dispatch(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, OracleError> {
        let remote_configured = self.remote.is_configured();
        let mut sent: Option<(Backend, Response)> = None;

        if remote_configured {
            if self.remote.candidate_urls().is_empty() {
                return Err(OracleError::MissingRemoteUrl);
            }
            sent = self
                .remote
                .send(messages, params)
                .await
                .map(|resp| (Backend::Remote, resp));
            if sent.is_none() {
                tracing::warn!("Remote backend unavailable, falling back to local Ollama");
            }
        }

        let (backend, response) = match sent {
            Some(pair) => pair,
            None => {
                self.local
                    .send(messages, params, remote_configured)
                    .await?
            }
        };
        read_reply(backend, response).await
    }

    pub async fn status(&self) -> OracleStatus {
        OracleStatus {
            remote: RemoteStatus {
                base_url: self.remote.base_url().to_string(),
                model: self.remote.model().to_string(),
                api_key_configured: self.remote.is_configured(),
                candidates: self.remote.candidate_urls(),
            },
            ollama: self.local.status().await,
        }
    }
}

async fn read_reply(backend: Backend, response: Response) -> Result<String, OracleError> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| OracleError::from_transport(&e, &url))?;

    if !status.is_success() {
        tracing::warn!(
            backend = backend.as_str(),
            status = status.as_u16(),
            body = %crate::error::truncate_chars(&body, 500),
            "Oracle returned an error status"
        );
        return Err(OracleError::from_status(status.as_u16(), &body));
    }

    let value: serde_json::Value =
        serde_json::from_str(&body).map_err(|e| OracleError::Decode(e.to_string()))?;
    match extract_content(backend, &value) {
        Some(content) => {
            tracing::debug!(backend = backend.as_str(), len = content.len(), "Oracle reply");
            Ok(content)
        }
        None => {
            tracing::warn!(
                backend = backend.as_str(),
                body = %crate::error::truncate_chars(&body, 500),
                "Oracle response had no content"
            );
            Err(OracleError::MalformedResponse)
        }
    }
}

#[async_trait::async_trait]
impl Oracle for HttpOracle {
    async fn generate(&self, messages: &[ChatMessage], params: GenerationParams) -> String {
        match self.try_generate(messages, params).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Oracle call failed");
                e.to_string()
            }
        }
    }
}
