use async_trait::async_trait;
use sense_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters and the hard deadline for one oracle call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 2000,
            timeout: Duration::from_secs(300),
        }
    }
}

impl GenerationParams {
    pub fn persona_turn() -> Self {
        Self {
            temperature: 0.7,
            ..Self::default()
        }
    }

    pub fn opening() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 300,
            timeout: Duration::from_secs(45),
        }
    }

    pub fn evaluation() -> Self {
        Self {
            temperature: 0.3,
            ..Self::default()
        }
    }
}

/// Per-purpose parameter sets, derived once from process config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleBudget {
    pub turn: GenerationParams,
    pub opening: GenerationParams,
    pub evaluation: GenerationParams,
}

impl Default for OracleBudget {
    fn default() -> Self {
        Self {
            turn: GenerationParams::persona_turn(),
            opening: GenerationParams::opening(),
            evaluation: GenerationParams::evaluation(),
        }
    }
}

impl OracleBudget {
    pub fn from_config(cfg: &LlmConfig) -> Self {
        let request_timeout = Duration::from_secs(cfg.request_timeout_secs.max(1));
        let defaults = Self::default();
        Self {
            turn: GenerationParams {
                max_tokens: cfg.max_tokens,
                timeout: request_timeout,
                ..defaults.turn
            },
            opening: GenerationParams {
                timeout: Duration::from_secs(cfg.opening_timeout_secs.max(1)),
                ..defaults.opening
            },
            evaluation: GenerationParams {
                max_tokens: cfg.max_tokens,
                timeout: request_timeout,
                ..defaults.evaluation
            },
        }
    }
}

/// Opaque text generator.
///
/// Implementations never fail: transport and protocol problems come back as a
/// bracketed diagnostic string (see [`is_diagnostic`]) so the caller's normal
/// reply parsing and fallback path handles them.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage], params: GenerationParams) -> String;
}

/// True when `text` looks like an adapter diagnostic rather than model output.
pub fn is_diagnostic(text: &str) -> bool {
    let t = text.trim();
    t.starts_with('[') && t.ends_with(']') && !t.starts_with("[{")
}
