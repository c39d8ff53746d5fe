use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

/// Process settings: where the oracle lives, where the gateway binds and which
/// training policy file to read. Training policy itself is in `training`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SenseConfig {
    pub llm: LlmConfig,
    pub gateway: GatewayConfig,
    pub training: TrainingSettings,
}

impl SenseConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: SenseConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Several vendor-specific names are
    /// accepted for the same setting; the first non-empty one wins.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        if let Some(v) = first(&["LLM_API_URL", "OPENAI_API_BASE"]) {
            self.llm.base_url = v;
        }
        if let Some(v) = first(&[
            "LLM_API_KEY",
            "OPENAI_API_KEY",
            "DASHSCOPE_API_KEY",
            "QWEN_API_KEY",
            "DEEPSEEK_API_KEY",
        ]) {
            self.llm.api_key = v;
        }
        if let Some(v) = first(&["LLM_MODEL", "OPENAI_MODEL"]) {
            self.llm.model = v;
        }
        if let Some(v) = first(&["OLLAMA_BASE_URL"]) {
            self.llm.ollama_base_url = v;
        }
        if let Some(v) = first(&["OLLAMA_MODEL"]) {
            self.llm.ollama_model = v;
        }
        if let Some(v) = first(&["SENSE_TRAINING_CONFIG", "PMTRAINER_CONFIG_PATH"]) {
            self.training.config_path = PathBuf::from(v);
        }
        if let Some(v) = first(&["SENSE_HOST"]) {
            self.gateway.host = v;
        }
        if let Some(v) = first(&["SENSE_PORT"]) {
            if let Ok(port) = v.parse() {
                self.gateway.port = port;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL of the remote backend.
    pub base_url: String,
    /// Remote is only attempted when a key is present.
    pub api_key: String,
    pub model: String,
    /// Local fallback backend.
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub max_tokens: u32,
    /// Bound for persona turns and evaluation calls.
    pub request_timeout_secs: u64,
    /// Shorter bound for the opening line.
    pub opening_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            api_key: String::new(),
            model: "qwen-plus".to_string(),
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            ollama_model: "qwen2.5:7b-instruct".to_string(),
            max_tokens: 2000,
            request_timeout_secs: 300,
            opening_timeout_secs: 45,
        }
    }
}

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Idle sessions older than this are swept. Zero keeps them forever.
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            session_ttl_secs: 6 * 60 * 60,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// `.toml` or `.json` policy file; missing → built-in defaults.
    pub config_path: PathBuf,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("training.toml"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
