use thiserror::Error;

/// Why an oracle call produced no model text.
///
/// The `Display` form is the bracketed diagnostic handed back to callers in
/// place of a reply.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    #[error("[LLM_API_URL 未配置]")]
    MissingRemoteUrl,

    #[error("[LLM_API_KEY 未配置，且本地 Ollama 未启动（{base}）]")]
    NoBackend { base: String },

    #[error("[本地 Ollama 不可用（{base}）：{reason}]")]
    LocalUnavailable { base: String, reason: String },

    #[error("[LLM调用失败：远程不可用且本地 Ollama 未启动]")]
    AllBackendsFailed,

    #[error("[本地 Ollama 模型未就绪：{model}（请等待下载完成或执行：ollama pull {model}）]")]
    ModelNotReady { model: String },

    #[error("[本地 Ollama 模型未就绪或接口不可用：{model}（base={base}）]")]
    LocalEndpointsFailed { model: String, base: String },

    #[error("[API参数错误: {0}]")]
    BadRequest(String),

    #[error("[API密钥无效或未配置（401）]")]
    Unauthorized,

    #[error("[API访问被拒绝，可能是网络限制]")]
    Forbidden,

    #[error("[API请求频率过高，请稍后重试]")]
    RateLimited,

    #[error("[API服务器错误，请稍后重试]")]
    ServerError(u16),

    #[error("[API错误 {0}]")]
    Status(u16),

    #[error("[API返回格式异常]")]
    MalformedResponse,

    #[error("[解析响应失败: {0}]")]
    Decode(String),

    #[error("[API请求超时，请重试]")]
    Timeout,

    #[error("[无法连接到API服务器: {0}]")]
    Connect(String),

    #[error("[API调用失败: {0}]")]
    Request(String),
}

impl OracleError {
    /// Map a non-success HTTP status plus its body to a diagnostic.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            400 => OracleError::BadRequest(bad_request_message(body)),
            401 => OracleError::Unauthorized,
            403 => OracleError::Forbidden,
            429 => OracleError::RateLimited,
            500..=599 => OracleError::ServerError(status),
            _ => OracleError::Status(status),
        }
    }

    pub fn from_transport(err: &reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            OracleError::Timeout
        } else if err.is_connect() {
            OracleError::Connect(url.to_string())
        } else {
            OracleError::Request(truncate_chars(&err.to_string(), 100))
        }
    }
}

fn bad_request_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| truncate_chars(m, 100))
        })
        .unwrap_or_else(|| truncate_chars(body, 100))
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
