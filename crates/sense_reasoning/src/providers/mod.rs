pub mod mock;
pub mod ollama;
pub mod remote;

use serde_json::Value;

/// Which wire format a response came back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Remote,
    OllamaNative,
    OllamaCompat,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Remote => "remote",
            Backend::OllamaNative => "ollama_native",
            Backend::OllamaCompat => "ollama_openai",
        }
    }
}

/// Pull the assistant text out of a successful response body.
pub fn extract_content(backend: Backend, body: &Value) -> Option<String> {
    let content = match backend {
        Backend::OllamaNative => body.get("message")?.get("content")?,
        Backend::Remote | Backend::OllamaCompat => {
            body.get("choices")?.get(0)?.get("message")?.get("content")?
        }
    };
    content
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_openai_shape() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "你好"}}]});
        assert_eq!(extract_content(Backend::Remote, &body).as_deref(), Some("你好"));
        assert_eq!(extract_content(Backend::OllamaCompat, &body).as_deref(), Some("你好"));
        assert!(extract_content(Backend::OllamaNative, &body).is_none());
    }

    #[test]
    fn test_extract_native_shape() {
        let body = json!({"message": {"role": "assistant", "content": "{\"response\":\"嗯\"}"}, "done": true});
        assert!(extract_content(Backend::OllamaNative, &body).is_some());
    }

    #[test]
    fn test_empty_or_missing_content_is_none() {
        assert!(extract_content(Backend::Remote, &json!({"choices": []})).is_none());
        let empty = json!({"choices": [{"message": {"content": ""}}]});
        assert!(extract_content(Backend::Remote, &empty).is_none());
        let null = json!({"choices": [{"message": {"content": null}}]});
        assert!(extract_content(Backend::Remote, &null).is_none());
    }
}
