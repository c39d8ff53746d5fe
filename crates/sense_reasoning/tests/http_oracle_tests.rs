//! HTTP oracle against mocked remote and Ollama endpoints.

use sense_core::config::LlmConfig;
use sense_reasoning::{ChatMessage, GenerationParams, HttpOracle, Oracle, OracleError};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_config(base: &str) -> LlmConfig {
    LlmConfig {
        base_url: base.to_string(),
        api_key: "sk-test".to_string(),
        model: "test-model".to_string(),
        // Nothing listens on port 9; local fallback is unreachable.
        ollama_base_url: "http://127.0.0.1:9".to_string(),
        ..LlmConfig::default()
    }
}

fn local_config(ollama: &str) -> LlmConfig {
    LlmConfig {
        api_key: String::new(),
        ollama_base_url: ollama.to_string(),
        ollama_model: "qwen2.5:7b-instruct".to_string(),
        ..LlmConfig::default()
    }
}

fn messages() -> Vec<ChatMessage> {
    vec![ChatMessage::system("你是用户"), ChatMessage::user("你好")]
}

fn params() -> GenerationParams {
    GenerationParams {
        timeout: Duration::from_secs(5),
        ..GenerationParams::persona_turn()
    }
}

fn openai_body(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

// ============================================================================
// Remote backend
// ============================================================================

#[tokio::test]
async fn test_remote_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body("{\"response\":\"嗯\"}")))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&remote_config(&server.uri())).unwrap();
    let out = oracle.generate(&messages(), params()).await;
    assert_eq!(out, "{\"response\":\"嗯\"}");
}

#[tokio::test]
async fn test_remote_404_tries_next_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body("second")))
        .expect(1)
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&remote_config(&server.uri())).unwrap();
    assert_eq!(oracle.generate(&messages(), params()).await, "second");
}

#[tokio::test]
async fn test_remote_401_is_diagnostic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&remote_config(&server.uri())).unwrap();
    let err = oracle.try_generate(&messages(), params()).await.unwrap_err();
    assert_eq!(err, OracleError::Unauthorized);
    let text = oracle.generate(&messages(), params()).await;
    assert_eq!(text, "[API密钥无效或未配置（401）]");
}

#[tokio::test]
async fn test_remote_missing_content_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&remote_config(&server.uri())).unwrap();
    let err = oracle.try_generate(&messages(), params()).await.unwrap_err();
    assert_eq!(err, OracleError::MalformedResponse);
}

#[tokio::test]
async fn test_slow_remote_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_body("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&remote_config(&server.uri())).unwrap();
    let quick = GenerationParams {
        timeout: Duration::from_millis(200),
        ..params()
    };
    let text = oracle.generate(&messages(), quick).await;
    assert_eq!(text, "[API请求超时，请重试]");
}

#[tokio::test]
async fn test_empty_remote_url_with_key() {
    let cfg = LlmConfig {
        base_url: "  ".to_string(),
        api_key: "sk-test".to_string(),
        ..LlmConfig::default()
    };
    let oracle = HttpOracle::new(&cfg).unwrap();
    let err = oracle.try_generate(&messages(), params()).await.unwrap_err();
    assert_eq!(err, OracleError::MissingRemoteUrl);
}

// ============================================================================
// Local Ollama fallback
// ============================================================================

async fn mount_tags(server: &MockServer, models: &[&str]) {
    let models: Vec<_> = models.iter().map(|m| json!({"name": m})).collect();
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": models})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_ollama_native_without_key() {
    let server = MockServer::start().await;
    mount_tags(&server, &["qwen2.5:7b-instruct"]).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": {"role": "assistant", "content": "本地回复"}, "done": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&local_config(&server.uri())).unwrap();
    assert_eq!(oracle.generate(&messages(), params()).await, "本地回复");
}

#[tokio::test]
async fn test_ollama_falls_back_to_compat_endpoint() {
    let server = MockServer::start().await;
    mount_tags(&server, &["qwen2.5:7b-instruct"]).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body("兼容接口")))
        .mount(&server)
        .await;

    let oracle = HttpOracle::new(&local_config(&server.uri())).unwrap();
    assert_eq!(oracle.generate(&messages(), params()).await, "兼容接口");
}

#[tokio::test]
async fn test_ollama_model_not_pulled() {
    let server = MockServer::start().await;
    mount_tags(&server, &["llama3.1:8b"]).await;

    let oracle = HttpOracle::new(&local_config(&server.uri())).unwrap();
    let err = oracle.try_generate(&messages(), params()).await.unwrap_err();
    assert!(matches!(err, OracleError::ModelNotReady { .. }));
}

#[tokio::test]
async fn test_no_key_and_no_ollama() {
    let oracle = HttpOracle::new(&local_config("http://127.0.0.1:9")).unwrap();
    let err = oracle.try_generate(&messages(), params()).await.unwrap_err();
    assert!(matches!(err, OracleError::NoBackend { .. }));
    assert!(err.to_string().starts_with("[LLM_API_KEY 未配置"));
}

#[tokio::test]
async fn test_remote_unreachable_then_local_unreachable() {
    let oracle = HttpOracle::new(&remote_config("http://127.0.0.1:9")).unwrap();
    let err = oracle.try_generate(&messages(), params()).await.unwrap_err();
    assert!(matches!(err, OracleError::LocalUnavailable { .. }));
}

#[tokio::test]
async fn test_status_never_exposes_key() {
    let server = MockServer::start().await;
    mount_tags(&server, &["qwen2.5:7b-instruct"]).await;
    let mut cfg = remote_config("https://api.example.com");
    cfg.ollama_base_url = server.uri();

    let oracle = HttpOracle::new(&cfg).unwrap();
    let status = oracle.status().await;
    assert!(status.remote.api_key_configured);
    assert!(status.ollama.reachable);
    assert!(status.ollama.model_ready);

    let json = serde_json::to_string(&status).unwrap();
    assert!(!json.contains("sk-test"));
}
