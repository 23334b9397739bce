use std::time::Duration;

use lovegate_provider::{create_provider, LlmProvider, LlmRequest, OpenAiProvider, ProviderConfig, ProviderType};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

#[tokio::test]
async fn chat_sends_system_and_user_turns() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "model": "deepseek-chat",
            "messages": [
                {"role": "system", "content": "Ты Мария."},
                {"role": "user", "content": "привет"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Привет!")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).unwrap();
    let resp = provider
        .chat(LlmRequest::simple("deepseek-chat", Some("Ты Мария.".into()), "привет"))
        .await
        .unwrap();

    assert_eq!(resp.text, "Привет!");
    assert_eq!(resp.output_tokens, Some(5));
}

#[tokio::test]
async fn upstream_error_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": {"type": "server_error", "message": "overloaded"}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).unwrap();
    let err = provider
        .chat(LlmRequest::simple("deepseek-chat", None, "hi"))
        .await
        .unwrap_err();

    let text = err.to_string();
    assert!(text.contains("500"));
    assert!(text.contains("overloaded"));
}

#[tokio::test]
async fn malformed_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).unwrap();
    let err = provider
        .chat(LlmRequest::simple("deepseek-chat", None, "hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("empty choices"));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_timeout("test-key", server.uri(), Duration::from_millis(200)).unwrap();
    let err = provider
        .chat(LlmRequest::simple("deepseek-chat", None, "hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn configured_provider_uses_base_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer from-config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig {
        provider_type: ProviderType::DeepSeek,
        ..ProviderConfig::default()
    }
    .with_api_key("from-config")
    .with_base_url(server.uri());
    let provider = create_provider(&config).unwrap_or_else(|e| panic!("{e}"));

    let resp = provider
        .chat(LlmRequest::simple(config.model.clone(), None, "hi"))
        .await
        .unwrap();
    assert_eq!(resp.text, "ok");
}
