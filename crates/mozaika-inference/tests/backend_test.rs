//! Wire-level tests for the HTTP backends against a mock server.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mozaika_core::{EmbeddingBackend, GenerationBackend};
use mozaika_inference::{
    AnthropicBackend, AnthropicConfig, OpenAIBackend, OpenAIConfig,
};

fn openai_backend(base_url: String) -> OpenAIBackend {
    OpenAIBackend::new(OpenAIConfig {
        base_url,
        api_key: "test-key".to_string(),
        embed_dimension: 3,
        ..Default::default()
    })
    .expect("backend")
}

#[tokio::test]
async fn openai_generate_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "hello there"}}
            ]
        })))
        .mount(&server)
        .await;

    let backend = openai_backend(server.uri());
    let out = backend.generate("hi").await.expect("generate");
    assert_eq!(out, "hello there");
}

#[tokio::test]
async fn openai_429_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}
        })))
        .mount(&server)
        .await;

    let backend = openai_backend(server.uri());
    let err = backend.generate("hi").await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn openai_quota_code_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}
        })))
        .mount(&server)
        .await;

    let backend = openai_backend(server.uri());
    let err = backend.generate("hi").await.unwrap_err();
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn openai_embeddings_ordered_and_normalized() {
    let server = MockServer::start().await;
    // Returned out of order; backend must sort by index
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 2.0, 0.0]},
                {"index": 0, "embedding": [3.0, 0.0, 4.0]}
            ]
        })))
        .mount(&server)
        .await;

    let backend = openai_backend(server.uri());
    let vectors = backend
        .embed_texts(&["a".to_string(), "b".to_string()])
        .await
        .expect("embed");
    assert_eq!(vectors.len(), 2);
    // index 0 first: [3,0,4] normalized
    assert!((vectors[0][0] - 0.6).abs() < 1e-6);
    assert!((vectors[0][2] - 0.8).abs() < 1e-6);
    assert!((vectors[1][1] - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn openai_empty_batch_skips_request() {
    let server = MockServer::start().await;
    let backend = openai_backend(server.uri());
    let vectors = backend.embed_texts(&[]).await.expect("embed");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn anthropic_generate_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "part one "},
                {"type": "text", "text": "part two"}
            ]
        })))
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new(AnthropicConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        ..Default::default()
    })
    .expect("backend");

    let out = backend.generate("hi").await.expect("generate");
    assert_eq!(out, "part one part two");
}

#[tokio::test]
async fn anthropic_overloaded_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new(AnthropicConfig {
        base_url: server.uri(),
        api_key: "k".to_string(),
        ..Default::default()
    })
    .expect("backend");

    let err = backend.generate("hi").await.unwrap_err();
    assert!(err.is_rate_limited());
}
