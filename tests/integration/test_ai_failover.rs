//! AI adapter failover against mock OpenAI-compatible servers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use concierge::ai::{
    AiAdapter, CompletionProvider, OpenAiCompatibleProvider, ProviderState, AUTO_MODEL,
};
use concierge::config::AiProviderKind;

async fn mount_models(server: &MockServer, model: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": model }]
        })))
        .mount(server)
        .await;
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

fn provider(
    kind: AiProviderKind,
    server: &MockServer,
    model: &str,
    api_key: Option<&str>,
) -> Arc<OpenAiCompatibleProvider> {
    Arc::new(
        OpenAiCompatibleProvider::new(
            kind,
            &format!("{}/v1", server.uri()),
            model,
            api_key.map(String::from),
            5,
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_local_provider_detects_model_and_cleans_reply() {
    let local = MockServer::start().await;
    mount_models(&local, "qwen2.5-7b-instruct").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "qwen2.5-7b-instruct",
            "max_tokens": 250,
            "stream": false
        })))
        .respond_with(completion("Let me summarize.\n• Invoice due Friday"))
        .expect(1)
        .mount(&local)
        .await;

    let provider = provider(AiProviderKind::Local, &local, AUTO_MODEL, None);
    let adapter = AiAdapter::new(vec![provider.clone() as Arc<dyn CompletionProvider>]);

    let response = adapter
        .complete("Summarize", 250, 0.3, Duration::from_secs(5))
        .await;

    assert!(!response.degraded);
    assert_eq!(response.provider_used, Some(AiProviderKind::Local));
    assert_eq!(response.text, "• Invoice due Friday");
    assert_eq!(provider.model(), "qwen2.5-7b-instruct");
}

#[tokio::test]
async fn test_unreachable_local_fails_over_to_cloud() {
    let local = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&local)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("never used"))
        .expect(0)
        .mount(&local)
        .await;

    let cloud = MockServer::start().await;
    mount_models(&cloud, "gpt-4o-mini").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(completion("Cloud summary"))
        .expect(2)
        .mount(&cloud)
        .await;

    let adapter = AiAdapter::new(vec![
        provider(AiProviderKind::Local, &local, AUTO_MODEL, None) as Arc<dyn CompletionProvider>,
        provider(AiProviderKind::Cloud, &cloud, "gpt-4o-mini", Some("sk-test")),
    ]);

    for _ in 0..2 {
        let response = adapter
            .complete("Summarize", 250, 0.3, Duration::from_secs(5))
            .await;
        assert_eq!(response.provider_used, Some(AiProviderKind::Cloud));
        assert_eq!(response.text, "Cloud summary");
    }

    let states = adapter.states();
    assert_eq!(states[0].state, ProviderState::Unavailable);
    assert_eq!(states[1].state, ProviderState::Available);
}

#[tokio::test]
async fn test_slow_local_completion_times_out_and_is_not_retried() {
    let local = MockServer::start().await;
    mount_models(&local, "llama-3").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("too late").set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&local)
        .await;

    let cloud = MockServer::start().await;
    mount_models(&cloud, "gpt-4o-mini").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Cloud summary"))
        .mount(&cloud)
        .await;

    let adapter = AiAdapter::new(vec![
        provider(AiProviderKind::Local, &local, "llama-3", None) as Arc<dyn CompletionProvider>,
        provider(AiProviderKind::Cloud, &cloud, "gpt-4o-mini", Some("sk-test")),
    ]);

    let first = adapter
        .complete("Summarize", 250, 0.3, Duration::from_millis(300))
        .await;
    let second = adapter
        .complete("Summarize", 250, 0.3, Duration::from_millis(300))
        .await;

    assert_eq!(first.provider_used, Some(AiProviderKind::Cloud));
    assert_eq!(second.provider_used, Some(AiProviderKind::Cloud));
}

#[tokio::test]
async fn test_rate_limited_everywhere_degrades() {
    let local = MockServer::start().await;
    mount_models(&local, "llama-3").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&local)
        .await;

    let cloud = MockServer::start().await;
    mount_models(&cloud, "gpt-4o-mini").await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "internal error" }
        })))
        .mount(&cloud)
        .await;

    let adapter = AiAdapter::new(vec![
        provider(AiProviderKind::Local, &local, "llama-3", None) as Arc<dyn CompletionProvider>,
        provider(AiProviderKind::Cloud, &cloud, "gpt-4o-mini", Some("sk-test")),
    ]);

    let response = adapter
        .complete("raw prompt text", 250, 0.3, Duration::from_secs(5))
        .await;

    assert!(response.degraded);
    assert_eq!(response.provider_used, None);
    assert_eq!(response.text, "raw prompt text");
}
