//! HTTP contract tests for the LLM client.

use parley_context::{AssembledContext, ContextEntry, EntryRole};
use parley_llm::{ChatModel, Error, LlmConfig, LlmProviderConfig, LlmService};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(name: &str, server: &MockServer, priority: u8) -> LlmProviderConfig {
    LlmProviderConfig {
        name: name.to_string(),
        base_url: format!("{}/v1", server.uri()),
        model: format!("{}-model", name),
        api_key: format!("{}-key", name),
        priority,
    }
}

fn service(providers: Vec<LlmProviderConfig>) -> LlmService {
    LlmService::new(&LlmConfig {
        providers,
        timeout_secs: 5,
    })
    .unwrap()
}

fn context() -> AssembledContext {
    AssembledContext {
        entries: vec![
            ContextEntry {
                role: EntryRole::System,
                content: "preamble".to_string(),
            },
            ContextEntry {
                role: EntryRole::User,
                content: "hello".to_string(),
            },
        ],
        inline_image: None,
    }
}

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn test_single_provider_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer gemini-key"))
        .and(body_partial_json(json!({
            "model": "gemini-model",
            "messages": [
                {"role": "system", "content": "preamble"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(reply("hi!"))
        .expect(1)
        .mount(&server)
        .await;

    let llm = service(vec![provider("gemini", &server, 1)]);
    let completion = llm.complete(&context()).await.unwrap();

    assert_eq!(completion.role, "assistant");
    assert_eq!(completion.content, "hi!");
}

#[tokio::test]
async fn test_falls_back_to_next_provider() {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&failing)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("from backup"))
        .expect(1)
        .mount(&healthy)
        .await;

    // Declared out of order; priority decides.
    let llm = service(vec![
        provider("openai", &healthy, 2),
        provider("gemini", &failing, 1),
    ]);
    assert_eq!(llm.providers(), vec!["gemini", "openai"]);

    let completion = llm.complete(&context()).await.unwrap();
    assert_eq!(completion.content, "from backup");
}

#[tokio::test]
async fn test_all_providers_failing_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let llm = service(vec![provider("gemini", &server, 1)]);
    let result = llm.complete(&context()).await;

    match result {
        Err(Error::ModelUnavailable(message)) => assert!(message.contains("Rate limit")),
        other => panic!("expected ModelUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_choices_is_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let llm = service(vec![provider("gemini", &server, 1)]);
    assert!(matches!(
        llm.complete(&context()).await,
        Err(Error::ModelUnavailable(_))
    ));
}

#[tokio::test]
async fn test_no_providers() {
    let llm = service(vec![]);
    assert!(matches!(
        llm.complete(&context()).await,
        Err(Error::ModelUnavailable(_))
    ));
}

#[tokio::test]
async fn test_null_content_falls_back_then_unavailable() {
    let silent = MockServer::start().await;
    let healthy = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        })))
        .expect(2)
        .mount(&silent)
        .await;
    Mock::given(method("POST"))
        .respond_with(reply("answered"))
        .expect(1)
        .mount(&healthy)
        .await;

    let llm = service(vec![
        provider("gemini", &silent, 1),
        provider("openai", &healthy, 2),
    ]);
    assert_eq!(llm.complete(&context()).await.unwrap().content, "answered");

    let alone = service(vec![provider("gemini", &silent, 1)]);
    assert!(matches!(
        alone.complete(&context()).await,
        Err(Error::ModelUnavailable(_))
    ));
}
