//! Chat completion client with multi-provider fallback.
//!
//! Speaks the OpenAI-compatible `chat/completions` wire format, which Gemini,
//! OpenAI and OpenRouter all accept. Providers are tried in priority order,
//! one attempt each. When none of them answers the caller gets
//! [`Error::ModelUnavailable`] and decides what to reply instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parley_context::{AssembledContext, EntryRole};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Default request timeout for a single provider call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Error types for the LLM client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub role: String,
    pub content: String,
}

impl Completion {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that can answer an assembled context.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, context: &AssembledContext) -> Result<Completion>;
}

/// Configuration for an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub priority: u8,
}

/// Configuration for the LLM service.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub providers: Vec<LlmProviderConfig>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Get default endpoint for a provider
pub fn default_endpoint(name: &str) -> String {
    match name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
        "openrouter" => "https://openrouter.ai/api/v1".to_string(),
        _ => "https://api.openai.com/v1".to_string(),
    }
}

/// Get default model for a provider
pub fn default_model(name: &str) -> String {
    match name {
        "gemini" => "gemini-2.0-flash".to_string(),
        "openrouter" => "google/gemini-2.0-flash-001".to_string(),
        _ => "gpt-4o-mini".to_string(),
    }
}

/// Chat model backed by remote providers.
#[derive(Clone)]
pub struct LlmService {
    inner: Arc<LlmServiceInner>,
}

struct LlmServiceInner {
    providers: Vec<LlmProviderConfig>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<Choice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    role: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl LlmService {
    /// Create LLM service from config. Providers are sorted by priority.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {}", e)))?;

        let mut providers = config.providers.clone();
        providers.sort_by_key(|p| p.priority);

        info!(
            providers = ?providers.iter().map(|p| &p.name).collect::<Vec<_>>(),
            "LLM service initialized from config"
        );

        Ok(Self {
            inner: Arc::new(LlmServiceInner {
                providers,
                client,
            }),
        })
    }

    /// Get provider names in priority order
    pub fn providers(&self) -> Vec<String> {
        self.inner.providers.iter().map(|p| p.name.clone()).collect()
    }

    /// Make the API call to a single provider.
    async fn call_provider(&self, provider: &LlmProviderConfig, body: &Value) -> Result<Completion> {
        let url = format!("{}/chat/completions", provider.base_url.trim_end_matches('/'));

        debug!(
            provider = %provider.name,
            model = %provider.model,
            "Calling LLM provider"
        );

        let mut body = body.clone();
        body["model"] = json!(provider.model);

        let response = self
            .inner
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", provider.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Request(format!("Failed to read response: {}", e)))?;

        if status.as_u16() == 429 {
            return Err(Error::RateLimitExceeded);
        }

        if !status.is_success() {
            return Err(Error::Llm(format!("Provider returned {}: {}", status, text)));
        }

        parse_response(&provider.name, &text)
    }
}

#[async_trait]
impl ChatModel for LlmService {
    async fn complete(&self, context: &AssembledContext) -> Result<Completion> {
        if self.inner.providers.is_empty() {
            return Err(Error::ModelUnavailable("No providers configured".to_string()));
        }

        let body = build_request(context);
        let mut last_error = None;

        for provider in &self.inner.providers {
            match self.call_provider(provider, &body).await {
                Ok(completion) => return Ok(completion),
                Err(e) => {
                    warn!(
                        provider = %provider.name,
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        let error_msg = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "All providers failed".to_string());

        Err(Error::ModelUnavailable(error_msg))
    }
}

/// Build the provider-independent part of a chat completion request.
fn build_request(context: &AssembledContext) -> Value {
    let last = context.entries.len().saturating_sub(1);

    let messages: Vec<Value> = context
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| match &context.inline_image {
            Some(image) if i == last && entry.role == EntryRole::User => json!({
                "role": entry.role.as_str(),
                "content": [
                    {"type": "text", "text": entry.content},
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", image.media_type, BASE64.encode(&image.data))
                        }
                    }
                ]
            }),
            _ => json!({
                "role": entry.role.as_str(),
                "content": entry.content,
            }),
        })
        .collect();

    json!({ "messages": messages })
}

/// Parse an OpenAI-format response body.
fn parse_response(provider: &str, text: &str) -> Result<Completion> {
    let response: ChatCompletionResponse = serde_json::from_str(text)
        .map_err(|e| Error::Llm(format!("Failed to parse response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(Error::Llm(error.message));
    }

    let message = response
        .choices
        .and_then(|choices| choices.into_iter().next())
        .and_then(|choice| choice.message)
        .ok_or_else(|| Error::Llm(format!("No choices in {} response", provider)))?;

    let content = message
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::Llm(format!("Empty reply in {} response", provider)))?;

    Ok(Completion {
        role: message.role.unwrap_or_else(|| "assistant".to_string()),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_context::{ContextEntry, InlineImage};

    fn context(image: Option<InlineImage>) -> AssembledContext {
        AssembledContext {
            entries: vec![
                ContextEntry {
                    role: EntryRole::System,
                    content: "preamble".to_string(),
                },
                ContextEntry {
                    role: EntryRole::Assistant,
                    content: "earlier".to_string(),
                },
                ContextEntry {
                    role: EntryRole::User,
                    content: "look".to_string(),
                },
            ],
            inline_image: image,
        }
    }

    #[test]
    fn test_build_request_plain() {
        let body = build_request(&context(None));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "look");
    }

    #[test]
    fn test_build_request_with_image() {
        let body = build_request(&context(Some(InlineImage {
            media_type: "image/png".to_string(),
            data: b"abc".to_vec(),
        })));
        let last = &body["messages"][2];
        assert_eq!(last["content"][0]["type"], "text");
        assert_eq!(last["content"][0]["text"], "look");
        assert_eq!(last["content"][1]["image_url"]["url"], "data:image/png;base64,YWJj");
        assert_eq!(body["messages"][1]["content"], "earlier");
    }

    #[test]
    fn test_parse_response() {
        let text = r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#;
        let completion = parse_response("gemini", text).unwrap();
        assert_eq!(completion, Completion::assistant("hi there"));
    }

    #[test]
    fn test_parse_response_without_choices() {
        assert!(parse_response("openai", r#"{"choices":[]}"#).is_err());
        assert!(parse_response("openai", r#"{"error":{"message":"bad key"}}"#).is_err());
    }

    #[test]
    fn test_parse_response_without_content() {
        let null = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let blank = r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#;
        assert!(matches!(parse_response("gemini", null), Err(Error::Llm(_))));
        assert!(matches!(parse_response("gemini", blank), Err(Error::Llm(_))));
    }

    #[test]
    fn test_default_endpoints() {
        assert_eq!(
            default_endpoint("gemini"),
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
        assert_eq!(default_endpoint("openrouter"), "https://openrouter.ai/api/v1");
        assert_eq!(default_endpoint("openai"), "https://api.openai.com/v1");
    }

    #[test]
    fn test_default_models() {
        assert_eq!(default_model("gemini"), "gemini-2.0-flash");
        assert_eq!(default_model("openai"), "gpt-4o-mini");
    }
}
