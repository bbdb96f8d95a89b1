//! Common test utilities and helpers.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use parley::config::Config;
use parley::db;
use parley::AppState;
use parley_context::AssembledContext;
use parley_llm::{ChatModel, Completion, Error as LlmError};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// Model that answers from a script and records every context it receives.
/// An exhausted script answers `ModelUnavailable`.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Option<String>>>,
    seen: Mutex<Vec<AssembledContext>>,
}

impl ScriptedModel {
    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| Some(r.to_string())).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contexts(&self) -> Vec<AssembledContext> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_context(&self) -> AssembledContext {
        self.contexts().pop().expect("model was never called")
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, context: &AssembledContext) -> parley_llm::Result<Completion> {
        self.seen.lock().unwrap().push(context.clone());

        match self.replies.lock().unwrap().pop_front().flatten() {
            Some(reply) => Ok(Completion::assistant(reply)),
            None => Err(LlmError::ModelUnavailable("scripted outage".to_string())),
        }
    }
}

/// A running application over an in-memory database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub model: Arc<ScriptedModel>,
    pub uploads: TempDir,
}

impl TestApp {
    pub async fn new(model: Arc<ScriptedModel>) -> Self {
        let pool = db::init_pool(":memory:")
            .await
            .expect("Failed to create test database");
        db::migrate(&pool).await.expect("Failed to run migrations");

        let uploads = tempfile::tempdir().expect("Failed to create uploads dir");

        let mut config = Config::from_env();
        config.storage.uploads_path = uploads.path().to_string_lossy().into_owned();
        config.storage.max_upload_size = 1024 * 1024;
        config.auth.secure_cookies = false;
        config.context.history_limit = 15;
        config.users.default_credits = 100;

        let state = AppState::from_parts(pool, &config, model.clone())
            .expect("Failed to build state");
        let router = parley::api::app(state.clone());

        Self {
            router,
            state,
            model,
            uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    /// Register an account and return its access token.
    pub async fn register(&self, name: &str, email: &str) -> String {
        let response = self
            .send(post_json_public(
                "/api/auth/register",
                json!({ "name": name, "email": email, "password": "secret123" }),
            ))
            .await;
        let body = extract_json(response).await;
        body["token"].as_str().expect("no token").to_string()
    }

    /// Create a chat in the caller's default project and return its id.
    pub async fn create_chat(&self, token: &str, project_id: Option<&str>) -> String {
        let body = match project_id {
            Some(id) => json!({ "projectId": id }),
            None => json!({}),
        };
        let response = self.send(post_json("/api/chat/create", token, body)).await;
        let body = extract_json(response).await;
        body["chat"]["id"].as_str().expect("no chat id").to_string()
    }

    /// Send a text message and return the response body.
    pub async fn send_text(&self, token: &str, chat_id: &str, prompt: &str) -> Value {
        let response = self
            .send(post_json(
                "/api/message/text",
                token,
                json!({ "chatId": chat_id, "prompt": prompt }),
            ))
            .await;
        extract_json(response).await
    }
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Extract the raw body bytes
pub async fn extract_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

/// Create a GET request
pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Create a POST request with JSON body
pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Create an unauthenticated POST request with JSON body
pub fn post_json_public(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Create a PUT request with JSON body
pub fn put_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Create a DELETE request
pub fn delete_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Create a multipart upload request for `/api/message/file`.
pub fn multipart_upload(
    token: &str,
    chat_id: &str,
    prompt: Option<&str>,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let boundary = "parley-test-boundary";
    let mut body = Vec::new();

    let mut text_part = |name: &str, value: &str| {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    };
    text_part("chatId", chat_id);
    if let Some(prompt) = prompt {
        text_part("prompt", prompt);
    }

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            boundary, file_name, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/message/file")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}
