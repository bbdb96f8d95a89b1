//! Chat Routes
//!
//! Routes:
//! - GET|POST /api/chat/create - Create a chat (default project when none given)
//! - GET /api/chat/get - List chats with messages, optionally for one project
//! - GET /api/chat/project/:project_id - Chats of one project with the project
//! - POST /api/chat/delete - Delete a chat and its uploaded files

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db;
use crate::middleware::AuthUser;
use crate::models::{new_id, ChatResponse, ProjectResponse};
use crate::{AppState, Error, Result};

/// Build chat routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create", get(create_chat).post(create_chat))
        .route("/get", get(list_chats))
        .route("/project/:project_id", get(project_chats))
        .route("/delete", post(delete_chat))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChatsQuery {
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChatRequest {
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatEnvelope {
    pub success: bool,
    pub message: String,
    pub chat: ChatResponse,
}

#[derive(Debug, Serialize)]
pub struct ListChatsResponse {
    pub success: bool,
    pub chats: Vec<ChatResponse>,
}

#[derive(Debug, Serialize)]
pub struct ProjectChatsResponse {
    pub success: bool,
    pub chats: Vec<ChatResponse>,
    pub project: ProjectResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChatResponse {
    pub success: bool,
    pub message: String,
    pub files_deleted: usize,
    pub files_failed: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an empty chat. Without a project id the chat goes to the caller's
/// default project, which is created on first use.
///
/// POST /api/chat/create
#[axum::debug_handler]
async fn create_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Option<Json<CreateChatRequest>>,
) -> Result<Json<ChatEnvelope>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let project = match request.project_id.filter(|id| !id.is_empty()) {
        Some(project_id) => db::get_project(&state.db, &project_id, &auth.user_id).await?,
        None => state.projects.ensure_default(&auth.user_id).await?,
    };

    let chat = db::create_chat(&state.db, &new_id(), &auth.user_id, &project.id).await?;
    info!(chat_id = %chat.id, project_id = %project.id, "Chat created");

    Ok(Json(ChatEnvelope {
        success: true,
        message: "Chat created".to_string(),
        chat: ChatResponse::new(&chat, Some(&[][..])),
    }))
}

/// List the caller's chats with their messages, most recently updated first.
///
/// GET /api/chat/get
#[axum::debug_handler]
async fn list_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListChatsQuery>,
) -> Result<Json<ListChatsResponse>> {
    let project_id = query.project_id.filter(|id| !id.is_empty());
    if let Some(project_id) = &project_id {
        db::get_project(&state.db, project_id, &auth.user_id).await?;
    }

    let chats = db::list_chats(&state.db, &auth.user_id, project_id.as_deref()).await?;

    let mut responses = Vec::with_capacity(chats.len());
    for chat in &chats {
        let messages = db::list_messages(&state.db, &chat.id).await?;
        responses.push(ChatResponse::new(chat, Some(&messages)));
    }

    Ok(Json(ListChatsResponse {
        success: true,
        chats: responses,
    }))
}

/// Chats of one project, most recently updated first.
///
/// GET /api/chat/project/:project_id
#[axum::debug_handler]
async fn project_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectChatsResponse>> {
    let project = db::get_project(&state.db, &project_id, &auth.user_id).await?;
    let chats = db::list_chats(&state.db, &auth.user_id, Some(&project_id)).await?;

    let mut responses = Vec::with_capacity(chats.len());
    for chat in &chats {
        let messages = db::list_messages(&state.db, &chat.id).await?;
        responses.push(ChatResponse::new(chat, Some(&messages)));
    }

    Ok(Json(ProjectChatsResponse {
        success: true,
        chats: responses,
        project: ProjectResponse::from(&project),
    }))
}

/// Delete a chat and the uploaded files its messages reference.
///
/// POST /api/chat/delete
#[axum::debug_handler]
async fn delete_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<DeleteChatRequest>,
) -> Result<Json<DeleteChatResponse>> {
    if req.chat_id.is_empty() {
        return Err(Error::Validation("Chat ID is required".to_string()));
    }

    let chat = db::get_chat(&state.db, &req.chat_id, &auth.user_id).await?;
    let file_paths = db::list_chat_file_paths(&state.db, &chat.id).await?;

    db::delete_chat(&state.db, &chat.id).await?;
    let files = state.uploads.remove_all(&file_paths).await;

    info!(
        chat_id = %chat.id,
        files_deleted = files.deleted,
        files_failed = files.failed,
        "Chat deleted"
    );

    let message = if file_paths.is_empty() {
        "Chat deleted successfully".to_string()
    } else {
        format!(
            "Chat deleted along with {} file(s){}",
            files.deleted,
            files.failure_note()
        )
    };

    Ok(Json(DeleteChatResponse {
        success: true,
        message,
        files_deleted: files.deleted,
        files_failed: files.failed,
    }))
}
