//! Message Routes
//!
//! Sends a user turn to the model and stores the exchange.
//!
//! Routes:
//! - POST /api/message/text - Text message
//! - POST /api/message/file - Multipart upload (`chatId`, optional `prompt`, `file`)
//! - GET /api/message/file/:filename - Download an uploaded file (owner only)

use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::header,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::middleware::AuthUser;
use crate::services::{Reply, UploadStore};
use crate::{AppState, Error, Result};

/// Build message routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/text", post(text_message))
        .route("/file", post(file_message))
        .route("/file/:filename", get(download_file))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageRequest {
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub success: bool,
    pub reply: Reply,
}

/// Parts of a file message collected from the multipart body.
#[derive(Debug, Default)]
struct FileMessageForm {
    chat_id: Option<String>,
    prompt: Option<String>,
    file: Option<(String, Option<String>, Vec<u8>)>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Send a text message.
///
/// POST /api/message/text
#[axum::debug_handler]
async fn text_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<TextMessageRequest>,
) -> Result<Json<ReplyResponse>> {
    if req.chat_id.is_empty() {
        return Err(Error::Validation("Chat ID is required".to_string()));
    }

    let reply = state
        .conversation
        .send_text(&auth.user_id, &req.chat_id, &req.prompt)
        .await?;

    Ok(Json(ReplyResponse {
        success: true,
        reply,
    }))
}

/// Upload a file into a chat.
///
/// POST /api/message/file
#[axum::debug_handler]
async fn file_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<ReplyResponse>> {
    let mut form = FileMessageForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "chatId" => {
                form.chat_id = Some(read_text_field(field).await?);
            }
            "prompt" => {
                form.prompt = Some(read_text_field(field).await?);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("Failed to read file: {}", e)))?;
                form.file = Some((file_name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let chat_id = form
        .chat_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Validation("Chat ID is required".to_string()))?;
    let (file_name, content_type, data) = form
        .file
        .ok_or_else(|| Error::Validation("No file uploaded".to_string()))?;

    let media_type = UploadStore::media_type_for(&file_name, content_type.as_deref());
    let upload = state.uploads.save(&file_name, &media_type, &data).await?;

    let prompt = form.prompt.unwrap_or_default();
    let reply = state
        .conversation
        .send_file(&auth.user_id, &chat_id, prompt.trim(), upload)
        .await?;

    Ok(Json(ReplyResponse {
        success: true,
        reply,
    }))
}

/// Serve an uploaded file to the owner of the chat that references it.
///
/// GET /api/message/file/:filename
#[axum::debug_handler]
async fn download_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let not_found = || Error::NotFound("File not found".to_string());

    let path = state.uploads.resolve(&filename).map_err(|_| not_found())?;
    let message = db::find_upload_message(&state.db, &filename, &auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let content_type = message
        .file_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "inline; filename=\"{}\"",
        message.file_name.unwrap_or(filename).replace('"', "")
    );

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(data))
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| Error::InvalidInput(format!("Failed to read form field: {}", e)))
}
