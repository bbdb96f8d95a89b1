//! Chat and message response models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::from_millis;
use crate::db::{Chat, Message};

/// Uploaded file metadata attached to a message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub media_type: String,
    pub filename: String,
    /// Download route for the owner.
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    pub is_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        let file_info = match (&message.file_name, &message.stored_name) {
            (Some(name), Some(stored)) => Some(FileInfo {
                name: name.clone(),
                size: message.file_size.unwrap_or(0),
                media_type: message.file_type.clone().unwrap_or_default(),
                filename: stored.clone(),
                url: format!("/api/message/file/{}", stored),
            }),
            _ => None,
        };

        Self {
            role: message.role.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
            is_image: message.is_image,
            file_info,
        }
    }
}

/// A chat as returned by the API, optionally with its messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatResponse {
    pub fn new(chat: &Chat, messages: Option<&[Message]>) -> Self {
        Self {
            id: chat.id.clone(),
            name: chat.name.clone(),
            project_id: chat.project_id.clone(),
            user_id: chat.user_id.clone(),
            messages: messages.map(|m| m.iter().map(MessageResponse::from).collect()),
            created_at: from_millis(chat.created_at),
            updated_at: from_millis(chat.updated_at),
        }
    }
}
