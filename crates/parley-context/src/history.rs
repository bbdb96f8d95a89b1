//! Project history collection.
//!
//! Flattens every chat of a project into a single time-ordered sequence of
//! text turns. Image messages and blank messages never enter the history.

use serde::{Deserialize, Serialize};

/// Stored speaker of a chat message.
///
/// Only `user` is recognised explicitly; every other stored role is treated as
/// the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn from_stored(role: &str) -> Self {
        match role {
            "user" => Self::User,
            _ => Self::Assistant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// The project a conversation belongs to, as seen by the model.
#[derive(Debug, Clone, Default)]
pub struct ProjectInfo {
    pub name: String,
    pub description: Option<String>,
}

/// A message as read from a chat, before any filtering.
#[derive(Debug, Clone)]
pub struct SnapshotMessage {
    pub role: ChatRole,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub is_image: bool,
}

/// One chat of a project with its messages in insertion order.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub id: String,
    pub name: String,
    pub messages: Vec<SnapshotMessage>,
}

/// A retained history turn, tagged with the chat it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: i64,
    pub chat_id: String,
    pub chat_name: String,
}

/// Collect the eligible messages of every chat, oldest first.
///
/// Chats are traversed in the order given, then each chat's messages in
/// insertion order. The sort is stable, so equal timestamps keep that
/// traversal order.
pub fn collect_history(chats: &[ChatSnapshot]) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = chats
        .iter()
        .flat_map(|chat| {
            chat.messages
                .iter()
                .filter(|msg| !msg.is_image && !msg.content.trim().is_empty())
                .map(move |msg| HistoryEntry {
                    role: msg.role,
                    content: msg.content.clone(),
                    timestamp: msg.timestamp,
                    chat_id: chat.id.clone(),
                    chat_name: chat.name.clone(),
                })
        })
        .collect();

    entries.sort_by_key(|entry| entry.timestamp);
    entries
}
