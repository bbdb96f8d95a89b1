//! Conversation service.
//!
//! Runs one chat turn end to end: loads the project's chats, assembles the
//! model context, asks the model, substitutes a fixed reply when the model
//! is unavailable, and persists both turns in one transaction.

use std::collections::HashMap;
use std::sync::Arc;

use parley_context::{
    collect_history, AssemblyRequest, BudgetPolicy, ChatRole, ChatSnapshot, ContextAssembler,
    HistoryEntry, LastN, NewInput, ProjectInfo, SnapshotMessage,
};
use parley_llm::ChatModel;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::{self, Chat, DbPool, MessageFile, NewMessage, Project};
use crate::error::{Error, Result};
use crate::models::now_millis;

use super::uploads::{StoredUpload, UploadStore};

/// Reply persisted when the model cannot answer a text message.
pub const TEXT_FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble connecting to the AI service right now. Please try again in a moment.";

/// Chat names are cut to this many characters.
const CHAT_NAME_LEN: usize = 30;

/// Reply persisted when the model cannot answer a file upload.
pub fn file_fallback_reply(file_name: &str) -> String {
    format!(
        "I've received your file \"{}\", but I'm having trouble processing it right now. Please try again in a moment.",
        file_name
    )
}

/// A persisted assistant reply.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    /// False when the fixed fallback was used.
    #[serde(skip)]
    pub from_model: bool,
}

/// Read-only view of a project's shared memory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMemory {
    pub project_id: String,
    pub project_name: String,
    pub total_chats: usize,
    pub total_messages: usize,
    pub history_limit: usize,
    /// Every eligible message, oldest first.
    pub history: Vec<HistoryEntry>,
    /// The part of `history` the model would see.
    pub context_window: Vec<HistoryEntry>,
}

/// Service running chat turns.
#[derive(Clone)]
pub struct ConversationService {
    db: DbPool,
    model: Arc<dyn ChatModel>,
    uploads: UploadStore,
    assembler: ContextAssembler,
    history_limit: usize,
}

impl ConversationService {
    pub fn new(
        db: DbPool,
        model: Arc<dyn ChatModel>,
        uploads: UploadStore,
        history_limit: usize,
    ) -> Self {
        Self {
            db,
            model,
            uploads,
            assembler: ContextAssembler::with_policy(Arc::new(LastN(history_limit))),
            history_limit,
        }
    }

    /// Answer a text message in `chat_id`.
    pub async fn send_text(&self, user_id: &str, chat_id: &str, prompt: &str) -> Result<Reply> {
        if prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt is required".to_string()));
        }

        let chat = db::get_chat(&self.db, chat_id, user_id).await?;
        let received_at = now_millis();
        let (project, snapshots) = self.load_project(&chat, user_id).await?;

        let context = self
            .assembler
            .assemble(
                AssemblyRequest {
                    project: project.as_ref(),
                    chats: &snapshots,
                    target_chat_id: &chat.id,
                    input: NewInput::Text { prompt },
                },
                &self.uploads,
            )
            .await
            .map_err(|e| {
                warn!(chat_id = %chat.id, error = %e, "Failed to build context");
                Error::from(e)
            })?;

        let (content, from_model) = match self.model.complete(&context).await {
            Ok(completion) => (completion.content, true),
            Err(e) => {
                warn!(chat_id = %chat.id, error = %e, "Model unavailable, using fallback reply");
                (TEXT_FALLBACK_REPLY.to_string(), false)
            }
        };

        let user_message = NewMessage {
            chat_id: chat.id.clone(),
            role: ChatRole::User.as_str().to_string(),
            content: prompt.to_string(),
            timestamp: received_at,
            is_image: false,
            file: None,
        };

        self.persist_turn(&chat, user_id, user_message, prompt, content, from_model)
            .await
    }

    /// Answer a file upload in `chat_id`. The stored file is removed again
    /// when the turn fails before it is persisted.
    pub async fn send_file(
        &self,
        user_id: &str,
        chat_id: &str,
        prompt: &str,
        upload: StoredUpload,
    ) -> Result<Reply> {
        let result = self.run_file_turn(user_id, chat_id, prompt, &upload).await;

        if result.is_err() {
            self.uploads.remove_all([&upload.path]).await;
        }
        result
    }

    async fn run_file_turn(
        &self,
        user_id: &str,
        chat_id: &str,
        prompt: &str,
        upload: &StoredUpload,
    ) -> Result<Reply> {
        let chat = db::get_chat(&self.db, chat_id, user_id).await?;
        let received_at = now_millis();
        let (project, snapshots) = self.load_project(&chat, user_id).await?;
        let descriptor = upload.descriptor();

        let context = self
            .assembler
            .assemble(
                AssemblyRequest {
                    project: project.as_ref(),
                    chats: &snapshots,
                    target_chat_id: &chat.id,
                    input: NewInput::File {
                        prompt,
                        file: &descriptor,
                    },
                },
                &self.uploads,
            )
            .await
            .map_err(|e| {
                warn!(chat_id = %chat.id, file = %upload.original_name, error = %e, "Failed to build context");
                Error::from(e)
            })?;

        let (content, from_model) = match self.model.complete(&context).await {
            Ok(completion) => (completion.content, true),
            Err(e) => {
                warn!(chat_id = %chat.id, error = %e, "Model unavailable, using fallback reply");
                (file_fallback_reply(&upload.original_name), false)
            }
        };

        let user_message = NewMessage {
            chat_id: chat.id.clone(),
            role: ChatRole::User.as_str().to_string(),
            content: if prompt.is_empty() {
                format!("Uploaded file: {}", upload.original_name)
            } else {
                prompt.to_string()
            },
            timestamp: received_at,
            is_image: false,
            file: Some(MessageFile {
                name: upload.original_name.clone(),
                size: upload.size as i64,
                media_type: upload.media_type.clone(),
                path: upload.path.to_string_lossy().into_owned(),
                stored_name: upload.stored_name.clone(),
            }),
        };

        let title = if prompt.is_empty() {
            upload.original_name.as_str()
        } else {
            prompt
        };

        self.persist_turn(&chat, user_id, user_message, title, content, from_model)
            .await
    }

    /// Append both turns, rename a new chat, bump its update time and charge
    /// one credit, all or nothing.
    async fn persist_turn(
        &self,
        chat: &Chat,
        user_id: &str,
        user_message: NewMessage,
        title: &str,
        content: String,
        from_model: bool,
    ) -> Result<Reply> {
        let replied_at = now_millis().max(user_message.timestamp);
        let reply = NewMessage {
            chat_id: chat.id.clone(),
            role: ChatRole::Assistant.as_str().to_string(),
            content,
            timestamp: replied_at,
            is_image: false,
            file: None,
        };

        let mut tx = self.db.begin().await?;
        db::insert_message(&mut tx, &user_message).await?;
        db::insert_message(&mut tx, &reply).await?;
        let renamed = db::rename_new_chat(&mut tx, &chat.id, &chat_title(title)).await?;
        db::touch_chat(&mut tx, &chat.id, replied_at).await?;
        db::decrement_credits(&mut tx, user_id).await?;
        tx.commit().await?;

        info!(chat_id = %chat.id, from_model, renamed, "Chat turn stored");

        Ok(Reply {
            role: reply.role,
            content: reply.content,
            timestamp: reply.timestamp,
            from_model,
        })
    }

    /// Snapshot every chat of the chat's project. A failed project lookup
    /// leaves the project info empty rather than failing the turn.
    async fn load_project(
        &self,
        chat: &Chat,
        user_id: &str,
    ) -> Result<(Option<ProjectInfo>, Vec<ChatSnapshot>)> {
        let project = match db::get_project(&self.db, &chat.project_id, user_id).await {
            Ok(project) => Some(project_info(&project)),
            Err(e) => {
                debug!(project_id = %chat.project_id, error = %e, "Project lookup failed");
                None
            }
        };

        let snapshots = self.snapshots(&chat.project_id).await?;
        Ok((project, snapshots))
    }

    async fn snapshots(&self, project_id: &str) -> Result<Vec<ChatSnapshot>> {
        let chats = db::list_project_chats(&self.db, project_id).await?;
        let messages = db::list_project_messages(&self.db, project_id).await?;

        let mut by_chat: HashMap<String, Vec<SnapshotMessage>> = HashMap::new();
        for message in messages {
            by_chat
                .entry(message.chat_id)
                .or_default()
                .push(SnapshotMessage {
                    role: ChatRole::from_stored(&message.role),
                    content: message.content,
                    timestamp: message.timestamp,
                    is_image: message.is_image,
                });
        }

        Ok(chats
            .into_iter()
            .map(|chat| ChatSnapshot {
                messages: by_chat.remove(&chat.id).unwrap_or_default(),
                id: chat.id,
                name: chat.name,
            })
            .collect())
    }

    /// The project's shared memory as the model would receive it.
    pub async fn project_memory(&self, user_id: &str, project_id: &str) -> Result<ProjectMemory> {
        let project = db::get_project(&self.db, project_id, user_id).await?;
        let snapshots = self.snapshots(project_id).await?;

        let history = collect_history(&snapshots);
        let context_window = LastN(self.history_limit).apply(history.clone());

        Ok(ProjectMemory {
            project_id: project.id,
            project_name: project.name,
            total_chats: snapshots.len(),
            total_messages: history.len(),
            history_limit: self.history_limit,
            history,
            context_window,
        })
    }
}

fn project_info(project: &Project) -> ProjectInfo {
    ProjectInfo {
        name: project.name.clone(),
        description: Some(project.description.clone()).filter(|d| !d.is_empty()),
    }
}

/// First 30 characters plus "..." when longer.
fn chat_title(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > CHAT_NAME_LEN {
        let cut: String = text.chars().take(CHAT_NAME_LEN).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("short", "short")]
    #[case("  padded  ", "padded")]
    #[case(
        "This prompt is definitely longer than thirty characters",
        "This prompt is definitely lon..."
    )]
    fn test_chat_title(#[case] prompt: &str, #[case] expected: &str) {
        assert_eq!(chat_title(prompt), expected);
    }

    #[test]
    fn test_chat_title_counts_characters() {
        assert_eq!(chat_title(&"é".repeat(31)), format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn test_file_fallback_reply() {
        assert_eq!(
            file_fallback_reply("report.pdf"),
            "I've received your file \"report.pdf\", but I'm having trouble processing it right now. Please try again in a moment."
        );
    }

    #[test]
    fn test_project_info_drops_empty_description() {
        let project = Project {
            id: "p".to_string(),
            user_id: "u".to_string(),
            name: "Atlas".to_string(),
            description: String::new(),
            is_default: false,
            created_at: 0,
            updated_at: 0,
        };
        assert!(project_info(&project).description.is_none());
    }
}
