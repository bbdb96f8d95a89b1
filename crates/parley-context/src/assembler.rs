//! Context assembly.
//!
//! Builds the ordered entry sequence sent to the model for one incoming
//! message: a system preamble naming the project, the budgeted project
//! history, and the new user turn.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::budget::{BudgetPolicy, LastN};
use crate::error::{ContextBuildError, Result};
use crate::file::{FileDecoder, FileDescriptor, MediaCategory};
use crate::history::{collect_history, ChatRole, ChatSnapshot, ProjectInfo};

pub const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this image and describe what you see.";
pub const DEFAULT_TEXT_FILE_PROMPT: &str = "What can you tell me about this file?";
pub const DEFAULT_FILE_PROMPT: &str = "Can you help me with this file?";

/// Role of an assembled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    System,
    User,
    Assistant,
}

impl EntryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl From<ChatRole> for EntryRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => Self::User,
            ChatRole::Assistant => Self::Assistant,
        }
    }
}

/// A single role-tagged entry of the model context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub role: EntryRole,
    pub content: String,
}

impl ContextEntry {
    fn new(role: EntryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Image bytes that accompany the final user entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// The complete context for one model call.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub entries: Vec<ContextEntry>,
    /// Set only for image uploads; belongs to the last entry.
    pub inline_image: Option<InlineImage>,
}

/// The new message being answered.
#[derive(Debug, Clone, Copy)]
pub enum NewInput<'a> {
    Text { prompt: &'a str },
    File { prompt: &'a str, file: &'a FileDescriptor },
}

/// Everything the assembler reads for one request.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    /// `None` when the project lookup failed.
    pub project: Option<&'a ProjectInfo>,
    /// All chats of the project, in enumeration order.
    pub chats: &'a [ChatSnapshot],
    pub target_chat_id: &'a str,
    pub input: NewInput<'a>,
}

/// Builds model contexts. Holds no per-request state.
#[derive(Clone)]
pub struct ContextAssembler {
    policy: Arc<dyn BudgetPolicy>,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAssembler {
    /// Assembler keeping the last 15 history turns.
    pub fn new() -> Self {
        Self::with_policy(Arc::new(LastN::default()))
    }

    pub fn with_policy(policy: Arc<dyn BudgetPolicy>) -> Self {
        Self { policy }
    }

    /// Assemble the context for `request`.
    pub async fn assemble(
        &self,
        request: AssemblyRequest<'_>,
        decoder: &dyn FileDecoder,
    ) -> Result<AssembledContext> {
        if !request.chats.iter().any(|c| c.id == request.target_chat_id) {
            return Err(ContextBuildError::TargetChatMissing(
                request.target_chat_id.to_string(),
            ));
        }

        let preamble = match request.input {
            NewInput::Text { .. } => conversation_preamble(request.project),
            NewInput::File { .. } => file_preamble(request.project),
        };

        let collected = collect_history(request.chats);
        let total = collected.len();
        let history = self.policy.apply(collected);

        debug!(
            chat_id = %request.target_chat_id,
            collected = total,
            kept = history.len(),
            "Assembled project history"
        );

        let mut entries = Vec::with_capacity(history.len() + 2);
        entries.push(ContextEntry::new(EntryRole::System, preamble));
        entries.extend(
            history
                .into_iter()
                .map(|h| ContextEntry::new(h.role.into(), h.content)),
        );

        let mut inline_image = None;
        let turn = match request.input {
            NewInput::Text { prompt } => prompt.to_string(),
            NewInput::File { prompt, file } => match file.category() {
                MediaCategory::Image => {
                    let data = decoder.read_bytes(file).await.map_err(|source| {
                        ContextBuildError::FileDecode {
                            name: file.name.clone(),
                            source,
                        }
                    })?;
                    inline_image = Some(InlineImage {
                        media_type: file.media_type.clone(),
                        data,
                    });
                    or_default(prompt, DEFAULT_IMAGE_PROMPT).to_string()
                }
                MediaCategory::PlainText => {
                    let text = decoder.read_text(file).await.map_err(|source| {
                        ContextBuildError::FileDecode {
                            name: file.name.clone(),
                            source,
                        }
                    })?;
                    text_file_turn(file, &text, prompt)
                }
                MediaCategory::Other => other_file_turn(file, prompt),
            },
        };
        entries.push(ContextEntry::new(EntryRole::User, turn));

        Ok(AssembledContext {
            entries,
            inline_image,
        })
    }
}

/// Preamble for plain conversation turns.
pub fn conversation_preamble(project: Option<&ProjectInfo>) -> String {
    let project_context = match project {
        Some(p) => match p.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!("Project: \"{}\" - {}", p.name, description),
            None => format!("Project: \"{}\"", p.name),
        },
        None => "Current project".to_string(),
    };

    format!(
        "You are a helpful AI assistant working within a project context. {}. \
         You have access to the conversation history across all chats in this project. \
         Use this shared memory to provide contextually relevant responses. \
         Remember previous discussions, topics, and context from all conversations within this project. \
         When referencing previous conversations, you can mention relevant context naturally. \
         Each project is isolated and private to the current user.",
        project_context
    )
}

/// Preamble for file analysis turns.
pub fn file_preamble(project: Option<&ProjectInfo>) -> String {
    let name = project.map(|p| p.name.as_str()).unwrap_or("Unnamed Project");

    format!(
        "You are a helpful AI assistant with file analysis capabilities. \
         You are working within the project \"{}\". \
         You can analyze various file types including images, documents, and text files. \
         Remember the context of conversations within this project. \
         Each project is isolated and private to the current user.",
        name
    )
}

fn text_file_turn(file: &FileDescriptor, text: &str, prompt: &str) -> String {
    format!(
        "Please analyze this text file \"{}\":\n\n{}\n\n{}",
        file.name,
        text,
        or_default(prompt, DEFAULT_TEXT_FILE_PROMPT)
    )
}

fn other_file_turn(file: &FileDescriptor, prompt: &str) -> String {
    format!(
        "I've uploaded a file: \"{}\" ({}, {}MB). {}",
        file.name,
        file.media_type,
        file.size_mib(),
        or_default(prompt, DEFAULT_FILE_PROMPT)
    )
}

fn or_default<'a>(prompt: &'a str, default: &'a str) -> &'a str {
    if prompt.is_empty() {
        default
    } else {
        prompt
    }
}
