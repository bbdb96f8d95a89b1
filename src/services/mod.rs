//! Service layer for Parley.
//!
//! Contains business logic on top of the database layer:
//! - Auth (local accounts, JWT pairs, Google sign-in)
//! - Project (validation, default project, cascading deletes)
//! - Conversation (context assembly, model call, fallback replies)
//! - Uploads (file storage and decoding for context assembly)

mod auth;
mod conversation;
mod project;
mod uploads;

pub use auth::{
    hash_password, verify_password, AuthService, Claims, GoogleUserInfo, TokenPair, TokenType,
    ACCESS_COOKIE, REFRESH_COOKIE,
};
pub use conversation::{
    file_fallback_reply, ConversationService, ProjectMemory, Reply, TEXT_FALLBACK_REPLY,
};
pub use project::{
    ProjectDeletion, ProjectService, DEFAULT_PROJECT_DESCRIPTION, DEFAULT_PROJECT_NAME,
};
pub use uploads::{RemovalReport, StoredUpload, UploadStore, ALLOWED_TYPES};
