//! Application state for Parley.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use parley_llm::{ChatModel, LlmService};

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{AuthService, ConversationService, ProjectService, UploadStore};
use crate::{config, Result};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Accounts, tokens and cookies.
    pub auth: AuthService,
    /// Project management service.
    pub projects: ProjectService,
    /// Uploaded file storage.
    pub uploads: UploadStore,
    /// Chat turns against the model.
    pub conversation: ConversationService,
    /// Model behind the conversation service.
    pub model: Arc<dyn ChatModel>,
}

impl AppState {
    /// Create a new application state from the global configuration.
    pub async fn new() -> Result<Self> {
        let config = config::config();

        // Initialize database
        let db = crate::db::init_pool(&config.database.path).await?;

        // Initialize database schema
        crate::db::initialize_schema(&db).await?;

        let llm = LlmService::new(&config.llm)
            .map_err(|e| crate::Error::Internal(format!("Failed to initialize LLM client: {}", e)))?;
        if llm.providers().is_empty() {
            tracing::warn!("No LLM provider configured, every reply will be the fallback text");
        } else {
            tracing::info!(providers = ?llm.providers(), "LLM providers configured");
        }

        Self::from_parts(db, config, Arc::new(llm))
    }

    /// Assemble the state from an open pool and a model.
    pub fn from_parts(db: DbPool, config: &Config, model: Arc<dyn ChatModel>) -> Result<Self> {
        let uploads = UploadStore::new(
            &config.storage.uploads_path,
            config.storage.max_upload_size,
        );

        let auth = AuthService::new(db.clone(), config.auth.clone(), config.users.default_credits)?;
        let projects = ProjectService::new(db.clone(), uploads.clone());
        let conversation = ConversationService::new(
            db.clone(),
            model.clone(),
            uploads.clone(),
            config.context.history_limit,
        );

        Ok(Self {
            db,
            auth,
            projects,
            uploads,
            conversation,
            model,
        })
    }
}
