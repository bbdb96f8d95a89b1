//! Project response models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{from_millis, ChatResponse};
use crate::db::{Project, ProjectWithCount};

/// A project as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chats: Option<Vec<ChatResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for ProjectResponse {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            is_default: project.is_default,
            chat_count: None,
            chats: None,
            created_at: from_millis(project.created_at),
            updated_at: from_millis(project.updated_at),
        }
    }
}

impl From<&ProjectWithCount> for ProjectResponse {
    fn from(row: &ProjectWithCount) -> Self {
        Self {
            chat_count: Some(row.chat_count),
            ..Self::from(&row.project)
        }
    }
}
