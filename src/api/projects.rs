//! Project Routes
//!
//! Project management for the authenticated user. Every route checks that
//! the project belongs to the caller; foreign projects are reported as not
//! found.
//!
//! Routes:
//! - GET /api/project - List projects with chat counts
//! - POST /api/project - Create a project
//! - GET /api/project/:project_id - Project with its chats
//! - PUT /api/project/:project_id - Update a project
//! - DELETE /api/project/:project_id - Delete a project, its chats and files
//! - POST /api/project/:project_id/default - Make a project the default
//! - GET /api/project/:project_id/memory - Shared conversation memory

use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::middleware::AuthUser;
use crate::models::{ChatResponse, ProjectResponse};
use crate::services::ProjectMemory;
use crate::{AppState, Result};

/// Build project routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:project_id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/:project_id/default", post(set_default))
        .route("/:project_id/memory", get(project_memory))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub project: ProjectResponse,
}

#[derive(Debug, Serialize)]
pub struct ListProjectsResponse {
    pub success: bool,
    pub projects: Vec<ProjectResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectResponse {
    pub success: bool,
    pub message: String,
    pub deleted_chats: i64,
    pub deleted_files: usize,
    pub failed_files: usize,
    /// Project that became the default, when the default was deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_default_project: Option<ProjectResponse>,
}

#[derive(Debug, Serialize)]
pub struct MemoryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub memory: ProjectMemory,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the caller's projects, default first.
///
/// GET /api/project
#[axum::debug_handler]
async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ListProjectsResponse>> {
    let projects = db::list_projects(&state.db, &auth.user_id).await?;

    Ok(Json(ListProjectsResponse {
        success: true,
        projects: projects.iter().map(ProjectResponse::from).collect(),
    }))
}

/// Create a project.
///
/// POST /api/project
#[axum::debug_handler]
async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<ProjectEnvelope>> {
    let project = state
        .projects
        .create(
            &auth.user_id,
            &req.name,
            req.description.as_deref(),
            req.is_default,
        )
        .await?;

    Ok(Json(ProjectEnvelope {
        success: true,
        message: Some("Project created successfully".to_string()),
        project: ProjectResponse::from(&project),
    }))
}

/// Project with its chats.
///
/// GET /api/project/:project_id
#[axum::debug_handler]
async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectEnvelope>> {
    let project = db::get_project(&state.db, &project_id, &auth.user_id).await?;
    let chats = db::list_chats(&state.db, &auth.user_id, Some(&project_id)).await?;

    let mut response = ProjectResponse::from(&project);
    response.chat_count = Some(chats.len() as i64);
    response.chats = Some(chats.iter().map(|c| ChatResponse::new(c, None)).collect());

    Ok(Json(ProjectEnvelope {
        success: true,
        message: None,
        project: response,
    }))
}

/// Update name, description or default flag.
///
/// PUT /api/project/:project_id
#[axum::debug_handler]
async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectEnvelope>> {
    let project = state
        .projects
        .update(
            &auth.user_id,
            &project_id,
            req.name.as_deref(),
            req.description.as_deref(),
            req.is_default,
        )
        .await?;

    Ok(Json(ProjectEnvelope {
        success: true,
        message: Some("Project updated successfully".to_string()),
        project: ProjectResponse::from(&project),
    }))
}

/// Delete a project with its chats and uploaded files.
///
/// DELETE /api/project/:project_id
#[axum::debug_handler]
async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<DeleteProjectResponse>> {
    let deletion = state.projects.delete(&auth.user_id, &project_id).await?;

    Ok(Json(DeleteProjectResponse {
        success: true,
        message: deletion.message(),
        deleted_chats: deletion.chats_deleted,
        deleted_files: deletion.files.deleted,
        failed_files: deletion.files.failed,
        new_default_project: deletion.promoted.as_ref().map(ProjectResponse::from),
    }))
}

/// Make a project the caller's default.
///
/// POST /api/project/:project_id/default
#[axum::debug_handler]
async fn set_default(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectEnvelope>> {
    let project = db::set_default_project(&state.db, &project_id, &auth.user_id).await?;

    Ok(Json(ProjectEnvelope {
        success: true,
        message: Some("Default project updated successfully".to_string()),
        project: ProjectResponse::from(&project),
    }))
}

/// The shared history every chat of the project contributes, and the tail
/// the model would receive. Does not call the model.
///
/// GET /api/project/:project_id/memory
#[axum::debug_handler]
async fn project_memory(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<MemoryResponse>> {
    let memory = state
        .conversation
        .project_memory(&auth.user_id, &project_id)
        .await?;

    Ok(Json(MemoryResponse {
        success: true,
        memory,
    }))
}
