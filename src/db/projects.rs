//! Project database queries.
//!
//! Projects group a user's chats and scope the shared conversation memory.
//! Each owner has at most one default project.

use crate::models::now_millis;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::{map_unique, DbPool};

const DUPLICATE_NAME: &str = "A project with this name already exists";

// ============================================================================
// Types
// ============================================================================

/// Project record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Project with the number of chats it holds.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectWithCount {
    #[sqlx(flatten)]
    pub project: Project,
    pub chat_count: i64,
}

/// Input for creating a new project.
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
}

/// Input for updating a project. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
}

// ============================================================================
// Project Queries
// ============================================================================

/// Create a new project. A new default project replaces the previous one.
pub async fn create_project(pool: &DbPool, input: CreateProject) -> Result<Project> {
    let mut tx = pool.begin().await?;

    if input.is_default {
        clear_default(&mut tx, &input.user_id).await?;
    }

    let now = now_millis();
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (id, user_id, name, description, is_default, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.user_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.is_default)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique(e, DUPLICATE_NAME))?;

    tx.commit().await?;
    Ok(project)
}

/// Get a project owned by `user_id`.
pub async fn get_project(pool: &DbPool, id: &str, user_id: &str) -> Result<Project> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Project not found".to_string()))
}

/// Get a user's project by exact name.
pub async fn get_project_by_name(pool: &DbPool, user_id: &str, name: &str) -> Result<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE user_id = ? AND name = ?")
        .bind(user_id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Get the user's default project, if any.
pub async fn get_default_project(pool: &DbPool, user_id: &str) -> Result<Option<Project>> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE user_id = ? AND is_default = 1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// List a user's projects: default first, then most recently updated.
pub async fn list_projects(pool: &DbPool, user_id: &str) -> Result<Vec<ProjectWithCount>> {
    sqlx::query_as::<_, ProjectWithCount>(
        r#"
        SELECT p.*, (SELECT COUNT(*) FROM chats c WHERE c.project_id = p.id) AS chat_count
        FROM projects p
        WHERE p.user_id = ?
        ORDER BY p.is_default DESC, p.updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Count a user's projects.
pub async fn count_projects(pool: &DbPool, user_id: &str) -> Result<i64> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Update a project. Making it the default clears every other default of
/// the owner in the same transaction.
pub async fn update_project(
    pool: &DbPool,
    id: &str,
    user_id: &str,
    input: UpdateProject,
) -> Result<Project> {
    let mut tx = pool.begin().await?;

    if input.is_default == Some(true) {
        clear_default(&mut tx, user_id).await?;
    }

    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET name = COALESCE(?, name),
            description = COALESCE(?, description),
            is_default = COALESCE(?, is_default),
            updated_at = ?
        WHERE id = ? AND user_id = ?
        RETURNING *
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.is_default)
    .bind(now_millis())
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| map_unique(e, DUPLICATE_NAME))?
    .ok_or_else(|| Error::NotFound("Project not found".to_string()))?;

    tx.commit().await?;
    Ok(project)
}

/// Make a project the owner's only default.
pub async fn set_default_project(pool: &DbPool, id: &str, user_id: &str) -> Result<Project> {
    update_project(
        pool,
        id,
        user_id,
        UpdateProject {
            is_default: Some(true),
            ..Default::default()
        },
    )
    .await
}

/// Delete a project. Chats and messages go with it.
///
/// When the deleted project was the default, the owner's most recently
/// updated remaining project becomes the default in the same transaction
/// and is returned.
pub async fn delete_project(pool: &DbPool, id: &str, user_id: &str) -> Result<Option<Project>> {
    let mut tx = pool.begin().await?;

    let (was_default,): (bool,) = sqlx::query_as(
        "DELETE FROM projects WHERE id = ? AND user_id = ? RETURNING is_default",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound("Project not found".to_string()))?;

    let promoted = if was_default {
        promote_latest_project(&mut tx, user_id).await?
    } else {
        None
    };

    tx.commit().await?;
    Ok(promoted)
}

async fn promote_latest_project(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<Project>> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects SET is_default = 1
        WHERE id = (
            SELECT id FROM projects WHERE user_id = ? ORDER BY updated_at DESC LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(Error::Database)
}

async fn clear_default(conn: &mut SqliteConnection, user_id: &str) -> Result<()> {
    sqlx::query("UPDATE projects SET is_default = 0 WHERE user_id = ? AND is_default = 1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
