//! Project service for project management.
//!
//! Validates project input, keeps exactly one default project per owner
//! where possible, and removes uploaded files along with deleted projects.

use tracing::{debug, info};

use crate::db::{self, CreateProject, DbPool, Project, UpdateProject};
use crate::error::{Error, Result};
use crate::models::new_id;

use super::uploads::{RemovalReport, UploadStore};

pub const DEFAULT_PROJECT_NAME: &str = "My First Project";
pub const DEFAULT_PROJECT_DESCRIPTION: &str = "Default project for your chats";

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

/// Result of deleting a project.
#[derive(Debug, Clone)]
pub struct ProjectDeletion {
    pub chats_deleted: i64,
    pub files: RemovalReport,
    /// Project promoted to default because the deleted one was the default.
    pub promoted: Option<Project>,
}

impl ProjectDeletion {
    pub fn message(&self) -> String {
        if self.files.deleted + self.files.failed > 0 {
            format!(
                "Project deleted along with {} chat(s) and {} file(s){}",
                self.chats_deleted,
                self.files.deleted,
                self.files.failure_note()
            )
        } else {
            format!("Project and {} chat(s) deleted successfully", self.chats_deleted)
        }
    }
}

/// Service for managing projects.
#[derive(Clone)]
pub struct ProjectService {
    db: DbPool,
    uploads: UploadStore,
}

impl ProjectService {
    /// Create a new project service.
    pub fn new(db: DbPool, uploads: UploadStore) -> Self {
        Self { db, uploads }
    }

    /// Create a new project.
    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        description: Option<&str>,
        is_default: bool,
    ) -> Result<Project> {
        let name = validate_name(name)?;
        let description = validate_description(description.unwrap_or_default())?;

        let project = db::create_project(
            &self.db,
            CreateProject {
                id: new_id(),
                user_id: user_id.to_string(),
                name,
                description,
                is_default,
            },
        )
        .await?;

        info!(project_id = %project.id, user_id = %user_id, "Project created");
        Ok(project)
    }

    /// The owner's default project, created when missing.
    pub async fn ensure_default(&self, user_id: &str) -> Result<Project> {
        if let Some(project) = db::get_default_project(&self.db, user_id).await? {
            return Ok(project);
        }

        // A project with the default name may exist without the flag.
        if let Some(existing) = db::get_project_by_name(&self.db, user_id, DEFAULT_PROJECT_NAME).await? {
            return db::set_default_project(&self.db, &existing.id, user_id).await;
        }

        debug!(user_id = %user_id, "Creating default project");
        self.create(
            user_id,
            DEFAULT_PROJECT_NAME,
            Some(DEFAULT_PROJECT_DESCRIPTION),
            true,
        )
        .await
    }

    /// Update name, description or default flag.
    pub async fn update(
        &self,
        user_id: &str,
        project_id: &str,
        name: Option<&str>,
        description: Option<&str>,
        is_default: Option<bool>,
    ) -> Result<Project> {
        let input = UpdateProject {
            name: name.map(validate_name).transpose()?,
            description: description.map(validate_description).transpose()?,
            is_default,
        };

        // Ownership check before touching anything
        db::get_project(&self.db, project_id, user_id).await?;
        db::update_project(&self.db, project_id, user_id, input).await
    }

    /// Delete a project with its chats and uploaded files.
    ///
    /// The owner's only project cannot be deleted while it is the default.
    /// Deleting the default promotes the most recently updated remaining
    /// project.
    pub async fn delete(&self, user_id: &str, project_id: &str) -> Result<ProjectDeletion> {
        let project = db::get_project(&self.db, project_id, user_id).await?;

        if project.is_default && db::count_projects(&self.db, user_id).await? <= 1 {
            return Err(Error::Validation(
                "Cannot delete your only project. Create another project first.".to_string(),
            ));
        }

        let chats_deleted = db::list_project_chats(&self.db, project_id).await?.len() as i64;
        let file_paths = db::list_project_file_paths(&self.db, project_id).await?;

        let promoted = db::delete_project(&self.db, project_id, user_id).await?;
        let files = self.uploads.remove_all(&file_paths).await;

        info!(
            project_id = %project_id,
            chats_deleted,
            files_deleted = files.deleted,
            files_failed = files.failed,
            "Project deleted"
        );

        Ok(ProjectDeletion {
            chats_deleted,
            files,
            promoted,
        })
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Project name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(
            "Project name cannot exceed 100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(Error::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }
    Ok(description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, setup_test_db, AuthProvider, CreateUser};

    async fn setup() -> (ProjectService, String, tempfile::TempDir) {
        let pool = setup_test_db().await;
        let user = create_user(
            &pool,
            CreateUser {
                id: new_id(),
                name: "Pat".to_string(),
                email: "pat@example.com".to_string(),
                password_hash: None,
                google_id: None,
                avatar: None,
                provider: AuthProvider::Local,
                credits: 100,
            },
        )
        .await
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let service = ProjectService::new(pool, UploadStore::new(dir.path(), 1024));
        (service, user.id, dir)
    }

    #[tokio::test]
    async fn test_name_validation() {
        let (service, user_id, _dir) = setup().await;

        assert!(matches!(
            service.create(&user_id, "   ", None, false).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.create(&user_id, &"x".repeat(101), None, false).await,
            Err(Error::Validation(_))
        ));

        let project = service.create(&user_id, "  Trimmed  ", None, false).await.unwrap();
        assert_eq!(project.name, "Trimmed");
    }

    #[tokio::test]
    async fn test_ensure_default_is_idempotent() {
        let (service, user_id, _dir) = setup().await;

        let first = service.ensure_default(&user_id).await.unwrap();
        assert_eq!(first.name, DEFAULT_PROJECT_NAME);
        assert!(first.is_default);

        let second = service.ensure_default(&user_id).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_cannot_delete_only_default_project() {
        let (service, user_id, _dir) = setup().await;
        let default = service.ensure_default(&user_id).await.unwrap();

        assert!(matches!(
            service.delete(&user_id, &default.id).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_default_promotes_another() {
        let (service, user_id, _dir) = setup().await;
        let default = service.ensure_default(&user_id).await.unwrap();
        let other = service.create(&user_id, "Other", None, false).await.unwrap();

        let deletion = service.delete(&user_id, &default.id).await.unwrap();
        assert_eq!(deletion.chats_deleted, 0);
        assert_eq!(deletion.promoted.as_ref().unwrap().id, other.id);
        assert_eq!(deletion.message(), "Project and 0 chat(s) deleted successfully");
    }
}
