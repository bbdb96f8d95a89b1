//! Chat and message database queries.
//!
//! Messages are append-only and ordered by their row id.

use crate::models::now_millis;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::DbPool;

/// Name given to new chats until their first message renames them.
pub const NEW_CHAT_NAME: &str = "New Chat";

// ============================================================================
// Types
// ============================================================================

/// Chat record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Message record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    pub is_image: bool,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub file_path: Option<String>,
    pub stored_name: Option<String>,
}

/// Uploaded file attached to a new message.
#[derive(Debug, Clone)]
pub struct MessageFile {
    pub name: String,
    pub size: i64,
    pub media_type: String,
    pub path: String,
    pub stored_name: String,
}

/// Input for appending a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: i64,
    pub is_image: bool,
    pub file: Option<MessageFile>,
}

// ============================================================================
// Chat Queries
// ============================================================================

/// Create a new, empty chat in a project.
pub async fn create_chat(pool: &DbPool, id: &str, user_id: &str, project_id: &str) -> Result<Chat> {
    let now = now_millis();

    sqlx::query_as::<_, Chat>(
        r#"
        INSERT INTO chats (id, user_id, project_id, name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(project_id)
    .bind(NEW_CHAT_NAME)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a chat owned by `user_id`.
pub async fn get_chat(pool: &DbPool, id: &str, user_id: &str) -> Result<Chat> {
    sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Chat not found".to_string()))
}

/// List a user's chats, most recently updated first, optionally for one project.
pub async fn list_chats(pool: &DbPool, user_id: &str, project_id: Option<&str>) -> Result<Vec<Chat>> {
    sqlx::query_as::<_, Chat>(
        r#"
        SELECT * FROM chats
        WHERE user_id = ? AND (? IS NULL OR project_id = ?)
        ORDER BY updated_at DESC, created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(project_id)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// All chats of a project in memory order: least recently updated first.
pub async fn list_project_chats(pool: &DbPool, project_id: &str) -> Result<Vec<Chat>> {
    sqlx::query_as::<_, Chat>(
        r#"
        SELECT * FROM chats
        WHERE project_id = ?
        ORDER BY updated_at ASC, created_at ASC, id ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Delete a chat and its messages.
pub async fn delete_chat(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rename a chat that still carries the placeholder name.
pub async fn rename_new_chat(conn: &mut SqliteConnection, id: &str, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE chats SET name = ? WHERE id = ? AND name = ?")
        .bind(name)
        .bind(id)
        .bind(NEW_CHAT_NAME)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Bump a chat's update time.
pub async fn touch_chat(conn: &mut SqliteConnection, id: &str, at: i64) -> Result<()> {
    sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ============================================================================
// Message Queries
// ============================================================================

/// Append a message. Returns its row id.
pub async fn insert_message(conn: &mut SqliteConnection, input: &NewMessage) -> Result<i64> {
    let file = input.file.as_ref();

    let result = sqlx::query(
        r#"
        INSERT INTO messages
            (chat_id, role, content, timestamp, is_image, file_name, file_size, file_type, file_path, stored_name)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.chat_id)
    .bind(&input.role)
    .bind(&input.content)
    .bind(input.timestamp)
    .bind(input.is_image)
    .bind(file.map(|f| f.name.as_str()))
    .bind(file.map(|f| f.size))
    .bind(file.map(|f| f.media_type.as_str()))
    .bind(file.map(|f| f.path.as_str()))
    .bind(file.map(|f| f.stored_name.as_str()))
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Messages of one chat in insertion order.
pub async fn list_messages(pool: &DbPool, chat_id: &str) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE chat_id = ? ORDER BY id ASC")
        .bind(chat_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Messages of every chat in a project, in insertion order.
pub async fn list_project_messages(pool: &DbPool, project_id: &str) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT m.* FROM messages m
        JOIN chats c ON c.id = m.chat_id
        WHERE c.project_id = ?
        ORDER BY m.id ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Stored upload paths referenced by a chat's messages.
pub async fn list_chat_file_paths(pool: &DbPool, chat_id: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT file_path FROM messages WHERE chat_id = ? AND file_path IS NOT NULL ORDER BY id",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Stored upload paths referenced by any chat of a project.
pub async fn list_project_file_paths(pool: &DbPool, project_id: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT m.file_path FROM messages m
        JOIN chats c ON c.id = m.chat_id
        WHERE c.project_id = ? AND m.file_path IS NOT NULL
        ORDER BY m.id
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Find a message carrying the upload `stored_name` in a chat owned by `user_id`.
pub async fn find_upload_message(
    pool: &DbPool,
    stored_name: &str,
    user_id: &str,
) -> Result<Option<Message>> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT m.* FROM messages m
        JOIN chats c ON c.id = m.chat_id
        WHERE m.stored_name = ? AND c.user_id = ?
        LIMIT 1
        "#,
    )
    .bind(stored_name)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_project, create_user, setup_test_db, AuthProvider, CreateProject, CreateUser};
    use crate::models::new_id;

    async fn seed(pool: &DbPool) -> (String, String) {
        let user = create_user(
            pool,
            CreateUser {
                id: new_id(),
                name: "Chatty".to_string(),
                email: "chatty@example.com".to_string(),
                password_hash: None,
                google_id: None,
                avatar: None,
                provider: AuthProvider::Local,
                credits: 100,
            },
        )
        .await
        .unwrap();

        let project = create_project(
            pool,
            CreateProject {
                id: new_id(),
                user_id: user.id.clone(),
                name: "Main".to_string(),
                description: String::new(),
                is_default: true,
            },
        )
        .await
        .unwrap();

        (user.id, project.id)
    }

    fn text(chat_id: &str, role: &str, content: &str, timestamp: i64) -> NewMessage {
        NewMessage {
            chat_id: chat_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            timestamp,
            is_image: false,
            file: None,
        }
    }

    #[tokio::test]
    async fn test_chat_ownership() {
        let pool = setup_test_db().await;
        let (user_id, project_id) = seed(&pool).await;

        let chat = create_chat(&pool, &new_id(), &user_id, &project_id).await.unwrap();
        assert_eq!(chat.name, NEW_CHAT_NAME);

        assert!(get_chat(&pool, &chat.id, &user_id).await.is_ok());
        assert!(matches!(
            get_chat(&pool, &chat.id, "someone-else").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_messages_keep_insertion_order() {
        let pool = setup_test_db().await;
        let (user_id, project_id) = seed(&pool).await;
        let chat = create_chat(&pool, &new_id(), &user_id, &project_id).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        insert_message(&mut conn, &text(&chat.id, "user", "first", 200)).await.unwrap();
        insert_message(&mut conn, &text(&chat.id, "assistant", "second", 100)).await.unwrap();
        drop(conn);

        let messages = list_messages(&pool, &chat.id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_rename_only_new_chats() {
        let pool = setup_test_db().await;
        let (user_id, project_id) = seed(&pool).await;
        let chat = create_chat(&pool, &new_id(), &user_id, &project_id).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(rename_new_chat(&mut conn, &chat.id, "Trip planning").await.unwrap());
        assert!(!rename_new_chat(&mut conn, &chat.id, "Something else").await.unwrap());
        drop(conn);

        assert_eq!(get_chat(&pool, &chat.id, &user_id).await.unwrap().name, "Trip planning");
    }

    #[tokio::test]
    async fn test_file_paths_and_lookup() {
        let pool = setup_test_db().await;
        let (user_id, project_id) = seed(&pool).await;
        let chat = create_chat(&pool, &new_id(), &user_id, &project_id).await.unwrap();

        let mut message = text(&chat.id, "user", "Uploaded file: a.txt", 1);
        message.file = Some(MessageFile {
            name: "a.txt".to_string(),
            size: 3,
            media_type: "text/plain".to_string(),
            path: "uploads/file-1-2.txt".to_string(),
            stored_name: "file-1-2.txt".to_string(),
        });

        let mut conn = pool.acquire().await.unwrap();
        insert_message(&mut conn, &message).await.unwrap();
        drop(conn);

        assert_eq!(
            list_chat_file_paths(&pool, &chat.id).await.unwrap(),
            vec!["uploads/file-1-2.txt"]
        );
        assert_eq!(list_project_file_paths(&pool, &project_id).await.unwrap().len(), 1);
        assert!(find_upload_message(&pool, "file-1-2.txt", &user_id).await.unwrap().is_some());
        assert!(find_upload_message(&pool, "file-1-2.txt", "intruder").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_project_chats_in_memory_order() {
        let pool = setup_test_db().await;
        let (user_id, project_id) = seed(&pool).await;

        let older = create_chat(&pool, &new_id(), &user_id, &project_id).await.unwrap();
        let newer = create_chat(&pool, &new_id(), &user_id, &project_id).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        touch_chat(&mut conn, &older.id, now_millis() + 10_000).await.unwrap();
        drop(conn);

        let chats = list_project_chats(&pool, &project_id).await.unwrap();
        assert_eq!(chats[0].id, newer.id);
        assert_eq!(chats[1].id, older.id);

        let listed = list_chats(&pool, &user_id, Some(&project_id)).await.unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(list_chats(&pool, &user_id, None).await.unwrap().len(), 2);
    }
}
