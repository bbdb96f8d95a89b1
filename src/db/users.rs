//! User account database queries.
//!
//! Handles local and Google accounts and the per-user credit balance.

use crate::models::now_millis;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use super::{map_unique, DbPool};

// ============================================================================
// Types
// ============================================================================

/// How the account signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
    /// Local password and a linked Google account.
    Both,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
            Self::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "google" => Self::Google,
            "both" => Self::Both,
            _ => Self::Local,
        }
    }
}

/// User record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub provider: String,
    pub credits: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn provider_enum(&self) -> AuthProvider {
        AuthProvider::from_str(&self.provider)
    }
}

/// Input for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub provider: AuthProvider,
    pub credits: i64,
}

// ============================================================================
// User Queries
// ============================================================================

/// Create a new user.
pub async fn create_user(pool: &DbPool, input: CreateUser) -> Result<User> {
    let now = now_millis();

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, email, password_hash, google_id, avatar, provider, credits, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.name)
    .bind(input.email.to_lowercase())
    .bind(&input.password_hash)
    .bind(&input.google_id)
    .bind(&input.avatar)
    .bind(input.provider.as_str())
    .bind(input.credits)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique(e, "User already exists"))
}

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::UserNotFound)
}

/// Get a user by email (stored lowercase).
pub async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Get a user by Google account id.
pub async fn get_user_by_google_id(pool: &DbPool, google_id: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
        .bind(google_id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Attach a Google account to an existing local user.
///
/// The avatar is only filled in when the user has none.
pub async fn link_google_account(
    pool: &DbPool,
    id: &str,
    google_id: &str,
    avatar: Option<&str>,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET google_id = ?, provider = 'both', avatar = COALESCE(avatar, ?), updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(google_id)
    .bind(avatar)
    .bind(now_millis())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::UserNotFound)
}

/// Charge one credit. Balances may go negative; there is no gate on sending.
pub async fn decrement_credits(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET credits = credits - 1, updated_at = ? WHERE id = ?")
        .bind(now_millis())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_test_db;

    fn local_user(email: &str) -> CreateUser {
        CreateUser {
            id: crate::models::new_id(),
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: Some("hash".to_string()),
            google_id: None,
            avatar: None,
            provider: AuthProvider::Local,
            credits: 100,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let pool = setup_test_db().await;

        let user = create_user(&pool, local_user("ada@example.com")).await.unwrap();
        assert_eq!(user.provider_enum(), AuthProvider::Local);
        assert_eq!(user.credits, 100);

        let by_email = get_user_by_email(&pool, "ADA@example.com").await.unwrap();
        assert_eq!(by_email.unwrap().id, user.id);

        let fetched = get_user(&pool, &user.id).await.unwrap();
        assert_eq!(fetched.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let pool = setup_test_db().await;

        create_user(&pool, local_user("dup@example.com")).await.unwrap();
        let result = create_user(&pool, local_user("dup@example.com")).await;

        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_link_google_account() {
        let pool = setup_test_db().await;
        let user = create_user(&pool, local_user("link@example.com")).await.unwrap();

        let linked = link_google_account(&pool, &user.id, "g-123", Some("https://img/a.png"))
            .await
            .unwrap();

        assert_eq!(linked.provider_enum(), AuthProvider::Both);
        assert_eq!(linked.avatar.as_deref(), Some("https://img/a.png"));
        assert!(get_user_by_google_id(&pool, "g-123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_decrement_credits() {
        let pool = setup_test_db().await;
        let user = create_user(&pool, local_user("credits@example.com")).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        decrement_credits(&mut conn, &user.id).await.unwrap();
        drop(conn);

        assert_eq!(get_user(&pool, &user.id).await.unwrap().credits, 99);
    }
}
