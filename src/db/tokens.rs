//! Refresh token and OAuth state queries.
//!
//! Refresh tokens are stored by a hash of their id so they can be rotated
//! and revoked. OAuth states hold the CSRF token and PKCE verifier of a
//! pending Google sign-in.

use crate::models::now_millis;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DbPool;

// ============================================================================
// Types
// ============================================================================

/// Refresh token record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: i64,
    pub is_active: bool,
    pub created_at: i64,
}

impl RefreshToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_millis()
    }
}

/// Pending OAuth sign-in.
#[derive(Debug, Clone, FromRow)]
pub struct OAuthState {
    pub state: String,
    pub pkce_verifier: String,
    pub expires_at: i64,
    pub created_at: i64,
}

// ============================================================================
// Refresh Token Queries
// ============================================================================

/// Store a refresh token hash.
pub async fn create_refresh_token(
    pool: &DbPool,
    id: &str,
    user_id: &str,
    token_hash: &str,
    expires_at: i64,
) -> Result<RefreshToken> {
    sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, is_active, created_at)
        VALUES (?, ?, ?, ?, 1, ?)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(now_millis())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Find an active, unexpired refresh token by hash.
pub async fn get_active_refresh_token(
    pool: &DbPool,
    token_hash: &str,
) -> Result<Option<RefreshToken>> {
    let token = sqlx::query_as::<_, RefreshToken>(
        "SELECT * FROM refresh_tokens WHERE token_hash = ? AND is_active = 1",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(token.filter(|t| !t.is_expired()))
}

/// Deactivate a single refresh token (rotation).
pub async fn deactivate_refresh_token(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("UPDATE refresh_tokens SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deactivate every refresh token of a user (logout).
pub async fn deactivate_user_refresh_tokens(pool: &DbPool, user_id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE refresh_tokens SET is_active = 0 WHERE user_id = ? AND is_active = 1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// OAuth State Queries
// ============================================================================

/// Store a pending OAuth state.
pub async fn create_oauth_state(
    pool: &DbPool,
    state: &str,
    pkce_verifier: &str,
    expires_at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO oauth_states (state, pkce_verifier, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(state)
    .bind(pkce_verifier)
    .bind(expires_at)
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(())
}

/// Consume an OAuth state. Returns `None` when unknown or expired.
pub async fn take_oauth_state(pool: &DbPool, state: &str) -> Result<Option<OAuthState>> {
    let found = sqlx::query_as::<_, OAuthState>("DELETE FROM oauth_states WHERE state = ? RETURNING *")
        .bind(state)
        .fetch_optional(pool)
        .await?;

    Ok(found.filter(|s| s.expires_at > now_millis()))
}

/// Remove expired OAuth states.
pub async fn cleanup_oauth_states(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM oauth_states WHERE expires_at <= ?")
        .bind(now_millis())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, setup_test_db, AuthProvider, CreateUser};

    async fn user(pool: &DbPool) -> String {
        create_user(
            pool,
            CreateUser {
                id: crate::models::new_id(),
                name: "Tok".to_string(),
                email: "tok@example.com".to_string(),
                password_hash: None,
                google_id: None,
                avatar: None,
                provider: AuthProvider::Local,
                credits: 100,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_refresh_token_lifecycle() {
        let pool = setup_test_db().await;
        let user_id = user(&pool).await;
        let expires = now_millis() + 60_000;

        create_refresh_token(&pool, "t1", &user_id, "hash-1", expires).await.unwrap();
        create_refresh_token(&pool, "t2", &user_id, "hash-2", expires).await.unwrap();

        assert!(get_active_refresh_token(&pool, "hash-1").await.unwrap().is_some());

        deactivate_refresh_token(&pool, "t1").await.unwrap();
        assert!(get_active_refresh_token(&pool, "hash-1").await.unwrap().is_none());

        assert_eq!(deactivate_user_refresh_tokens(&pool, &user_id).await.unwrap(), 1);
        assert!(get_active_refresh_token(&pool, "hash-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_refresh_token_ignored() {
        let pool = setup_test_db().await;
        let user_id = user(&pool).await;

        create_refresh_token(&pool, "old", &user_id, "hash-old", now_millis() - 1)
            .await
            .unwrap();
        assert!(get_active_refresh_token(&pool, "hash-old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oauth_state_single_use() {
        let pool = setup_test_db().await;

        create_oauth_state(&pool, "csrf", "verifier", now_millis() + 600_000)
            .await
            .unwrap();

        let state = take_oauth_state(&pool, "csrf").await.unwrap().unwrap();
        assert_eq!(state.pkce_verifier, "verifier");
        assert!(take_oauth_state(&pool, "csrf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_oauth_state() {
        let pool = setup_test_db().await;

        create_oauth_state(&pool, "stale", "v", now_millis() - 1).await.unwrap();
        assert!(take_oauth_state(&pool, "stale").await.unwrap().is_none());
    }
}
