//! User response model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::from_millis;
use crate::db::User;

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub provider: String,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            provider: user.provider.clone(),
            credits: user.credits,
            created_at: from_millis(user.created_at),
        }
    }
}
