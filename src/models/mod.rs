//! Data models for Parley.
//!
//! Response shapes returned by the API. Database records live in
//! [`crate::db`]; these types convert them into the camelCase JSON the web
//! client consumes.

mod chat;
mod project;
mod user;

pub use chat::*;
pub use project::*;
pub use user::*;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a UTC timestamp.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}
