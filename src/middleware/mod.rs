//! Middleware for Parley.
//!
//! - `auth` - JWT validation from header or cookie with refresh-cookie renewal

mod auth;

pub use auth::{require_auth, AuthUser};
