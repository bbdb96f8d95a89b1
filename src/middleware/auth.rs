//! JWT authentication middleware.
//!
//! Accepts the access token from:
//! 1. `Authorization: Bearer <token>`
//! 2. A bare `Authorization: <token>` header
//! 3. The `access_token` cookie
//!
//! When the access token is expired or missing and a valid `refresh_token`
//! cookie is present, a new access token is issued and set as a cookie on
//! the response.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::debug;

use crate::db;
use crate::services::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::{error::Error, AppState};

/// Authenticated user, injected into request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

/// Middleware that requires a valid access token.
///
/// # Errors
///
/// Returns 401 Unauthorized when no token is present, the token is invalid
/// or expired without a usable refresh cookie, or the user no longer exists.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let token = request_token(&req, &jar);
    let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    let (user_id, renewed) = match (token, refresh) {
        (Some(token), refresh) => match state.auth.verify_access_token(&token) {
            Ok(claims) => (claims.sub, None),
            Err(Error::TokenExpired) if refresh.is_some() => {
                renew(&state, refresh.as_deref().unwrap_or_default()).await?
            }
            Err(e) => return Err(e),
        },
        (None, Some(refresh)) => renew(&state, &refresh).await?,
        (None, None) => return Err(Error::Unauthenticated),
    };

    let user = db::get_user(&state.db, &user_id).await?;
    req.extensions_mut().insert(AuthUser {
        user_id: user.id,
        name: user.name,
        email: user.email,
    });

    let mut response = next.run(req).await;

    if let Some(cookie) = renewed {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    Ok(response)
}

/// Issue a fresh access token from a refresh token.
async fn renew(state: &AppState, refresh: &str) -> Result<(String, Option<HeaderValue>), Error> {
    let (claims, _) = state.auth.validate_refresh_token(refresh).await?;
    let access = state.auth.access_token(&claims.sub)?;
    let cookie = state.auth.access_cookie(&access);

    debug!(user_id = %claims.sub, "Access token renewed from refresh cookie");

    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| Error::Internal(format!("Invalid cookie header: {}", e)))?;
    Ok((claims.sub, Some(value)))
}

fn request_token(req: &Request<Body>, jar: &CookieJar) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty());

    from_header.or_else(|| {
        jar.get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    })
}
