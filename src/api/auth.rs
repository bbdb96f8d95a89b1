//! Authentication Routes
//!
//! Local accounts, token refresh and Google sign-in. Tokens are returned in
//! the body and set as HttpOnly cookies.
//!
//! Routes:
//! - POST /api/auth/register - Create a local account
//! - POST /api/auth/login - Sign in with email and password
//! - POST /api/auth/refresh - Rotate the refresh token
//! - POST /api/auth/logout - Revoke refresh tokens and clear cookies
//! - GET /api/auth/me - Current user
//! - GET /api/auth/google - Redirect to Google
//! - GET /api/auth/google/callback - Google redirect target

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::{self, User};
use crate::middleware::{require_auth, AuthUser};
use crate::models::UserResponse;
use crate::services::{AuthService, TokenPair, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::{AppState, Error, Result};

/// Build authentication routes.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/google", get(google_login))
        .route("/google/callback", get(google_callback))
        .route(
            "/me",
            get(me).layer(middleware::from_fn_with_state(state, require_auth)),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Access token, kept under `token` for older clients.
    pub token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a local account.
///
/// POST /api/auth/register
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let (user, tokens) = state
        .auth
        .register(&req.name, &req.email, &req.password)
        .await?;

    let jar = with_token_cookies(&state.auth, jar, &tokens);
    Ok((
        StatusCode::CREATED,
        jar,
        Json(auth_response(&user, tokens, "User registered successfully")),
    ))
}

/// Sign in with email and password.
///
/// POST /api/auth/login
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let (user, tokens) = state.auth.login(&req.email, &req.password).await?;

    let jar = with_token_cookies(&state.auth, jar, &tokens);
    Ok((jar, Json(auth_response(&user, tokens, "Login successful"))))
}

/// Rotate the refresh token. Reads the `refresh_token` cookie, falling back
/// to `refreshToken` in the body.
///
/// POST /api/auth/refresh
#[axum::debug_handler]
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unauthenticated)?;

    let (user, tokens) = state.auth.refresh(&token).await?;

    let jar = with_token_cookies(&state.auth, jar, &tokens);
    Ok((jar, Json(auth_response(&user, tokens, "Token refreshed"))))
}

/// Revoke the caller's refresh tokens and clear both cookies. Succeeds even
/// without a valid refresh cookie.
///
/// POST /api/auth/logout
#[axum::debug_handler]
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageEnvelope>)> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        match state.auth.validate_refresh_token(cookie.value()).await {
            Ok((claims, _)) => state.auth.logout(&claims.sub).await?,
            Err(e) => warn!(error = %e, "Logout with unusable refresh token"),
        }
    }

    let jar = jar
        .add(AuthService::removal_cookie(ACCESS_COOKIE))
        .add(AuthService::removal_cookie(REFRESH_COOKIE));

    Ok((
        jar,
        Json(MessageEnvelope {
            success: true,
            message: "Logout successful".to_string(),
        }),
    ))
}

/// Current user.
///
/// GET /api/auth/me
#[axum::debug_handler]
async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserEnvelope>> {
    let user = db::get_user(&state.db, &auth.user_id).await?;
    Ok(Json(UserEnvelope {
        success: true,
        user: UserResponse::from(&user),
    }))
}

/// Redirect to Google's consent screen.
///
/// GET /api/auth/google
#[axum::debug_handler]
async fn google_login(State(state): State<AppState>) -> Result<Redirect> {
    let url = state.auth.google_authorization_url().await?;
    Ok(Redirect::to(&url))
}

/// Finish Google sign-in and send the browser back to the client.
///
/// GET /api/auth/google/callback
#[axum::debug_handler]
async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    let client_url = crate::config().server.client_url.trim_end_matches('/').to_string();

    let result = match (query.code, query.state, query.error) {
        (Some(code), Some(csrf), None) => state.auth.google_callback(&code, &csrf).await,
        (_, _, error) => Err(Error::OAuth(
            error.unwrap_or_else(|| "Missing code or state".to_string()),
        )),
    };

    match result {
        Ok((_, tokens)) => {
            let jar = with_token_cookies(&state.auth, jar, &tokens);
            let target = format!("{}/?auth=success&token={}", client_url, tokens.access_token);
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Google sign-in failed");
            Redirect::to(&format!("{}/login?error=auth_failed", client_url)).into_response()
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn with_token_cookies(auth: &AuthService, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(auth.access_cookie(&tokens.access_token))
        .add(auth.refresh_cookie(&tokens.refresh_token))
}

fn auth_response(user: &User, tokens: TokenPair, message: &str) -> AuthResponse {
    AuthResponse {
        success: true,
        message: Some(message.to_string()),
        token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: UserResponse::from(user),
    }
}
