//! Legacy User Routes
//!
//! Kept for older clients. Issues a single long-lived access token in the
//! body and sets no cookies.
//!
//! Routes:
//! - POST /api/user/register - Create a local account
//! - POST /api/user/login - Sign in
//! - GET /api/user/data - Current user

use axum::{
    extract::{Extension, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::middleware::{require_auth, AuthUser};
use crate::models::UserResponse;
use crate::{AppState, Result};

/// Build legacy user routes.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/data",
            get(user_data).layer(middleware::from_fn_with_state(state, require_auth)),
        )
}

#[derive(Debug, Deserialize)]
pub struct LegacyRegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LegacyLoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenEnvelope {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserDataEnvelope {
    pub success: bool,
    pub user: UserResponse,
}

/// POST /api/user/register
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<LegacyRegisterRequest>,
) -> Result<Json<TokenEnvelope>> {
    let user = state
        .auth
        .create_local_user(&req.name, &req.email, &req.password)
        .await?;

    Ok(Json(TokenEnvelope {
        success: true,
        token: state.auth.legacy_token(&user.id)?,
    }))
}

/// POST /api/user/login
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LegacyLoginRequest>,
) -> Result<Json<TokenEnvelope>> {
    let user = state.auth.authenticate(&req.email, &req.password).await?;

    Ok(Json(TokenEnvelope {
        success: true,
        token: state.auth.legacy_token(&user.id)?,
    }))
}

/// GET /api/user/data
#[axum::debug_handler]
async fn user_data(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserDataEnvelope>> {
    let user = db::get_user(&state.db, &auth.user_id).await?;
    Ok(Json(UserDataEnvelope {
        success: true,
        user: UserResponse::from(&user),
    }))
}
