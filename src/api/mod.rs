//! API Routes for Parley
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod auth;
mod chats;
mod messages;
mod projects;
pub mod status;
mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::AppState;

/// Multipart framing around an upload of the maximum size.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the complete API router.
///
/// Route structure:
/// - /, /health, /api/test - Status (public)
/// - /api/auth/* - Authentication (mostly public)
/// - /api/user/* - Legacy account routes (mostly public)
/// - /api/project/* - Projects (authenticated)
/// - /api/chat/* - Chats (authenticated)
/// - /api/message/* - Messages and uploads (authenticated)
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(status::routes())
        .nest("/api/auth", auth::routes(state.clone()))
        .nest("/api/user", users::routes(state.clone()))
        .merge(protected_routes(state))
}

/// Routes that require authentication.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/project", projects::routes())
        .nest("/api/chat", chats::routes())
        .nest("/api/message", messages::routes())
        .route_layer(axum::middleware::from_fn_with_state(state, require_auth))
}

/// The full application: routes, fallback, CORS, body limit and tracing.
pub fn app(state: AppState) -> Router {
    let config = crate::config();
    let body_limit = state.uploads.max_size() + MULTIPART_OVERHEAD;

    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(routes(state.clone()))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(axum::middleware::from_fn(status::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// JSON 404 for unknown routes.
async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": format!("Route {} {} not found", method, uri.path()),
        })),
    )
}
