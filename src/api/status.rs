//! Status Routes
//!
//! Routes:
//! - GET / - Liveness text
//! - GET /health - Health check with uptime
//! - GET /api/test - Smoke test endpoint

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

// Global counters
static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static STARTUP_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize startup time. Call this once at server start.
pub fn init_startup_time() {
    let _ = STARTUP_TIME.get_or_init(Instant::now);
}

/// Uptime in seconds since server start.
fn uptime_seconds() -> f64 {
    STARTUP_TIME
        .get()
        .map(|start| start.elapsed().as_secs_f64())
        .unwrap_or(0.0)
}

/// Middleware counting requests and 5xx responses.
pub async fn track_requests(req: Request, next: Next) -> Response {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
    let response = next.run(req).await;
    if response.status().is_server_error() {
        ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }
    response
}

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/test", get(test_endpoint))
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since start.
    pub uptime: f64,
    pub requests: u64,
    pub errors: u64,
    pub database: bool,
}

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
async fn root() -> &'static str {
    "Server is Live!"
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        uptime: uptime_seconds(),
        requests: REQUEST_COUNT.load(Ordering::Relaxed),
        errors: ERROR_COUNT.load(Ordering::Relaxed),
        database,
    })
}

/// GET /api/test
async fn test_endpoint() -> Json<TestResponse> {
    Json(TestResponse {
        success: true,
        message: "Server is working correctly",
        timestamp: Utc::now(),
    })
}
