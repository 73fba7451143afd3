//! Health endpoint
//!
//! - GET /api/v1/health - Liveness plus a database ping

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api::middleware::AppState;

/// GET /api/v1/health
///
/// Returns 503 while the database is unreachable.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "ok" })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "unreachable" })),
            )
        }
    }
}
