//! API layer - HTTP handlers and routing
//!
//! - Time entry endpoints (timers, manual entries, timesheets)
//! - Health endpoint
//!
//! Everything under `/api/v1/time-entries` requires the user header.

pub mod health;
pub mod middleware;
pub mod responses;
pub mod time_entries;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the API router (mounted under `/api/v1`)
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .nest("/time-entries", time_entries::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_user,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(protected_routes)
}

fn cors_layer(cors_origin: &str, user_header: &header::HeaderName) -> CorsLayer {
    let origin = if cors_origin == "*" {
        AllowOrigin::any()
    } else {
        match cors_origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin);
                AllowOrigin::list(Vec::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, user_header.clone()])
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = cors_layer(cors_origin, &state.user_header);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
