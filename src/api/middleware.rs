//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error envelope and its mapping from service errors
//! - Caller identification from the trusted user header

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::{TimeTrackingError, TimerService, TimesheetService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    pub timer_service: Arc<TimerService>,
    pub timesheet_service: Arc<TimesheetService>,
    /// Header carrying the authenticated user id
    pub user_header: HeaderName,
}

/// Caller identity, set by [`require_user`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new("INVALID_STATE", message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new("STORAGE_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "INVALID_STATE" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<TimeTrackingError> for ApiError {
    fn from(err: TimeTrackingError) -> Self {
        match err {
            TimeTrackingError::Validation(msg) => Self::validation_error(msg),
            TimeTrackingError::Conflict(msg) => Self::conflict(msg),
            TimeTrackingError::NotFound(msg) => Self::not_found(format!("Not found: {}", msg)),
            TimeTrackingError::InvalidState(msg) => Self::invalid_state(msg),
            TimeTrackingError::Storage(e) => {
                // details stay in the log, not in the response
                tracing::error!("Storage failure: {:#}", e);
                Self::storage_error("The time entry store is unavailable")
            }
        }
    }
}

/// Parse the caller id from the configured header
fn user_id_from_header(request: &Request, header: &HeaderName) -> Option<i64> {
    request
        .headers()
        .get(header)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}

/// Identification middleware
///
/// The surrounding auth layer forwards the user id in a trusted header;
/// requests without a valid one are rejected with 401.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = user_id_from_header(&request, &state.user_header).ok_or_else(|| {
        ApiError::unauthorized(format!("Missing or invalid '{}' header", state.user_header.as_str()))
    })?;

    request.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (TimeTrackingError::Validation("x".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (TimeTrackingError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (TimeTrackingError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (TimeTrackingError::InvalidState("x".into()), StatusCode::CONFLICT, "INVALID_STATE"),
            (
                TimeTrackingError::Storage(anyhow::anyhow!("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), status);
            assert_eq!(api.error.code, code);
        }
    }

    #[test]
    fn test_storage_error_hides_cause() {
        let api: ApiError = TimeTrackingError::Storage(anyhow::anyhow!("secret dsn")).into();
        assert!(!api.error.message.contains("secret"));
    }

    #[test]
    fn test_user_id_from_header() {
        let header = HeaderName::from_static("x-user-id");
        let request = |value: &str| {
            axum::http::Request::builder()
                .header("x-user-id", value)
                .body(axum::body::Body::empty())
                .unwrap()
        };

        assert_eq!(user_id_from_header(&request("42"), &header), Some(42));
        assert_eq!(user_id_from_header(&request(" 7 "), &header), Some(7));
        assert_eq!(user_id_from_header(&request("abc"), &header), None);
        assert_eq!(user_id_from_header(&request("0"), &header), None);

        let bare = axum::http::Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(user_id_from_header(&bare, &header), None);
    }
}
