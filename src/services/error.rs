//! Service error type

use thiserror::Error;

/// Errors produced by the timer and timesheet services
#[derive(Debug, Error)]
pub enum TimeTrackingError {
    /// Malformed input: bad task id, non-positive duration, inverted date range
    #[error("Validation error: {0}")]
    Validation(String),

    /// The user already has a running timer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entry or task does not exist, or is not visible to the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is not allowed in the entry's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl TimeTrackingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
