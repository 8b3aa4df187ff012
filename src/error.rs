use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the platform location service
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationError {
    #[error("Location access denied by user")]
    PermissionDenied,

    #[error("Location information unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,
}

/// Ride tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Session already recording")]
    AlreadyRecording,

    #[error("Session not recording")]
    NotRecording,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Not enough route points to save an activity ({points} recorded, need at least 2)")]
    InsufficientRoutePoints { points: usize },

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    /// Whether the error should be shown to the rider rather than only logged
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, TrackerError::Internal(_))
    }
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
