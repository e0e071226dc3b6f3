//! Unified error type for the walk tracker.
//!
//! Only blocking failures surface as [`WalkError`]: starting or ending a walk,
//! an optimistic status change that the server rejected, or authentication
//! that still fails after a refresh. Transient failures (position errors,
//! periodic sync) are logged and swallowed where they happen.

use thiserror::Error;

use crate::position::PositionError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WalkError>;

#[derive(Debug, Error)]
pub enum WalkError {
    #[cfg(feature = "http")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "http")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response ({status}) {url}: {body}")]
    Api { status: u16, url: String, body: String },

    #[error("Authentication failed after token refresh")]
    Unauthorized,

    #[error("No active walk session")]
    NoActiveSession,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Map capture failed: {0}")]
    Capture(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Position source error: {0}")]
    Position(#[from] PositionError),
}

impl WalkError {
    /// Whether the failure came from an HTTP 401 that survived the refresh retry.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, WalkError::Unauthorized)
    }
}

/// Helpers for turning missing state into a [`WalkError`].
pub trait OptionExt<T> {
    fn ok_or_no_session(self) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_no_session(self) -> Result<T> {
        self.ok_or(WalkError::NoActiveSession)
    }
}
