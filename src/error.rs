//! Service-level error taxonomy.
//!
//! Every service method returns `Result<_, CoreError>` — failures cross
//! service boundaries as typed values, never as panics. Lower-level errors
//! (sqlx, serde) are converted at the boundary that observes them, always
//! paired with a status-row update and a broadcast so callers are never
//! left looking at a stale "in progress" state.

use thiserror::Error;

/// Typed errors returned by the provisioning, connectivity, and crawl
/// services and by the job queues.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced source id does not exist in the catalog.
    #[error("source not found: {0}")]
    NotFound(String),

    /// The request was rejected before any durable state changed
    /// (malformed input, or a duplicate connection fingerprint).
    #[error("{message}")]
    Validation {
        message: String,
        /// Id of the already-registered source when the rejection is a
        /// duplicate-connection conflict.
        existing_id: Option<String>,
    },

    /// Credentials could not be stored or are missing. During provisioning
    /// this means the new source was rolled back.
    #[error("auth required: {0}")]
    AuthRequired(String),

    /// Adapter or store failure not otherwise classified.
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    /// Build an `Internal` error from any displayable cause.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        CoreError::Internal(cause.to_string())
    }

    /// Build a `Validation` error with no duplicate reference.
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            existing_id: None,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Internal(format!("database error: {}", e))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization error: {}", e))
    }
}
