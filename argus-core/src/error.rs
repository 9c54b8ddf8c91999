//! Error type shared by the stores and model validation.

use thiserror::Error;

/// Failure from a store, a model check, or client construction.
#[derive(Error, Debug)]
pub enum CoreError {
    /// PostgreSQL driver error.
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before reaching a store.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else, with a message for the log.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// [`CoreError::NotFound`] naming a camera id.
    pub fn camera_not_found(camera_id: &str) -> Self {
        Self::NotFound(format!("camera {camera_id}"))
    }

    /// Whether this is [`CoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
