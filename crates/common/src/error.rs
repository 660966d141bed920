//! Error types for ESignage

use thiserror::Error;

/// Result type alias using ESignage Error
pub type Result<T> = std::result::Result<T, Error>;

/// ESignage error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid device credentials")]
    Unauthorized,

    #[error("Image build failed: {0}")]
    ImageBuildFailed(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}
