//! Adapter error types

use thiserror::Error;

/// Cloud adapter errors
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Invocation failed for {target}: {message}")]
    InvocationFailed { target: String, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
