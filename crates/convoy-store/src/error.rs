//! Store error types

use thiserror::Error;

/// Resource store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict on {link}: expected {expected}, actual {actual}")]
    VersionConflict {
        link: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error is an optimistic-concurrency rejection
    ///
    /// Conflicts are recovered by re-reading and recomputing, never by
    /// retrying the stale write.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
