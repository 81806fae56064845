//! Engine error types
//!
//! The taxonomy the stage driver acts on: validation failures are
//! rejected before anything is persisted, version conflicts are
//! recovered by re-reading and recomputing the stage, adapter and stage
//! failures drive the record to `Failed` with a structured reason.

use convoy_cloud::AdapterError;
use convoy_core::CoreError;
use convoy_store::StoreError;
use thiserror::Error;

/// Orchestration engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Task model error: {0}")]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Build a fatal stage error
    pub fn stage(stage: impl std::fmt::Debug, message: impl Into<String>) -> Self {
        EngineError::Stage {
            stage: format!("{:?}", stage),
            message: message.into(),
        }
    }

    /// Whether this is an optimistic-concurrency rejection from the store
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_version_conflict())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
