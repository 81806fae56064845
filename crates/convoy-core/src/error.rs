//! Task model error types

use crate::stage::LifecycleStage;
use thiserror::Error;

/// Errors raised by the task model itself
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid task request: {0}")]
    InvalidRequest(String),

    #[error("Illegal lifecycle transition: {from} -> {to}")]
    IllegalTransition {
        from: LifecycleStage,
        to: LifecycleStage,
    },

    #[error("Task is already terminal: {0}")]
    Terminal(LifecycleStage),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
