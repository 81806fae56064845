//! Convoy task model
//!
//! This crate defines the durable state of one orchestration instance:
//! the [`TaskRecord`] with its lifecycle and sub-stage progression, the
//! immutable request [`TaskInputs`], and the compensation ledger entries
//! accumulated while a multi-step operation succeeds.
//!
//! The record is pure data. Advancing it is the engine's job
//! (`convoy-engine`); persisting it is the store's (`convoy-store`).

pub mod error;
pub mod stage;
pub mod task;

// Re-exports
pub use error::{CoreError, Result};
pub use stage::{LifecycleStage, SubStage};
pub use task::{
    FailureCode, FailureReason, TaskInputs, TaskRecord, UndoAction, UndoEntry, generate_task_id,
};
