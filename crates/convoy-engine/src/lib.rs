//! Convoy orchestration engine
//!
//! The reusable skeleton every long-lived cloud operation runs on:
//!
//! - [`StageDriver`] advances a persisted task record through its
//!   workflow stages with version-checked self-transitions;
//! - [`fanout`] dispatches N independent sub-requests in parallel and
//!   joins every outcome, success or failure, into one result;
//! - [`CompensationLedger`] replays recorded undo actions when a later
//!   step fails;
//! - [`ParentNotifier`] delivers exactly one terminal-outcome message
//!   to an optional caller;
//! - [`TaskService`] is the create/get/cancel surface callers use.
//!
//! Workflows (provisioning, stats rollup) implement [`Workflow`] and
//! plug into the same loop.

pub mod driver;
pub mod error;
pub mod fanout;
pub mod ledger;
pub mod notify;
pub mod service;

// Re-exports
pub use driver::{StageContext, StageDriver, StageOutcome, StepResult, Workflow};
pub use error::{EngineError, Result};
pub use fanout::FanOutResult;
pub use ledger::{CompensationLedger, ReplayFailure, ReplayOutcome};
pub use notify::{CallbackSink, ParentNotifier, StoreCallbackSink, TaskOutcome};
pub use service::{CreatedTask, TaskService};
