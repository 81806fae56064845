//! Cloud provider adapter abstraction
//!
//! Every external cloud call the orchestration core makes goes through
//! one [`CloudAdapter`]. An adapter wraps a single provider/action
//! surface (create a VM, grant a role, read a metric) behind a uniform
//! request/response pair, so the engine can treat any call as one
//! element of a fan-out.
//!
//! Retries, credentials, and wire formats live inside adapter
//! implementations; the core never sees them.

pub mod adapter;
pub mod error;
pub mod mock;
pub mod retry;

// Re-exports
pub use adapter::{AdapterAction, AdapterRequest, AdapterResponse, CloudAdapter};
pub use error::{AdapterError, Result};
pub use mock::MockAdapter;
pub use retry::RetryConfig;
