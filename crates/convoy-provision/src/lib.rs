//! Provisioning workflows
//!
//! Two task kinds built on the Convoy engine:
//!
//! - [`ProvisionWorkflow`] creates a project resource step by step
//!   (credentials, resource, auth, auxiliary services), recording an
//!   undo entry after each step durably succeeds so a later failure
//!   rolls back everything already created;
//! - [`TeardownWorkflow`] deletes a provisioned project in reverse
//!   order. Teardown records no ledger: it is already the undo.

pub mod provision;
pub mod teardown;

// Re-exports
pub use provision::{ProvisionStage, ProvisionWorkflow};
pub use teardown::{TeardownStage, TeardownWorkflow};
