//! Resource store collaborator
//!
//! The orchestration core never talks to a concrete database. It goes
//! through [`DocumentStore`]: versioned documents, optimistic-concurrency
//! patches, and parent-link queries with an opaque continuation cursor.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! dry runs; a replicated store plugs in behind the same trait.

pub mod document;
pub mod error;
pub mod memory;
pub mod store;

// Re-exports
pub use document::{Document, QueryPage, QuerySpec};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::DocumentStore;
