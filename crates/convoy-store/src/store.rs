//! Document store trait definition

use crate::document::{Document, QueryPage, QuerySpec};
use crate::error::Result;
use async_trait::async_trait;

/// Replicated resource store abstraction
///
/// All orchestration state goes through this trait. Durability and
/// replication are the implementation's concern; the core only relies
/// on the version token honoring compare-and-swap semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by link
    async fn get(&self, link: &str) -> Result<Document>;

    /// Persist a new document; fails if the link is taken
    async fn create(&self, collection: &str, doc: Document) -> Result<Document>;

    /// Replace a document body if `expected_version` still matches
    ///
    /// Returns the stored document with its bumped version, or
    /// [`StoreError::VersionConflict`](crate::error::StoreError::VersionConflict)
    /// when another writer got there first.
    async fn patch(
        &self,
        link: &str,
        body: serde_json::Value,
        expected_version: u64,
    ) -> Result<Document>;

    /// Remove a document by link
    async fn delete(&self, link: &str) -> Result<()>;

    /// Fetch one page of documents matching `spec`
    async fn query(&self, spec: QuerySpec) -> Result<QueryPage>;
}
