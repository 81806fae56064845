//! In-memory document store
//!
//! Backs tests and dry runs. Version checking is exact: a patch carrying
//! a stale version is rejected, matching the contract a replicated store
//! provides.

use crate::document::{Document, QueryPage, QuerySpec};
use crate::error::{Result, StoreError};
use crate::store::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-process store keyed by self link
#[derive(Default)]
pub struct MemoryStore {
    // BTreeMap keeps query iteration order stable across pages
    documents: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, link: &str) -> Result<Document> {
        self.documents
            .read()
            .await
            .get(link)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(link.to_string()))
    }

    async fn create(&self, collection: &str, mut doc: Document) -> Result<Document> {
        let mut documents = self.documents.write().await;
        if doc.self_link.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "document for collection '{}' has no self link",
                collection
            )));
        }
        if documents.contains_key(&doc.self_link) {
            return Err(StoreError::AlreadyExists(doc.self_link));
        }
        doc.version = 0;
        doc.updated_at = Utc::now();
        documents.insert(doc.self_link.clone(), doc.clone());
        tracing::debug!("Created document {}", doc.self_link);
        Ok(doc)
    }

    async fn patch(
        &self,
        link: &str,
        body: serde_json::Value,
        expected_version: u64,
    ) -> Result<Document> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(link)
            .ok_or_else(|| StoreError::NotFound(link.to_string()))?;
        if doc.version != expected_version {
            return Err(StoreError::VersionConflict {
                link: link.to_string(),
                expected: expected_version,
                actual: doc.version,
            });
        }
        doc.body = body;
        doc.version += 1;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn delete(&self, link: &str) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents
            .remove(link)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(link.to_string()))
    }

    async fn query(&self, spec: QuerySpec) -> Result<QueryPage> {
        let documents = self.documents.read().await;
        let page_size = if spec.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            spec.page_size
        };
        let offset: usize = match &spec.cursor {
            Some(cursor) => cursor
                .parse()
                .map_err(|_| StoreError::InvalidQuery(format!("bad cursor: {}", cursor)))?,
            None => 0,
        };

        let matching: Vec<&Document> = documents
            .values()
            .filter(|doc| spec.kind.as_deref().is_none_or(|k| doc.kind == k))
            .filter(|doc| {
                spec.parent_link
                    .as_deref()
                    .is_none_or(|p| doc.parent_link() == Some(p))
            })
            .collect();

        let page: Vec<Document> = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|doc| (*doc).clone())
            .collect();

        let next_cursor = if offset + page.len() < matching.len() {
            Some((offset + page.len()).to_string())
        } else {
            None
        };

        Ok(QueryPage {
            documents: page,
            next_cursor,
        })
    }
}
