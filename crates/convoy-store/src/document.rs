//! Versioned documents and query shapes

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One versioned document in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Store link, unique across the store
    pub self_link: String,

    /// Collection the document belongs to (e.g. "tasks", "vms")
    pub kind: String,

    /// Optimistic-concurrency token, bumped on every successful patch
    pub version: u64,

    /// Document body
    pub body: serde_json::Value,

    /// When the document was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from a serializable body
    pub fn new(kind: impl Into<String>, self_link: impl Into<String>, body: impl Serialize) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            self_link: self_link.into(),
            kind: kind.into(),
            version: 0,
            body: serde_json::to_value(body)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decode the body into a typed value
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// The parent link recorded in the body, if any
    pub fn parent_link(&self) -> Option<&str> {
        self.body.get("parent_link").and_then(|v| v.as_str())
    }
}

/// Filter for [`DocumentStore::query`](crate::store::DocumentStore::query)
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    /// Restrict to one collection
    pub kind: Option<String>,

    /// Restrict to documents whose body carries this parent link
    pub parent_link: Option<String>,

    /// Page size; 0 means store default
    pub page_size: usize,

    /// Continuation cursor from a previous page, opaque to callers
    pub cursor: Option<String>,
}

impl QuerySpec {
    pub fn children_of(parent_link: impl Into<String>) -> Self {
        Self {
            parent_link: Some(parent_link.into()),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One page of query results
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub documents: Vec<Document>,

    /// Present when more results remain; feed back via [`QuerySpec::with_cursor`]
    pub next_cursor: Option<String>,
}
