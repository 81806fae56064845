//! Cloud adapter trait definition

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cloud provider adapter abstraction
///
/// One adapter instance covers one provider surface. The engine issues
/// every external call through `invoke`, so a stage can fan requests
/// out across any mix of adapters and join the results uniformly.
#[async_trait]
pub trait CloudAdapter: Send + Sync {
    /// Adapter name for logs (e.g. "azure-compute", "mock")
    fn name(&self) -> &str;

    /// Execute one request against the provider
    async fn invoke(&self, request: AdapterRequest) -> Result<AdapterResponse>;
}

/// One provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRequest {
    /// What to do
    pub action: AdapterAction,

    /// Link of the resource the call targets
    pub target_link: String,

    /// Provider-specific request payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl AdapterRequest {
    pub fn new(action: AdapterAction, target_link: impl Into<String>) -> Self {
        Self {
            action,
            target_link: target_link.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Provider action verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterAction {
    /// Verify credentials against an endpoint
    CheckAuth,
    /// Create a resource
    Create,
    /// Delete a resource
    Delete,
    /// Grant a credential or role
    Grant,
    /// Revoke a credential or role
    Revoke,
    /// Start a service
    Start,
    /// Stop a service
    Stop,
    /// Read the latest metrics of a resource
    QueryMetrics,
}

impl std::fmt::Display for AdapterAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterAction::CheckAuth => write!(f, "check-auth"),
            AdapterAction::Create => write!(f, "create"),
            AdapterAction::Delete => write!(f, "delete"),
            AdapterAction::Grant => write!(f, "grant"),
            AdapterAction::Revoke => write!(f, "revoke"),
            AdapterAction::Start => write!(f, "start"),
            AdapterAction::Stop => write!(f, "stop"),
            AdapterAction::QueryMetrics => write!(f, "query-metrics"),
        }
    }
}

/// Result of one provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// Provider-specific response body
    pub body: serde_json::Value,

    /// When the provider answered
    pub captured_at: DateTime<Utc>,
}

impl AdapterResponse {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(serde_json::Value::Null)
    }
}
