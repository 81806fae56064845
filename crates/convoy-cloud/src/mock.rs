//! Mock adapter for dry runs and tests
//!
//! Backs the service's dry-run flag: every unscripted call succeeds
//! immediately with an empty body and no provider is ever contacted.
//! Tests script per-target outcomes to exercise failure paths.

use crate::adapter::{AdapterRequest, AdapterResponse, CloudAdapter};
use crate::error::{AdapterError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

enum Scripted {
    Succeed(serde_json::Value),
    Fail(String),
    FailOnce(String),
}

/// Scriptable in-process adapter
#[derive(Default)]
pub struct MockAdapter {
    outcomes: Mutex<HashMap<String, Scripted>>,
    log: Mutex<Vec<AdapterRequest>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful response for calls targeting `target_link`
    pub async fn succeed_with(&self, target_link: impl Into<String>, body: serde_json::Value) {
        self.outcomes
            .lock()
            .await
            .insert(target_link.into(), Scripted::Succeed(body));
    }

    /// Script a failure for calls targeting `target_link`
    pub async fn fail_with(&self, target_link: impl Into<String>, message: impl Into<String>) {
        self.outcomes
            .lock()
            .await
            .insert(target_link.into(), Scripted::Fail(message.into()));
    }

    /// Script a single failure; later calls to the target succeed
    ///
    /// Lets a test fail a provisioning step while its compensation,
    /// which targets the same link, still goes through.
    pub async fn fail_once_with(&self, target_link: impl Into<String>, message: impl Into<String>) {
        self.outcomes
            .lock()
            .await
            .insert(target_link.into(), Scripted::FailOnce(message.into()));
    }

    /// Every request seen so far, in invocation order
    pub async fn invocations(&self) -> Vec<AdapterRequest> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl CloudAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: AdapterRequest) -> Result<AdapterResponse> {
        self.log.lock().await.push(request.clone());

        let mut outcomes = self.outcomes.lock().await;
        match outcomes.get(&request.target_link) {
            Some(Scripted::Succeed(body)) => Ok(AdapterResponse::new(body.clone())),
            Some(Scripted::Fail(message)) => Err(AdapterError::InvocationFailed {
                target: request.target_link,
                message: message.clone(),
            }),
            Some(Scripted::FailOnce(message)) => {
                let message = message.clone();
                outcomes.remove(&request.target_link);
                Err(AdapterError::InvocationFailed {
                    target: request.target_link,
                    message,
                })
            }
            // Unscripted targets succeed: this is the dry-run behavior
            None => Ok(AdapterResponse::empty()),
        }
    }
}
