//! Parent notification
//!
//! A child orchestration is decoupled from whoever started it: on
//! reaching a terminal stage the driver hands the record to
//! [`ParentNotifier`], which delivers exactly one [`TaskOutcome`] to
//! the record's callback address, if it has one. Delivery is
//! fire-and-forget: a failure is logged, never retried indefinitely,
//! and never changes the record's own terminal state.

use crate::error::Result;
use convoy_core::{FailureReason, LifecycleStage, SubStage, TaskRecord};
use convoy_store::DocumentStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Terminal-outcome message delivered to a waiting parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Link of the task that finished
    pub task_link: String,

    /// Terminal lifecycle stage reached
    pub lifecycle: LifecycleStage,

    /// Failure reason, present when `lifecycle == Failed`
    pub failure: Option<FailureReason>,

    /// Caller-relevant outputs (created resource links, aggregated stats)
    #[serde(default)]
    pub outputs: HashMap<String, serde_json::Value>,
}

impl TaskOutcome {
    /// Build the outcome message for a terminal record
    pub fn from_record<S: SubStage>(record: &TaskRecord<S>) -> Self {
        Self {
            task_link: record.self_link.clone(),
            lifecycle: record.lifecycle,
            failure: record.failure.clone(),
            outputs: record.working_value("outputs").unwrap_or_default(),
        }
    }
}

/// Transport a terminal outcome to a callback address
///
/// The address is any URI-like string the sink knows how to reach;
/// the shipped implementation patches a store document.
#[async_trait]
pub trait CallbackSink: Send + Sync {
    async fn deliver(&self, address: &str, outcome: &TaskOutcome) -> Result<()>;
}

/// Delivers one outcome message per terminal record
pub struct ParentNotifier {
    sink: Arc<dyn CallbackSink>,
}

impl ParentNotifier {
    pub fn new(sink: Arc<dyn CallbackSink>) -> Self {
        Self { sink }
    }

    /// Notify the record's callback address, if any
    ///
    /// Called exactly once, only after the record has been durably
    /// persisted in its terminal stage.
    pub async fn notify<S: SubStage>(&self, record: &TaskRecord<S>) {
        let Some(address) = record.callback.as_deref() else {
            return;
        };
        if !record.is_terminal() {
            tracing::warn!(
                "Skipping notification for non-terminal task {}",
                record.self_link
            );
            return;
        }

        let outcome = TaskOutcome::from_record(record);
        match self.sink.deliver(address, &outcome).await {
            Ok(()) => {
                tracing::debug!(
                    "Notified {} of task {} ({})",
                    address,
                    record.self_link,
                    record.lifecycle
                );
            }
            Err(e) => {
                // fire-and-forget: the task's terminal state stands
                tracing::warn!("Callback delivery to {} failed: {}", address, e);
            }
        }
    }
}

/// Sink that patches the outcome into a store document
///
/// Covers the common case of a child task notifying the parent task
/// that spawned it: the callback address is the parent's record link.
pub struct StoreCallbackSink {
    store: Arc<dyn DocumentStore>,
}

impl StoreCallbackSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

const DELIVERY_ATTEMPTS: u32 = 3;

#[async_trait]
impl CallbackSink for StoreCallbackSink {
    async fn deliver(&self, address: &str, outcome: &TaskOutcome) -> Result<()> {
        // bounded retry: concurrent writers on the callback document are
        // expected, indefinite retry is not
        let mut attempt = 0;
        loop {
            attempt += 1;
            let doc = self.store.get(address).await?;
            let mut body = doc.body.clone();
            body["latest_outcome"] = serde_json::to_value(outcome)?;
            match self.store.patch(address, body, doc.version).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_version_conflict() && attempt < DELIVERY_ATTEMPTS => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
