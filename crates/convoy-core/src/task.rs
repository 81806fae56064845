//! Durable task record
//!
//! A [`TaskRecord`] is the persisted state of one orchestration
//! instance. It is created once by the initiating caller, then mutated
//! exclusively through the stage driver's version-checked writes.

use crate::error::{CoreError, Result};
use crate::stage::{LifecycleStage, SubStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Durable state of one orchestration instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord<S> {
    /// Stable identity, assigned at creation, never reused
    pub id: String,

    /// Store link of this record
    pub self_link: String,

    /// Coarse lifecycle stage
    pub lifecycle: LifecycleStage,

    /// Workflow-specific stage, advances strictly forward
    pub sub_stage: S,

    /// Immutable request payload supplied at creation
    pub inputs: TaskInputs,

    /// Mutable fields accumulated as stages execute
    #[serde(default)]
    pub working: HashMap<String, serde_json::Value>,

    /// Undo actions recorded as multi-step work succeeds, oldest first
    #[serde(default)]
    pub ledger: Vec<UndoEntry>,

    /// Set only when `lifecycle == Failed`
    pub failure: Option<FailureReason>,

    /// Optional address a terminal-outcome message is delivered to
    pub callback: Option<String>,

    /// Optimistic-concurrency token; every write supplies the version it read
    pub version: u64,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl<S: SubStage> TaskRecord<S> {
    /// Build a new record at `(S::FIRST, Created)`
    ///
    /// `kind` is the store collection the record lives in.
    pub fn new(kind: &str, inputs: TaskInputs, callback: Option<String>) -> Self {
        let id = generate_task_id();
        let now = Utc::now();
        Self {
            self_link: format!("/{}/{}", kind, id),
            id,
            lifecycle: LifecycleStage::Created,
            sub_stage: S::FIRST,
            inputs,
            working: HashMap::new(),
            ledger: Vec::new(),
            failure: None,
            callback,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record admits no further transitions
    pub fn is_terminal(&self) -> bool {
        self.lifecycle.is_terminal()
    }

    /// Whether the record has already moved past `stage`
    ///
    /// A self-transition message targeting a passed stage is a no-op.
    pub fn has_passed(&self, stage: S) -> bool {
        self.is_terminal() || self.sub_stage > stage
    }

    /// Apply a lifecycle transition, rejecting anything off the lattice
    pub fn transition_to(&mut self, next: LifecycleStage) -> Result<()> {
        if self.lifecycle.is_terminal() {
            return Err(CoreError::Terminal(self.lifecycle));
        }
        if !self.lifecycle.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                from: self.lifecycle,
                to: next,
            });
        }
        self.lifecycle = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the record failed with a structured reason
    ///
    /// Every `Failed` record carries a non-null reason.
    pub fn fail(&mut self, reason: FailureReason) -> Result<()> {
        self.transition_to(LifecycleStage::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }

    /// Read a working-state value, decoded from JSON
    pub fn working_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.working
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Immutable request payload supplied at task creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInputs {
    /// Name of the resource the task operates on
    pub resource_name: String,

    /// Link of the parent resource, when the task aggregates children
    pub parent_link: Option<String>,

    /// Link of the provider endpoint the task provisions against
    pub endpoint_link: Option<String>,

    /// Short-circuit all external calls and report success
    #[serde(default)]
    pub dry_run: bool,

    /// Workflow-specific extra fields
    #[serde(default)]
    pub extras: HashMap<String, serde_json::Value>,
}

impl TaskInputs {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent_link(mut self, link: impl Into<String>) -> Self {
        self.parent_link = Some(link.into());
        self
    }

    pub fn with_endpoint_link(mut self, link: impl Into<String>) -> Self {
        self.endpoint_link = Some(link.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Baseline validation shared by every workflow
    ///
    /// Workflows add their own required-field checks on top.
    pub fn validate(&self) -> Result<()> {
        if self.resource_name.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "resource_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Read an extra field, decoded from JSON
    pub fn extra<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extras
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Structured reason attached to a `Failed` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub code: FailureCode,
    pub message: String,
}

impl FailureReason {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

/// Failure classification carried on the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// Malformed or incomplete request
    BadRequest,
    /// A dependency call failed and the owning stage treated it as fatal
    DependencyFailed,
    /// Unclassified stage failure
    Internal,
}

/// One recorded undo action
///
/// Appended only after the action it compensates has durably succeeded.
/// Entries sharing a `batch` are independent of each other; batches are
/// replayed newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    /// Link of the resource the undo targets
    pub target_link: String,

    /// What to do to the target
    pub action: UndoAction,

    /// Provider-specific undo payload
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Replay batch; higher batches are undone before lower ones
    pub batch: u32,
}

impl UndoEntry {
    pub fn new(target_link: impl Into<String>, action: UndoAction, batch: u32) -> Self {
        Self {
            target_link: target_link.into(),
            action,
            payload: serde_json::Value::Null,
            batch,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Compensation verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoAction {
    /// Delete a created resource
    Delete,
    /// Revoke a granted credential or role
    Revoke,
    /// Stop a started service
    Stop,
}

impl std::fmt::Display for UndoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoAction::Delete => write!(f, "delete"),
            UndoAction::Revoke => write!(f, "revoke"),
            UndoAction::Stop => write!(f, "stop"),
        }
    }
}

/// Generate a new task id
///
/// Ids must stay unique across every node sharing the store, not just
/// within one process.
pub fn generate_task_id() -> String {
    Uuid::new_v4().to_string()
}
