//! Stage driver
//!
//! Owns one task record from `Created` to a terminal stage. The
//! source pattern of a service patching itself forward is modeled as a
//! compare-and-swap loop: read the record, run the current stage's
//! action, attempt a conditional write carrying the version that was
//! read. A conflicting write from a racing transition is never
//! overwritten; the driver re-reads and recomputes the stage from the
//! freshly persisted state.

use crate::error::{EngineError, Result};
use crate::ledger::{CompensationLedger, REPLAY_MARKER};
use crate::notify::ParentNotifier;
use convoy_cloud::CloudAdapter;
use convoy_core::{
    FailureCode, FailureReason, LifecycleStage, SubStage, TaskInputs, TaskRecord, UndoEntry,
};
use convoy_store::DocumentStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Collaborators a stage action may call out to
#[derive(Clone)]
pub struct StageContext {
    pub store: Arc<dyn DocumentStore>,
    pub adapter: Arc<dyn CloudAdapter>,
}

/// One task kind: its stage enum and the action behind each stage
///
/// `execute` performs the work for the record's current stage and says
/// what happens next. It must not persist the record itself; the
/// driver owns all writes.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    type Stage: SubStage;

    /// Store collection the task records live in
    const KIND: &'static str;

    /// Reject malformed creation requests before anything is persisted
    fn validate(&self, inputs: &TaskInputs) -> convoy_core::Result<()> {
        inputs.validate()
    }

    /// Run the action for the record's current stage
    async fn execute(
        &self,
        ctx: &StageContext,
        record: &TaskRecord<Self::Stage>,
    ) -> Result<StageOutcome>;
}

/// What a completed stage action asks the driver to do
#[derive(Debug)]
pub enum StageOutcome {
    /// Advance to the next stage
    Proceed {
        /// Working-state fields to merge into the record
        working: HashMap<String, serde_json::Value>,
        /// Undo entries for work this stage durably completed
        undo: Vec<UndoEntry>,
    },
    /// Terminate successfully with caller-visible outputs
    Finish {
        outputs: HashMap<String, serde_json::Value>,
    },
    /// Terminate as cancelled
    Cancel,
}

impl StageOutcome {
    /// Advance with no working-state changes
    pub fn proceed() -> Self {
        StageOutcome::Proceed {
            working: HashMap::new(),
            undo: Vec::new(),
        }
    }

    pub fn proceed_with(working: HashMap<String, serde_json::Value>) -> Self {
        StageOutcome::Proceed {
            working,
            undo: Vec::new(),
        }
    }

    pub fn finish(outputs: HashMap<String, serde_json::Value>) -> Self {
        StageOutcome::Finish { outputs }
    }
}

/// Result of one driver step
#[derive(Debug)]
pub enum StepResult<S> {
    /// A stage completed and the transition was persisted
    Advanced(TaskRecord<S>),
    /// The targeted stage was already passed; nothing was done
    Stale(TaskRecord<S>),
    /// The record is in a terminal stage
    Terminal(TaskRecord<S>),
}

/// Drives one task record to a terminal stage
pub struct StageDriver<W: Workflow> {
    workflow: Arc<W>,
    ctx: StageContext,
    notifier: ParentNotifier,
}

impl<W: Workflow> StageDriver<W> {
    pub fn new(
        workflow: Arc<W>,
        store: Arc<dyn DocumentStore>,
        adapter: Arc<dyn CloudAdapter>,
        notifier: ParentNotifier,
    ) -> Self {
        Self {
            workflow,
            ctx: StageContext { store, adapter },
            notifier,
        }
    }

    /// Reject an invalid creation request
    ///
    /// No partial task record is ever persisted from a request that
    /// fails here.
    pub fn validate_start_post(&self, inputs: &TaskInputs) -> Result<()> {
        self.workflow
            .validate(inputs)
            .map_err(|e| EngineError::Validation(e.to_string()))
    }

    /// Advance the record until it reaches a terminal stage
    pub async fn run(&self, link: &str) -> Result<TaskRecord<W::Stage>> {
        loop {
            match self.step(link).await? {
                StepResult::Terminal(record) => return Ok(record),
                StepResult::Advanced(_) | StepResult::Stale(_) => continue,
            }
        }
    }

    /// Handle one self-transition message targeting `target`
    ///
    /// A message for a stage the record has already moved past is a
    /// no-op; the record, its working state included, is untouched. A
    /// message for a stage the record has not reached yet is rejected:
    /// only the record's own prior stage drives transitions.
    pub async fn advance(&self, link: &str, target: W::Stage) -> Result<StepResult<W::Stage>> {
        let doc = self.ctx.store.get(link).await?;
        let record: TaskRecord<W::Stage> = doc.decode()?;
        if record.is_terminal() {
            return Ok(StepResult::Terminal(record));
        }
        if record.has_passed(target) {
            tracing::debug!(
                "Task {} already past {:?}, ignoring stale self-transition",
                record.id,
                target
            );
            return Ok(StepResult::Stale(record));
        }
        if record.sub_stage != target {
            return Err(EngineError::Validation(format!(
                "self-transition targets {:?} but task {} is at {:?}",
                target, record.id, record.sub_stage
            )));
        }
        self.step(link).await
    }

    /// Execute the record's current stage and persist the transition
    ///
    /// On a version conflict the stage is recomputed from the freshly
    /// read record, never retried with stale data.
    pub async fn step(&self, link: &str) -> Result<StepResult<W::Stage>> {
        loop {
            let doc = self.ctx.store.get(link).await?;
            let record: TaskRecord<W::Stage> = doc.decode()?;
            if record.is_terminal() {
                // in-flight results for a terminal record are discarded
                return Ok(StepResult::Terminal(record));
            }

            let stage = record.sub_stage;
            tracing::debug!("Task {} executing stage {:?}", record.id, stage);

            let outcome = match self.workflow.execute(&self.ctx, &record).await {
                Ok(outcome) => outcome,
                Err(err) => return self.fail(link, record, doc.version, err).await,
            };

            let mut next = record;
            let terminal = apply_outcome(&mut next, outcome)?;
            match self
                .ctx
                .store
                .patch(link, serde_json::to_value(&next)?, doc.version)
                .await
            {
                Ok(persisted) => {
                    next.version = persisted.version;
                    if terminal {
                        tracing::info!("Task {} reached {}", next.id, next.lifecycle);
                        self.notifier.notify(&next).await;
                        return Ok(StepResult::Terminal(next));
                    }
                    tracing::debug!("Task {} advanced to {:?}", next.id, next.sub_stage);
                    return Ok(StepResult::Advanced(next));
                }
                Err(e) if e.is_version_conflict() => {
                    tracing::debug!("Version conflict on {}, recomputing stage", link);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drive the record to `Failed`, replay its ledger, notify the parent
    async fn fail(
        &self,
        link: &str,
        record: TaskRecord<W::Stage>,
        version_read: u64,
        err: EngineError,
    ) -> Result<StepResult<W::Stage>> {
        let reason = failure_reason_for(&err);
        tracing::warn!(
            "Task {} stage {:?} failed: {}",
            record.id,
            record.sub_stage,
            err
        );

        let mut failed = record;
        let mut version = version_read;
        loop {
            failed.fail(reason.clone())?;
            // marker persists with the Failed transition; terminal
            // immutability then makes a second replay impossible
            failed
                .working
                .insert(REPLAY_MARKER.to_string(), serde_json::Value::Bool(true));
            match self
                .ctx
                .store
                .patch(link, serde_json::to_value(&failed)?, version)
                .await
            {
                Ok(persisted) => {
                    failed.version = persisted.version;
                    break;
                }
                Err(e) if e.is_version_conflict() => {
                    let fresh_doc = self.ctx.store.get(link).await?;
                    let fresh: TaskRecord<W::Stage> = fresh_doc.decode()?;
                    if fresh.is_terminal() {
                        // a racing transition already terminated the record;
                        // it owns replay and notification
                        return Ok(StepResult::Terminal(fresh));
                    }
                    version = fresh_doc.version;
                    failed = fresh;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !failed.ledger.is_empty() {
            let ledger = CompensationLedger::from_entries(failed.ledger.clone());
            let outcome = ledger.replay(self.ctx.adapter.as_ref()).await;
            tracing::info!(
                "Task {} compensation replay: {}/{} undone, {} failed",
                failed.id,
                outcome.undone,
                outcome.attempted,
                outcome.failed.len()
            );
        }

        self.notifier.notify(&failed).await;
        Ok(StepResult::Terminal(failed))
    }
}

/// Fold a stage outcome into the record, returning whether it is terminal
fn apply_outcome<S: SubStage>(
    record: &mut TaskRecord<S>,
    outcome: StageOutcome,
) -> Result<bool> {
    match outcome {
        StageOutcome::Proceed { working, undo } => {
            record.working.extend(working);
            record.ledger.extend(undo);
            record.transition_to(LifecycleStage::Started)?;
            match record.sub_stage.next() {
                Some(next) => {
                    record.sub_stage = next;
                    Ok(false)
                }
                None => {
                    record.transition_to(LifecycleStage::Finished)?;
                    Ok(true)
                }
            }
        }
        StageOutcome::Finish { outputs } => {
            record
                .working
                .insert("outputs".to_string(), serde_json::to_value(outputs)?);
            record.transition_to(LifecycleStage::Started)?;
            record.transition_to(LifecycleStage::Finished)?;
            Ok(true)
        }
        StageOutcome::Cancel => {
            // Cancelled is only reachable from Started
            if record.lifecycle == LifecycleStage::Created {
                record.transition_to(LifecycleStage::Started)?;
            }
            record.transition_to(LifecycleStage::Cancelled)?;
            Ok(true)
        }
    }
}

/// Map an engine error to the structured reason stored on the record
fn failure_reason_for(err: &EngineError) -> FailureReason {
    let code = match err {
        EngineError::Validation(_) => FailureCode::BadRequest,
        EngineError::Adapter(_) => FailureCode::DependencyFailed,
        EngineError::Stage { .. } => FailureCode::DependencyFailed,
        _ => FailureCode::Internal,
    };
    FailureReason::new(code, err.to_string())
}
