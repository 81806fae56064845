//! Task service surface
//!
//! What callers see: create a task (validated before persistence, then
//! driven to completion on its own tokio task), read a task, cancel a
//! task. Completion is observed either by polling the record or by
//! receiving the callback.

use crate::driver::{StageDriver, Workflow};
use crate::error::Result;
use crate::notify::{CallbackSink, ParentNotifier};
use convoy_cloud::{CloudAdapter, MockAdapter};
use convoy_core::{LifecycleStage, TaskInputs, TaskRecord};
use convoy_store::{Document, DocumentStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Create/get/cancel surface for one workflow
pub struct TaskService<W: Workflow> {
    workflow: Arc<W>,
    store: Arc<dyn DocumentStore>,
    adapter: Arc<dyn CloudAdapter>,
    sink: Arc<dyn CallbackSink>,
}

/// A freshly created task and the handle of its driver loop
#[derive(Debug)]
pub struct CreatedTask<S> {
    /// The record as persisted, at `(FIRST, Created)`
    pub record: TaskRecord<S>,

    /// Resolves with the terminal record once the driver loop finishes
    pub handle: JoinHandle<Result<TaskRecord<S>>>,
}

impl<W: Workflow> TaskService<W> {
    pub fn new(
        workflow: W,
        store: Arc<dyn DocumentStore>,
        adapter: Arc<dyn CloudAdapter>,
        sink: Arc<dyn CallbackSink>,
    ) -> Self {
        Self {
            workflow: Arc::new(workflow),
            store,
            adapter,
            sink,
        }
    }

    /// Validate, persist the initial record, and start its driver loop
    ///
    /// A request that fails validation is rejected with no record
    /// persisted. With `inputs.dry_run` set, external calls go to a
    /// mock adapter and succeed immediately.
    pub async fn create_task(
        &self,
        inputs: TaskInputs,
        callback: Option<String>,
    ) -> Result<CreatedTask<W::Stage>> {
        self.driver().validate_start_post(&inputs)?;

        let mut record: TaskRecord<W::Stage> = TaskRecord::new(W::KIND, inputs, callback);
        let doc = Document::new(W::KIND, record.self_link.clone(), &record)?;
        let created = self.store.create(W::KIND, doc).await?;
        record.version = created.version;
        tracing::info!("Created task {} ({})", record.self_link, W::KIND);

        let driver = self.driver_for(&record.inputs);
        let link = record.self_link.clone();
        let handle = tokio::spawn(async move { driver.run(&link).await });

        Ok(CreatedTask { record, handle })
    }

    /// Current state of a task record
    pub async fn get_task(&self, link: &str) -> Result<TaskRecord<W::Stage>> {
        Ok(self.store.get(link).await?.decode()?)
    }

    /// Move a non-terminal task to `Cancelled`
    ///
    /// In-flight stage work is allowed to complete, but its results are
    /// discarded: the driver observes the terminal stage on its next
    /// conditional write and stops.
    pub async fn cancel_task(&self, link: &str) -> Result<TaskRecord<W::Stage>> {
        loop {
            let doc = self.store.get(link).await?;
            let mut record: TaskRecord<W::Stage> = doc.decode()?;
            if record.is_terminal() {
                return Ok(record);
            }
            // Cancelled is only reachable from Started
            if record.lifecycle == LifecycleStage::Created {
                record.transition_to(LifecycleStage::Started)?;
            }
            record.transition_to(LifecycleStage::Cancelled)?;
            match self
                .store
                .patch(link, serde_json::to_value(&record)?, doc.version)
                .await
            {
                Ok(persisted) => {
                    record.version = persisted.version;
                    tracing::info!("Cancelled task {}", link);
                    ParentNotifier::new(self.sink.clone()).notify(&record).await;
                    return Ok(record);
                }
                Err(e) if e.is_version_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Build the driver a new record will run under
    fn driver_for(&self, inputs: &TaskInputs) -> StageDriver<W> {
        let adapter: Arc<dyn CloudAdapter> = if inputs.dry_run {
            Arc::new(MockAdapter::new())
        } else {
            self.adapter.clone()
        };
        StageDriver::new(
            self.workflow.clone(),
            self.store.clone(),
            adapter,
            ParentNotifier::new(self.sink.clone()),
        )
    }

    /// A driver wired to this service's live collaborators
    ///
    /// Exposed for callers that want to pump a record synchronously
    /// instead of through the spawned loop.
    pub fn driver(&self) -> StageDriver<W> {
        StageDriver::new(
            self.workflow.clone(),
            self.store.clone(),
            self.adapter.clone(),
            ParentNotifier::new(self.sink.clone()),
        )
    }
}
