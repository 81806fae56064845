//! Shared fixtures for engine integration tests

use convoy_cloud::{AdapterAction, AdapterRequest};
use convoy_core::{SubStage, TaskInputs, TaskRecord, UndoAction, UndoEntry};
use convoy_engine::{CallbackSink, Result, StageContext, StageOutcome, TaskOutcome, Workflow};
use convoy_store::{Document, DocumentStore, MemoryStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// Three-stage toy progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStage {
    Reserve,
    Commit,
    Publish,
}

impl SubStage for TestStage {
    const FIRST: Self = TestStage::Reserve;

    fn next(self) -> Option<Self> {
        match self {
            TestStage::Reserve => Some(TestStage::Commit),
            TestStage::Commit => Some(TestStage::Publish),
            TestStage::Publish => None,
        }
    }
}

/// Reserve and commit call the adapter and record undos; publish finishes.
pub struct TestWorkflow;

#[async_trait]
impl Workflow for TestWorkflow {
    type Stage = TestStage;

    const KIND: &'static str = "test-tasks";

    async fn execute(
        &self,
        ctx: &StageContext,
        record: &TaskRecord<TestStage>,
    ) -> Result<StageOutcome> {
        match record.sub_stage {
            TestStage::Reserve => {
                let target = format!("/reservations/{}", record.inputs.resource_name);
                ctx.adapter
                    .invoke(AdapterRequest::new(AdapterAction::Create, target.clone()))
                    .await?;
                let mut working = HashMap::new();
                working.insert("reserved".to_string(), json!(true));
                Ok(StageOutcome::Proceed {
                    working,
                    undo: vec![UndoEntry::new(target, UndoAction::Delete, 0)],
                })
            }
            TestStage::Commit => {
                ctx.adapter
                    .invoke(AdapterRequest::new(AdapterAction::Create, "/commits/c1"))
                    .await?;
                let mut working = HashMap::new();
                working.insert("committed".to_string(), json!(true));
                Ok(StageOutcome::Proceed {
                    working,
                    undo: vec![UndoEntry::new("/commits/c1", UndoAction::Delete, 1)],
                })
            }
            TestStage::Publish => {
                let mut outputs = HashMap::new();
                outputs.insert("published".to_string(), json!(true));
                Ok(StageOutcome::finish(outputs))
            }
        }
    }
}

/// Callback sink that records every delivery
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(String, TaskOutcome)>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<(String, TaskOutcome)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallbackSink for RecordingSink {
    async fn deliver(&self, address: &str, outcome: &TaskOutcome) -> Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((address.to_string(), outcome.clone()));
        Ok(())
    }
}

/// Persist a fresh test task record and return it
pub async fn seed_task(
    store: &MemoryStore,
    inputs: TaskInputs,
    callback: Option<String>,
) -> TaskRecord<TestStage> {
    let record: TaskRecord<TestStage> = TaskRecord::new(TestWorkflow::KIND, inputs, callback);
    let doc = Document::new(TestWorkflow::KIND, record.self_link.clone(), &record).unwrap();
    store.create(TestWorkflow::KIND, doc).await.unwrap();
    record
}
