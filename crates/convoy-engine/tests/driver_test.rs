//! Driver behavior against a toy three-stage workflow

mod common;

use common::{RecordingSink, TestStage, TestWorkflow, seed_task};
use convoy_cloud::{AdapterAction, AdapterRequest, AdapterResponse, CloudAdapter, MockAdapter};
use convoy_core::{FailureCode, LifecycleStage, TaskInputs, TaskRecord};
use convoy_engine::{ParentNotifier, StageDriver, StepResult, TaskService};
use convoy_store::{DocumentStore, MemoryStore};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn driver(
    store: Arc<MemoryStore>,
    adapter: Arc<dyn CloudAdapter>,
    sink: Arc<RecordingSink>,
) -> StageDriver<TestWorkflow> {
    StageDriver::new(
        Arc::new(TestWorkflow),
        store,
        adapter,
        ParentNotifier::new(sink),
    )
}

#[tokio::test]
async fn test_happy_path_is_monotonic() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let driver = driver(store.clone(), Arc::new(MockAdapter::new()), sink);

    let record = seed_task(&store, TaskInputs::new("job-1"), None).await;
    let link = record.self_link.clone();

    let mut observed = vec![(record.lifecycle, record.sub_stage)];
    loop {
        match driver.step(&link).await.unwrap() {
            StepResult::Advanced(r) => observed.push((r.lifecycle, r.sub_stage)),
            StepResult::Terminal(r) => {
                observed.push((r.lifecycle, r.sub_stage));
                break;
            }
            StepResult::Stale(_) => unreachable!("step never reports stale"),
        }
    }

    // sub-stages never decrease, lifecycle never leaves a terminal value
    for pair in observed.windows(2) {
        assert!(pair[0].1 <= pair[1].1);
        assert!(!pair[0].0.is_terminal());
    }
    let (lifecycle, _) = observed.last().unwrap();
    assert_eq!(*lifecycle, LifecycleStage::Finished);

    let stored: TaskRecord<TestStage> = store.get(&link).await.unwrap().decode().unwrap();
    assert_eq!(stored.lifecycle, LifecycleStage::Finished);
    assert_eq!(stored.working["reserved"], json!(true));
}

#[tokio::test]
async fn test_stale_self_transition_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let driver = driver(store.clone(), Arc::new(MockAdapter::new()), sink);

    let record = seed_task(&store, TaskInputs::new("job-1"), None).await;
    let link = record.self_link.clone();

    // complete the first stage; the record is now at Commit
    driver.step(&link).await.unwrap();
    let before: TaskRecord<TestStage> = store.get(&link).await.unwrap().decode().unwrap();
    assert_eq!(before.sub_stage, TestStage::Commit);

    // a duplicate message targeting the passed stage does nothing
    let result = driver.advance(&link, TestStage::Reserve).await.unwrap();
    assert!(matches!(result, StepResult::Stale(_)));

    let after: TaskRecord<TestStage> = store.get(&link).await.unwrap().decode().unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.working, before.working);
    assert_eq!(after.sub_stage, TestStage::Commit);
}

#[tokio::test]
async fn test_stage_jump_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let driver = driver(store.clone(), Arc::new(MockAdapter::new()), sink);

    let record = seed_task(&store, TaskInputs::new("job-1"), None).await;

    // no external party may jump the record to a later stage
    let err = driver
        .advance(&record.self_link, TestStage::Publish)
        .await
        .unwrap_err();
    assert!(matches!(err, convoy_engine::EngineError::Validation(_)));
}

#[tokio::test]
async fn test_failure_replays_ledger_and_notifies() {
    let store = Arc::new(MemoryStore::new());
    let adapter = Arc::new(MockAdapter::new());
    // Commit invokes the adapter against /commits/c1 and fails
    adapter.fail_once_with("/commits/c1", "quota exceeded").await;
    let sink = Arc::new(RecordingSink::default());
    let driver = driver(store.clone(), adapter.clone(), sink.clone());

    // parent record the callback points at
    store
        .create(
            "test-tasks",
            convoy_store::Document::new("test-tasks", "/test-tasks/parent", json!({})).unwrap(),
        )
        .await
        .unwrap();
    let record = seed_task(
        &store,
        TaskInputs::new("job-1"),
        Some("/test-tasks/parent".to_string()),
    )
    .await;

    let terminal = driver.run(&record.self_link).await.unwrap();
    assert_eq!(terminal.lifecycle, LifecycleStage::Failed);
    let failure = terminal.failure.unwrap();
    assert_eq!(failure.code, FailureCode::DependencyFailed);
    assert!(failure.message.contains("quota exceeded"));

    // Reserve's undo ran after the failed commit
    let invocations = adapter.invocations().await;
    let last = invocations.last().unwrap();
    assert_eq!(last.action, AdapterAction::Delete);
    assert_eq!(last.target_link, "/reservations/job-1");

    // replay happened exactly once and is marked on the record
    assert_eq!(terminal.working["compensation_replayed"], json!(true));

    // exactly one terminal-outcome message
    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1.lifecycle, LifecycleStage::Failed);
}

#[test]
fn test_validate_start_post_rejects_bad_inputs() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let driver = driver(store, Arc::new(MockAdapter::new()), sink);

    let err = driver
        .validate_start_post(&TaskInputs::new(""))
        .unwrap_err();
    assert!(matches!(err, convoy_engine::EngineError::Validation(_)));
    assert!(driver.validate_start_post(&TaskInputs::new("job-1")).is_ok());
}

#[tokio::test]
async fn test_validation_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let service = TaskService::new(
        TestWorkflow,
        store.clone() as Arc<dyn DocumentStore>,
        Arc::new(MockAdapter::new()),
        Arc::new(RecordingSink::default()),
    );

    let err = service
        .create_task(TaskInputs::new(""), None)
        .await
        .unwrap_err();
    assert!(matches!(err, convoy_engine::EngineError::Validation(_)));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_service_runs_task_to_completion() {
    let store = Arc::new(MemoryStore::new());
    let service = TaskService::new(
        TestWorkflow,
        store.clone() as Arc<dyn DocumentStore>,
        Arc::new(MockAdapter::new()),
        Arc::new(RecordingSink::default()),
    );

    let created = service
        .create_task(TaskInputs::new("job-1"), None)
        .await
        .unwrap();
    assert_eq!(created.record.lifecycle, LifecycleStage::Created);

    let terminal = created.handle.await.unwrap().unwrap();
    assert_eq!(terminal.lifecycle, LifecycleStage::Finished);

    let fetched = service.get_task(&terminal.self_link).await.unwrap();
    assert_eq!(fetched.lifecycle, LifecycleStage::Finished);
}

#[tokio::test]
async fn test_dry_run_short_circuits_external_calls() {
    let store = Arc::new(MemoryStore::new());
    let live = Arc::new(MockAdapter::new());
    // the live adapter would fail; dry run must never reach it
    live.fail_with("/commits/c1", "must not be called").await;
    let service = TaskService::new(
        TestWorkflow,
        store.clone() as Arc<dyn DocumentStore>,
        live.clone(),
        Arc::new(RecordingSink::default()),
    );

    let created = service
        .create_task(TaskInputs::new("job-1").with_dry_run(true), None)
        .await
        .unwrap();
    let terminal = created.handle.await.unwrap().unwrap();
    assert_eq!(terminal.lifecycle, LifecycleStage::Finished);
    assert!(live.invocations().await.is_empty());
}

#[tokio::test]
async fn test_cancelled_record_stops_the_driver() {
    let store = Arc::new(MemoryStore::new());
    let adapter = Arc::new(MockAdapter::new());
    let sink = Arc::new(RecordingSink::default());
    let service = TaskService::new(
        TestWorkflow,
        store.clone() as Arc<dyn DocumentStore>,
        adapter.clone(),
        sink.clone(),
    );

    // cancelling a Created record moves it through Started first;
    // Cancelled is not directly reachable from Created
    let record = seed_task(&store, TaskInputs::new("job-1"), None).await;
    assert_eq!(record.lifecycle, LifecycleStage::Created);
    let cancelled = service.cancel_task(&record.self_link).await.unwrap();
    assert_eq!(cancelled.lifecycle, LifecycleStage::Cancelled);

    // the driver observes the terminal record and runs no stage actions
    let driver = driver(store.clone(), adapter.clone(), sink);
    let terminal = driver.run(&record.self_link).await.unwrap();
    assert_eq!(terminal.lifecycle, LifecycleStage::Cancelled);
    assert!(adapter.invocations().await.is_empty());

    // cancelling again is a no-op returning the terminal record
    let again = service.cancel_task(&record.self_link).await.unwrap();
    assert_eq!(again.version, cancelled.version);
}

/// Adapter that patches the task record out-of-band during the first
/// stage, forcing the driver's conditional write into a conflict.
struct ConflictingAdapter {
    store: Arc<MemoryStore>,
    task_link: String,
    fired: AtomicBool,
}

#[async_trait]
impl CloudAdapter for ConflictingAdapter {
    fn name(&self) -> &str {
        "conflicting"
    }

    async fn invoke(&self, _request: AdapterRequest) -> convoy_cloud::Result<AdapterResponse> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let doc = self.store.get(&self.task_link).await.unwrap();
            let mut body = doc.body.clone();
            body["working"]["external_touch"] = json!(true);
            self.store
                .patch(&self.task_link, body, doc.version)
                .await
                .unwrap();
        }
        Ok(AdapterResponse::empty())
    }
}

#[tokio::test]
async fn test_version_conflict_recomputes_from_fresh_state() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());

    let record = seed_task(&store, TaskInputs::new("job-1"), None).await;
    let adapter = Arc::new(ConflictingAdapter {
        store: store.clone(),
        task_link: record.self_link.clone(),
        fired: AtomicBool::new(false),
    });
    let driver = driver(store.clone(), adapter, sink);

    let terminal = driver.run(&record.self_link).await.unwrap();
    assert_eq!(terminal.lifecycle, LifecycleStage::Finished);

    // the racing write was not overwritten: the driver recomputed from
    // the freshly persisted state instead of writing stale data
    assert_eq!(terminal.working["external_touch"], json!(true));
    assert_eq!(terminal.working["reserved"], json!(true));
}
