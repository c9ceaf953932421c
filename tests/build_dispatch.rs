mod support;

use std::sync::Arc;

use builder_dispatch::build::BuildResults;
use builder_dispatch::config::{BuilderConfig, GlobalConfig, MasterConfig};
use builder_dispatch::deps::Collaborators;
use builder_dispatch::events::BigState;
use builder_dispatch::request::{BuildRequest, BuildRequestRow};
use builder_dispatch::worker::CommandTable;
use builder_dispatch::Builder;

use support::*;

struct Harness {
    builder: Builder,
    request_store: Arc<FakeRequestStore>,
    build_store: Arc<FakeBuildStore>,
    buildset_tracker: Arc<FakeBuildsetTracker>,
    message_queue: Arc<FakeMessageQueue>,
    status_sink: Arc<FakeStatusSink>,
}

async fn harness(builder_name: &str, results: BuildResults) -> Harness {
    let request_store = Arc::new(FakeRequestStore::default());
    let build_store = Arc::new(FakeBuildStore::default());
    let buildset_tracker = Arc::new(FakeBuildsetTracker::default());
    let message_queue = Arc::new(FakeMessageQueue::default());
    let status_sink = Arc::new(FakeStatusSink::default());
    let registry = Arc::new(FakeRegistry { builder_id: 99 });
    let clock = Arc::new(builder_dispatch::clock::SystemClock);

    let deps = Arc::new(Collaborators {
        request_store: request_store.clone(),
        build_store: build_store.clone(),
        buildset_tracker: buildset_tracker.clone(),
        builder_id_registry: registry,
        message_queue: message_queue.clone(),
        status_sink: status_sink.clone(),
        clock,
    });

    let factory = Arc::new(FixedResultFactory(results));
    let builder = Builder::new(builder_name.to_string(), 1, deps, factory, status_sink.clone());

    let config = MasterConfig {
        global: GlobalConfig::default(),
        builders: vec![BuilderConfig {
            name: builder_name.to_string(),
            worker_names: vec!["w1".to_string()],
            ..Default::default()
        }],
    };
    builder.reconfigure(&config).await.unwrap();

    Harness { builder, request_store, build_store, buildset_tracker, message_queue, status_sink }
}

fn req(id: u64, bsid: u64, builder_name: &str) -> BuildRequest {
    BuildRequest { id, buildset_id: bsid, builder_name: builder_name.to_string() }
}

#[tokio::test]
async fn happy_path_emits_complete_and_buildset_complete_once() {
    let h = harness("compile", BuildResults::Success).await;
    let worker = Arc::new(FakeWorker::new("w1"));
    h.builder.attached(worker.clone(), &CommandTable::new()).await;

    let started = h.builder.maybe_start("w1".to_string(), vec![req(42, 7, "compile")]).await;
    assert!(started);
    h.builder.wait_for_all_jobs().await;

    let completes = h.message_queue.completes.lock().unwrap();
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0].1.brid, 42);
    assert_eq!(completes[0].1.bsid, 7);
    assert_eq!(completes[0].1.results, BuildResults::Success);
    drop(completes);

    let bsids = h.buildset_tracker.completed_bsids.lock().unwrap();
    assert_eq!(bsids.as_slice(), &[7]);
}

#[tokio::test]
async fn prepare_returns_false_leaves_state_unchanged() {
    let h = harness("compile", BuildResults::Success).await;
    let worker = Arc::new(FakeWorker::new("w1"));
    worker.prepare_result.store(false, std::sync::atomic::Ordering::SeqCst);
    h.builder.attached(worker.clone(), &CommandTable::new()).await;

    h.request_store.seed(BuildRequestRow {
        request: req(42, 7, "compile"),
        submitted_at: std::time::SystemTime::UNIX_EPOCH,
        claimed: false,
    });

    let started = h.builder.maybe_start("w1".to_string(), vec![req(42, 7, "compile")]).await;
    assert!(!started);
    assert!(h.build_store.rows.lock().unwrap().is_empty());

    let rows = h.request_store.get_build_requests("compile", None).await.unwrap();
    assert!(!rows[0].claimed);
}

#[tokio::test]
async fn ping_fails_means_no_add_build_call() {
    let h = harness("compile", BuildResults::Success).await;
    let worker = Arc::new(FakeWorker::new("w1"));
    worker.ping_result.store(false, std::sync::atomic::Ordering::SeqCst);
    h.builder.attached(worker.clone(), &CommandTable::new()).await;

    let started = h.builder.maybe_start("w1".to_string(), vec![req(42, 7, "compile")]).await;
    assert!(!started);
    assert!(h.build_store.rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn retry_unclaims_and_skips_buildset_complete() {
    let h = harness("compile", BuildResults::Retry).await;
    let worker = Arc::new(FakeWorker::new("w1"));
    h.builder.attached(worker.clone(), &CommandTable::new()).await;

    let started = h
        .builder
        .maybe_start("w1".to_string(), vec![req(10, 3, "compile"), req(11, 3, "compile")])
        .await;
    assert!(started);
    h.builder.wait_for_all_jobs().await;

    let unclaimed = h.request_store.unclaimed.lock().unwrap();
    assert_eq!(unclaimed.as_slice(), &[10, 11]);
    assert!(h.message_queue.completes.lock().unwrap().is_empty());
    assert!(h.buildset_tracker.completed_bsids.lock().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_attach_yields_one_slot() {
    let h = harness("compile", BuildResults::Success).await;
    let worker = Arc::new(FakeWorker::new("w1"));
    h.builder.attached(worker.clone(), &CommandTable::new()).await;
    h.builder.attached(worker.clone(), &CommandTable::new()).await;

    assert_eq!(worker.attach_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let events = h.status_sink.point_events.lock().unwrap();
    assert_eq!(events.as_slice(), &[vec!["connect".to_string(), "w1".to_string()]]);
}

#[tokio::test]
async fn detach_during_building_removes_worker_without_aborting_build() {
    let h = harness("compile", BuildResults::Success).await;
    let worker = Arc::new(FakeWorker::new("w1"));
    h.builder.attached(worker.clone(), &CommandTable::new()).await;

    let started = h.builder.maybe_start("w1".to_string(), vec![req(42, 7, "compile")]).await;
    assert!(started);

    h.builder.detached("w1").await;
    h.builder.wait_for_all_jobs().await;

    assert_eq!(h.message_queue.completes.lock().unwrap().len(), 1);
    assert_eq!(h.status_sink.big_states.lock().unwrap().last(), Some(&BigState::Offline));
}
