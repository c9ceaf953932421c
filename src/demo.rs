//! In-memory demonstration harness (spec §10.5): wires a `Builder` to a
//! concrete, if trivial, set of collaborators and runs one dispatch cycle.
//! Not a production deployment -- the real request queue, status surface,
//! and worker transport are out of scope (§1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use log::info;

use crate::build::{BuildFactory, BuildResults, BuildRunner};
use crate::clock::SystemClock;
use crate::config::{BuilderConfig, GlobalConfig, MasterConfig};
use crate::deps::Collaborators;
use crate::errors::DispatchError;
use crate::events::{BigState, BuildRequestComplete, MessageQueue, RoutingKey, StatusSink};
use crate::request::{BuildRequest, BuildRequestRow, RequestId};
use crate::store::{BuilderIdRegistry, BuildStore, BuildsetTracker, NewBuildRow, RequestStore};
use crate::worker::{CommandTable, RemoteWorker, WorkerHandle};
use crate::Builder;

#[derive(Default)]
struct InMemoryStore {
    rows: Mutex<HashMap<RequestId, BuildRequestRow>>,
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn get_build_requests(
        &self,
        builder_name: &str,
        claimed: Option<bool>,
    ) -> Result<Vec<BuildRequestRow>, DispatchError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| r.request.builder_name == builder_name)
            .filter(|r| claimed.map_or(true, |c| r.claimed == c))
            .cloned()
            .collect())
    }

    async fn reclaim_build_requests(&self, _ids: &[RequestId]) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn unclaim_build_requests(&self, ids: &[RequestId]) -> Result<(), DispatchError> {
        let mut rows = self.rows.lock().unwrap();
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                row.claimed = false;
            }
        }
        Ok(())
    }

    async fn complete_build_requests(
        &self,
        ids: &[RequestId],
        _results: BuildResults,
        _complete_at: SystemTime,
    ) -> Result<(), DispatchError> {
        let mut rows = self.rows.lock().unwrap();
        for id in ids {
            rows.remove(id);
        }
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryBuildStore {
    next_id: AtomicU64,
}

#[async_trait]
impl BuildStore for InMemoryBuildStore {
    async fn add_build(&self, row: NewBuildRow) -> Result<(u64, u64), DispatchError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!("demo: build {} created for builder {}", id, row.builder_id);
        Ok((id, id))
    }

    async fn finish_build(&self, build_id: u64, results: BuildResults) -> Result<(), DispatchError> {
        info!("demo: build {} finished with {:?}", build_id, results);
        Ok(())
    }
}

struct FixedRegistry;

#[async_trait]
impl BuilderIdRegistry for FixedRegistry {
    async fn find_builder_id(&self, _name: &str) -> Result<u64, DispatchError> {
        Ok(1)
    }
}

#[derive(Default)]
struct LoggingBuildsetTracker;

#[async_trait]
impl BuildsetTracker for LoggingBuildsetTracker {
    async fn maybe_buildset_complete(&self, bsid: u64) -> Result<(), DispatchError> {
        info!("demo: buildset {} complete", bsid);
        Ok(())
    }
}

#[derive(Default)]
struct LoggingMessageQueue;

impl MessageQueue for LoggingMessageQueue {
    fn produce_build_request_complete(&self, key: RoutingKey, body: BuildRequestComplete) {
        info!("demo: {} -> {:?}", key.as_dotted(), body.results);
    }

    fn produce_request_unclaimed(&self, request_id: RequestId) {
        info!("demo: request {} unclaimed", request_id);
    }
}

#[derive(Default)]
struct LoggingStatusSink {
    next_build: AtomicU64,
}

impl StatusSink for LoggingStatusSink {
    fn builder_added(&self, name: &str, builddir: &str, _category: Option<&str>, _description: Option<&str>) {
        info!("demo: builder {} added (builddir={})", name, builddir);
    }
    fn set_description(&self, _name: &str, _description: Option<&str>) {}
    fn set_category(&self, _name: &str, _category: Option<&str>) {}
    fn set_workernames(&self, name: &str, worker_names: &[String]) {
        info!("demo: builder {} worker_names={:?}", name, worker_names);
    }
    fn set_cache_size(&self, _name: &str, _size: u64) {}
    fn new_build(&self, _name: &str) -> u64 {
        self.next_build.fetch_add(1, Ordering::SeqCst) + 1
    }
    fn build_started(&self, brid: RequestId, builder_name: &str, status_build_number: u64) {
        info!("demo: build #{} started for request {} on {}", status_build_number, brid, builder_name);
    }
    fn set_big_state(&self, name: &str, state: BigState) {
        info!("demo: builder {} is now {:?}", name, state);
    }
    fn add_point_event(&self, _name: &str, _tags: &[String]) {}
}

struct DemoWorker;

#[async_trait]
impl RemoteWorker for DemoWorker {
    fn worker_name(&self) -> &str {
        "demo-worker"
    }
    fn worker_id(&self) -> u64 {
        1
    }
    fn is_connected(&self) -> bool {
        true
    }
    async fn attach(&self, _commands: &CommandTable) -> Result<(), DispatchError> {
        Ok(())
    }
    async fn prepare(&self, _requests: &[BuildRequest]) -> Result<bool, DispatchError> {
        Ok(true)
    }
    async fn ping(&self) -> Result<bool, DispatchError> {
        Ok(true)
    }
    async fn remote_start_build(&self, _builder_name: &str) -> Result<(), DispatchError> {
        Ok(())
    }
    async fn release_locks(&self) {}
    async fn detach(&self) {}
}

struct DemoRunner;

#[async_trait]
impl BuildRunner for DemoRunner {
    async fn run(self: Box<Self>, _worker: WorkerHandle) -> BuildResults {
        BuildResults::Success
    }
}

struct DemoFactory;

impl BuildFactory for DemoFactory {
    fn new_build(&self, _requests: &[BuildRequest]) -> Box<dyn BuildRunner> {
        Box::new(DemoRunner)
    }
}

/// Constructs one builder named "demo", attaches one worker, offers it one
/// request, and drives it to completion -- exercising the same path as
/// `tests/build_dispatch.rs`'s happy-path scenario, but against the real
/// tokio runtime instead of test fakes.
pub async fn run() {
    let status_sink: Arc<dyn StatusSink> = Arc::new(LoggingStatusSink::default());

    let deps = Arc::new(Collaborators {
        request_store: Arc::new(InMemoryStore::default()),
        build_store: Arc::new(InMemoryBuildStore::default()),
        buildset_tracker: Arc::new(LoggingBuildsetTracker::default()),
        builder_id_registry: Arc::new(FixedRegistry),
        message_queue: Arc::new(LoggingMessageQueue::default()),
        status_sink: status_sink.clone(),
        clock: Arc::new(SystemClock),
    });

    let builder = Builder::new("demo".to_string(), 1, deps, Arc::new(DemoFactory), status_sink);

    let config = MasterConfig {
        global: GlobalConfig::default(),
        builders: vec![BuilderConfig {
            name: "demo".to_string(),
            worker_names: vec!["demo-worker".to_string()],
            ..Default::default()
        }],
    };
    if let Err(err) = builder.reconfigure(&config).await {
        info!("demo: reconfigure failed: {}", err);
        return;
    }

    let worker: WorkerHandle = Arc::new(DemoWorker);
    builder.attached(worker, &CommandTable::new()).await;

    let request = BuildRequest { id: 1, buildset_id: 1, builder_name: "demo".to_string() };
    let started = builder.maybe_start("demo-worker".to_string(), vec![request]).await;
    info!("demo: maybe_start returned {}", started);

    builder.wait_for_all_jobs().await;
    builder.stop().await;
}
