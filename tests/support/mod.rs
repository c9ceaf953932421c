//! In-memory fakes for the external collaborators (spec §6), used only by
//! the integration tests in this directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;

use builder_dispatch::build::{BuildFactory, BuildResults, BuildRunner};
use builder_dispatch::errors::DispatchError;
use builder_dispatch::events::{BigState, BuildRequestComplete, MessageQueue, RoutingKey, StatusSink};
use builder_dispatch::request::{BuildRequest, BuildRequestRow, BuildsetId, RequestId};
use builder_dispatch::store::{BuilderIdRegistry, BuildStore, BuildsetTracker, NewBuildRow, RequestStore};
use builder_dispatch::worker::{CommandTable, RemoteWorker};

#[derive(Default)]
pub struct FakeRequestStore {
    pub rows: Mutex<HashMap<RequestId, BuildRequestRow>>,
    pub reclaimed: Mutex<Vec<RequestId>>,
    pub unclaimed: Mutex<Vec<RequestId>>,
    pub completed: Mutex<Vec<(RequestId, BuildResults)>>,
}

impl FakeRequestStore {
    pub fn seed(&self, row: BuildRequestRow) {
        self.rows.lock().unwrap().insert(row.request.id, row);
    }
}

#[async_trait]
impl RequestStore for FakeRequestStore {
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

    async fn reclaim_build_requests(&self, ids: &[RequestId]) -> Result<(), DispatchError> {
        self.reclaimed.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }

    async fn unclaim_build_requests(&self, ids: &[RequestId]) -> Result<(), DispatchError> {
        self.unclaimed.lock().unwrap().extend_from_slice(ids);
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
        results: BuildResults,
        _complete_at: SystemTime,
    ) -> Result<(), DispatchError> {
        let mut completed = self.completed.lock().unwrap();
        for id in ids {
            completed.push((*id, results));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBuildStore {
    next_id: AtomicU64,
    pub rows: Mutex<HashMap<u64, NewBuildRow>>,
    pub finished: Mutex<Vec<(u64, BuildResults)>>,
}

#[async_trait]
impl BuildStore for FakeBuildStore {
    async fn add_build(&self, row: NewBuildRow) -> Result<(u64, u64), DispatchError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.lock().unwrap().insert(id, row);
        Ok((id, id))
    }

    async fn finish_build(&self, build_id: u64, results: BuildResults) -> Result<(), DispatchError> {
        self.finished.lock().unwrap().push((build_id, results));
        Ok(())
    }
}

pub struct FakeRegistry {
    pub builder_id: u64,
}

#[async_trait]
impl BuilderIdRegistry for FakeRegistry {
    async fn find_builder_id(&self, _name: &str) -> Result<u64, DispatchError> {
        Ok(self.builder_id)
    }
}

#[derive(Default)]
pub struct FakeBuildsetTracker {
    pub completed_bsids: Mutex<Vec<BuildsetId>>,
}

#[async_trait]
impl BuildsetTracker for FakeBuildsetTracker {
    async fn maybe_buildset_complete(&self, bsid: BuildsetId) -> Result<(), DispatchError> {
        self.completed_bsids.lock().unwrap().push(bsid);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMessageQueue {
    pub completes: Mutex<Vec<(RoutingKey, BuildRequestComplete)>>,
    pub unclaimed_signals: Mutex<Vec<RequestId>>,
}

impl MessageQueue for FakeMessageQueue {
    fn produce_build_request_complete(&self, key: RoutingKey, body: BuildRequestComplete) {
        self.completes.lock().unwrap().push((key, body));
    }

    fn produce_request_unclaimed(&self, request_id: RequestId) {
        self.unclaimed_signals.lock().unwrap().push(request_id);
    }
}

#[derive(Default)]
pub struct FakeStatusSink {
    pub big_states: Mutex<Vec<BigState>>,
    pub point_events: Mutex<Vec<Vec<String>>>,
    pub next_build_number: AtomicU64,
}

impl StatusSink for FakeStatusSink {
    fn builder_added(&self, _name: &str, _builddir: &str, _category: Option<&str>, _description: Option<&str>) {}
    fn set_description(&self, _name: &str, _description: Option<&str>) {}
    fn set_category(&self, _name: &str, _category: Option<&str>) {}
    fn set_workernames(&self, _name: &str, _worker_names: &[String]) {}
    fn set_cache_size(&self, _name: &str, _size: u64) {}
    fn new_build(&self, _name: &str) -> u64 {
        self.next_build_number.fetch_add(1, Ordering::SeqCst) + 1
    }
    fn build_started(&self, _brid: RequestId, _builder_name: &str, _status_build_number: u64) {}
    fn set_big_state(&self, _name: &str, state: BigState) {
        self.big_states.lock().unwrap().push(state);
    }
    fn add_point_event(&self, _name: &str, tags: &[String]) {
        self.point_events.lock().unwrap().push(tags.to_vec());
    }
}

pub struct FakeWorker {
    pub name: String,
    pub connected: std::sync::atomic::AtomicBool,
    pub prepare_result: std::sync::atomic::AtomicBool,
    pub ping_result: std::sync::atomic::AtomicBool,
    pub attach_calls: AtomicU64,
    pub released_locks: AtomicU64,
}

impl FakeWorker {
    pub fn new(name: &str) -> Self {
        FakeWorker {
            name: name.to_string(),
            connected: std::sync::atomic::AtomicBool::new(true),
            prepare_result: std::sync::atomic::AtomicBool::new(true),
            ping_result: std::sync::atomic::AtomicBool::new(true),
            attach_calls: AtomicU64::new(0),
            released_locks: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RemoteWorker for FakeWorker {
    fn worker_name(&self) -> &str {
        &self.name
    }

    fn worker_id(&self) -> u64 {
        1
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn attach(&self, _commands: &CommandTable) -> Result<(), DispatchError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn prepare(&self, _requests: &[BuildRequest]) -> Result<bool, DispatchError> {
        Ok(self.prepare_result.load(Ordering::SeqCst))
    }

    async fn ping(&self) -> Result<bool, DispatchError> {
        Ok(self.ping_result.load(Ordering::SeqCst))
    }

    async fn remote_start_build(&self, _builder_name: &str) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn release_locks(&self) {
        self.released_locks.fetch_add(1, Ordering::SeqCst);
    }

    async fn detach(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

pub struct FixedResultRunner(pub BuildResults);

#[async_trait]
impl BuildRunner for FixedResultRunner {
    async fn run(self: Box<Self>, _worker: builder_dispatch::worker::WorkerHandle) -> BuildResults {
        self.0
    }
}

pub struct FixedResultFactory(pub BuildResults);

impl BuildFactory for FixedResultFactory {
    fn new_build(&self, _requests: &[BuildRequest]) -> Box<dyn BuildRunner> {
        Box::new(FixedResultRunner(self.0))
    }
}
