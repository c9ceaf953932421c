//! Builder (C7, spec §4.7): owns C1-C6 and exposes the outward contract.
//!
//! All mutable per-builder state lives behind one `tokio::sync::Mutex`
//! (`BuilderInner`), matching spec §5's requirement that all mutation of a
//! given Builder instance be serialized through a single lock.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use tokio::sync::Mutex;

use crate::build::{BuildFactory, InFlightBuild};
use crate::build_starter::BuildStarter;
use crate::clock::Clock;
use crate::concurrency::Jobs;
use crate::config::BuilderConfig;
use crate::deps::Collaborators;
use crate::errors::DispatchError;
use crate::expectations::Expectations;
use crate::reclaim::ReclaimTimer;
use crate::request::{BuildRequest, RequestId};
use crate::status::{StatusAggregator, StatusInputs};
use crate::worker::{CommandTable, WorkerHandle};
use crate::worker_registry::WorkerRegistry;

/// Per-builder mutable state (spec §3, "Builder").
pub struct BuilderInner {
    pub name: String,
    pub builder_id: Option<u64>,
    pub master_id: u64,
    pub running: bool,
    pub config: BuilderConfig,
    pub registry: WorkerRegistry,
    pub building: Vec<InFlightBuild>,
    pub old_building: HashMap<u64, InFlightBuild>,
    pub expectations: Expectations,
}

impl StatusInputs for BuilderInner {
    fn any_worker_connected(&self) -> bool {
        self.registry.iter().any(|(_, slot)| slot.is_connected())
    }

    fn any_build_in_flight(&self) -> bool {
        !self.building.is_empty() || !self.old_building.is_empty()
    }
}

impl crate::reclaim::InFlightRequests for BuilderInner {
    fn in_flight_request_ids(&self) -> Vec<RequestId> {
        self.building
            .iter()
            .chain(self.old_building.values())
            .flat_map(|b| b.request_ids())
            .collect()
    }
}

pub struct Builder {
    name: String,
    deps: Arc<Collaborators>,
    factory: Arc<dyn BuildFactory>,
    status: Arc<StatusAggregator>,
    inner: Arc<Mutex<BuilderInner>>,
    jobs: Arc<std::sync::Mutex<Jobs>>,
}

impl Builder {
    pub fn new(
        name: String,
        master_id: u64,
        deps: Arc<Collaborators>,
        factory: Arc<dyn BuildFactory>,
        status_sink: Arc<dyn crate::events::StatusSink>,
    ) -> Self {
        let status = Arc::new(StatusAggregator::new(name.clone(), status_sink));
        let inner = Arc::new(Mutex::new(BuilderInner {
            name: name.clone(),
            builder_id: None,
            master_id,
            running: true,
            config: BuilderConfig::default(),
            registry: WorkerRegistry::new(),
            building: Vec::new(),
            old_building: HashMap::new(),
            expectations: Expectations::new(),
        }));
        Builder { name, deps, factory, status, inner, jobs: Arc::new(std::sync::Mutex::new(Jobs::default())) }
    }

    /// Blocks until every build dispatched by this builder has settled, via
    /// `spawn_blocking` so it doesn't stall the runtime it's awaited from.
    /// For tests only -- production callers never need to synchronize on
    /// dispatcher-internal concurrency.
    pub async fn wait_for_all_jobs(&self) {
        let jobs = self.jobs.clone();
        tokio::task::spawn_blocking(move || jobs.lock().unwrap().wait_for_all())
            .await
            .expect("jobs registry poisoned");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shares this builder's inner state and status aggregator with the
    /// periodic reclaim and status timers (spec §4.3, §4.4).
    pub fn inner_handle(&self) -> Arc<Mutex<BuilderInner>> {
        self.inner.clone()
    }

    pub fn status_aggregator(&self) -> Arc<StatusAggregator> {
        self.status.clone()
    }

    /// `reconfigure(newConfig)` (spec §4.7): locates this builder's entry by
    /// name; aborts (the only `Result`-returning path in this crate, per
    /// spec §7) if none exists.
    pub async fn reconfigure(&self, new_config: &crate::config::MasterConfig) -> Result<(), DispatchError> {
        let entry = new_config
            .find_builder(&self.name)
            .ok_or_else(|| DispatchError::NoMatchingConfig { name: self.name.clone() })?
            .clone();

        let mut guard = self.inner.lock().await;

        let first_reconfig = guard.builder_id.is_none();
        if first_reconfig {
            self.deps.status_sink.builder_added(
                &self.name,
                entry.builddir.as_deref().unwrap_or(&self.name),
                entry.category.as_deref(),
                entry.description.as_deref(),
            );
            let resolved = self
                .deps
                .builder_id_registry
                .find_builder_id(&self.name)
                .await
                .map_err(|source| DispatchError::RegistryLookup { name: self.name.clone(), source: anyhow::Error::from(source) })?;
            guard.builder_id = Some(resolved);
        }

        let removed = guard.registry.prune_to(&entry.worker_names);
        for worker in removed {
            warn!("pruned worker {} from builder {} at reconfigure", worker.worker_name(), self.name);
        }

        self.deps.status_sink.set_description(&self.name, entry.description.as_deref());
        self.deps.status_sink.set_category(&self.name, entry.category.as_deref());
        self.deps.status_sink.set_workernames(&self.name, &entry.worker_names);
        self.deps.status_sink.set_cache_size(&self.name, new_config.global.builds_cache_size);

        guard.config = entry;
        Ok(())
    }

    /// `attached(worker, cmds)` (spec §4.1, §4.7): delegates to the registry;
    /// re-attaching an already-known worker is a no-op (I1), otherwise runs
    /// the handshake.
    pub async fn attached(&self, worker: WorkerHandle, commands: &CommandTable) {
        let worker_name = worker.worker_name().to_string();
        let mut guard = self.inner.lock().await;
        if !guard.registry.note_connecting(worker) {
            return;
        }
        match guard.registry.attach(&worker_name, commands).await {
            Ok(()) => {
                self.deps.status_sink.add_point_event(&self.name, &["connect".to_string(), worker_name.clone()]);
            }
            Err(err) => {
                warn!("attach handshake failed for {}: {}", worker_name, err);
                self.deps.status_sink.add_point_event(
                    &self.name,
                    &["failed".to_string(), "connect".to_string(), worker_name.clone()],
                );
            }
        }
        self.status.refresh(&*guard);
    }

    /// `detached(worker)` (spec §4.7): delegates to the registry.
    pub async fn detached(&self, worker_name: &str) {
        let mut guard = self.inner.lock().await;
        guard.registry.detached(worker_name).await;
        self.deps.status_sink.add_point_event(&self.name, &["disconnect".to_string(), worker_name.to_string()]);
        self.status.refresh(&*guard);
    }

    /// `addLatent(worker)` (spec §4.7): delegates to the registry exactly
    /// like `attached`, for workers that connect without a prior attach
    /// handshake.
    pub async fn add_latent(&self, worker: WorkerHandle) {
        let worker_name = worker.worker_name().to_string();
        let mut guard = self.inner.lock().await;
        guard.registry.note_connecting(worker);
        self.deps.status_sink.add_point_event(&self.name, &["added".to_string(), "latent".to_string(), worker_name]);
        self.status.refresh(&*guard);
    }

    /// `maybeStart(worker, requests)` (spec §4.5 gating): runs the
    /// BuildStarter protocol.
    pub async fn maybe_start(&self, worker_name: String, requests: Vec<BuildRequest>) -> bool {
        let started = BuildStarter::start(
            self.inner.clone(),
            self.deps.clone(),
            self.status.clone(),
            self.factory.clone(),
            self.jobs.clone(),
            worker_name,
            requests,
        )
        .await;
        let guard = self.inner.lock().await;
        self.status.refresh(&*guard);
        started
    }

    /// `ping()` control-plane (spec §4.7): empty registry emits `ping: no
    /// worker` and returns false; otherwise pings all workers concurrently,
    /// succeeding iff all succeed.
    pub async fn ping(&self) -> bool {
        let handles: Vec<WorkerHandle> = {
            let guard = self.inner.lock().await;
            if guard.registry.is_empty() {
                self.deps.status_sink.add_point_event(&self.name, &["ping".to_string(), "no worker".to_string()]);
                return false;
            }
            guard.registry.iter().map(|(_, slot)| slot.handle()).collect()
        };

        let results = futures::future::join_all(handles.iter().map(|h| h.ping())).await;
        results.into_iter().all(|r| matches!(r, Ok(true)))
    }

    /// `getOldestRequestTime()` (spec §4.7): minimum `submitted_at` among
    /// this builder's unclaimed requests, or `None`.
    pub async fn get_oldest_request_time(&self) -> Option<std::time::SystemTime> {
        let rows = self
            .deps
            .request_store
            .get_build_requests(&self.name, Some(false))
            .await
            .unwrap_or_default();
        rows.into_iter().map(|r| r.submitted_at).min()
    }

    /// `getBuild(number)` (spec §4.7): scans `building` and `oldBuilding` for
    /// a matching build-status number.
    pub async fn get_build(&self, number: u64) -> Option<InFlightBuild> {
        let guard = self.inner.lock().await;
        guard
            .building
            .iter()
            .chain(guard.old_building.values())
            .find(|b| b.status_number == number)
            .cloned()
    }

    /// Adopts a build discovered as inherited from a predecessor master
    /// (spec §3: "moved to `oldBuilding`... if stolen... during reclaim").
    /// Not triggered by any operation this core defines; exposed for a
    /// caller doing master-handoff recovery.
    pub async fn adopt_old_build(&self, build: InFlightBuild) {
        let mut guard = self.inner.lock().await;
        guard.old_building.insert(build.db_build_id, build);
    }

    pub async fn set_expectations(&self, progress: std::time::Duration) {
        let mut guard = self.inner.lock().await;
        guard.expectations.set_expectations(progress);
    }

    /// Shuts the builder down (spec §5, "Cancellation"): new `maybeStart`
    /// calls return false immediately; in-flight starts past step 14 run to
    /// completion under CompletionHandler.
    pub async fn stop(&self) {
        let mut guard = self.inner.lock().await;
        guard.running = false;
    }

    /// Starts the periodic reclaim sweep (spec §4.3). Returns the task
    /// handle so the caller can abort it on shutdown.
    pub fn spawn_reclaim_timer(&self, clock: Arc<dyn Clock>, timer: ReclaimTimer) -> tokio::task::JoinHandle<()> {
        timer.spawn(clock, self.deps.request_store.clone(), self.inner.clone())
    }

    /// Starts the periodic status recomputation (spec §4.4, every 30 minutes
    /// by default, in addition to the refresh after every state-changing call).
    pub fn spawn_status_timer(&self, clock: Arc<dyn Clock>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        self.status.clone().spawn_periodic(clock, interval, self.inner.clone())
    }
}
