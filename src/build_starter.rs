//! BuildStarter (C5, spec §4.5) -- the core protocol.
//!
//! A strict linear sequence with cleanup-stack semantics: every committed
//! side effect pushes its inverse onto `cleanup`; any failure unwinds the
//! stack in LIFO order and returns `false` with no observable state change.

use std::sync::Arc;

use futures::FutureExt;
use log::warn;
use tokio::sync::Mutex;

use crate::build::{BuildFactory, BuildResults, InFlightBuild};
use crate::builder::BuilderInner;
use crate::completion::CompletionHandler;
use crate::concurrency::{ConcurrentJob, Jobs};
use crate::deps::Collaborators;
use crate::request::BuildRequest;
use crate::status::StatusAggregator;
use crate::store::NewBuildRow;
use crate::worker::WorkerHandle;

pub struct BuildStarter;

type Undo = Box<dyn FnOnce(&mut BuilderInner) + Send>;

impl BuildStarter {
    /// Returns `true` iff the build was handed off; `false` iff `requests`
    /// should be returned to the queue unchanged.
    pub async fn start(
        inner: Arc<Mutex<BuilderInner>>,
        deps: Arc<Collaborators>,
        status: Arc<StatusAggregator>,
        factory: Arc<dyn BuildFactory>,
        jobs: Arc<std::sync::Mutex<Jobs>>,
        worker_name: String,
        requests: Vec<BuildRequest>,
    ) -> bool {
        if requests.is_empty() {
            warn!("maybeStart called with an empty request set (caller bug)");
            return false;
        }

        let mut guard = inner.lock().await;

        // 1. Gate.
        if !guard.running {
            return false;
        }

        // 2. Resolve ids. A detached worker (connection null) at this point
        // is a detach race, not an error: fail fast.
        let builder_id = match guard.builder_id {
            Some(id) => id,
            None => return false,
        };
        let master_id = guard.master_id;
        let builder_name = guard.name.clone();

        let worker_handle = match guard.registry.get_mut(&worker_name) {
            Some(slot) if slot.is_connected() => slot.handle(),
            _ => return false,
        };
        let worker_id = worker_handle.worker_id();

        let mut cleanup: Vec<Undo> = Vec::new();

        // 3. Construct Build.
        let runner = factory.new_build(&requests);

        // 3.5. Acquire configured locks (spec §4.5, builder.py's
        // `setLocks`). Nothing is committed yet, so a failure here needs no
        // unwind -- just release whatever the worker did manage to grab.
        let locks = guard.config.locks.clone();
        if let Err(err) = worker_handle.acquire_locks(&locks).await {
            warn!("acquire_locks failed for builder {}: {}", builder_name, err);
            worker_handle.release_locks().await;
            return false;
        }

        // 4. Reserve slot in building[].
        guard.building.push(InFlightBuild {
            requests: requests.clone(),
            worker_name: worker_name.clone(),
            db_build_id: 0,
            status_number: 0,
        });
        cleanup.push(Box::new(|inner: &mut BuilderInner| {
            inner.building.pop();
        }));

        // 5. Status refresh.
        status.refresh(&*guard);

        // 6. Prepare on worker.
        let prepare_ok = guard
            .registry
            .get_mut(&worker_name)
            .map(|slot| slot.prepare(&requests));
        let prepare_ok = match prepare_ok {
            Some(fut) => fut.await.unwrap_or(false),
            None => false,
        };
        if !prepare_ok {
            return Self::abort(&mut guard, cleanup, &status, &worker_handle).await;
        }

        // 7. Ping. Required for remote-worker correctness (spec §4.5).
        let ping_ok = match guard.registry.get_mut(&worker_name) {
            Some(slot) => slot.ping().await,
            None => false,
        };
        if !ping_ok {
            return Self::abort(&mut guard, cleanup, &status, &worker_handle).await;
        }

        // 8. Transition slot to BUILDING.
        match guard.registry.get_mut(&worker_name) {
            Some(slot) => slot.build_started(),
            None => {
                return Self::abort(&mut guard, cleanup, &status, &worker_handle).await;
            }
        }
        {
            let worker_name = worker_name.clone();
            cleanup.push(Box::new(move |inner: &mut BuilderInner| {
                if let Some(slot) = inner.registry.get_mut(&worker_name) {
                    slot.build_finished();
                }
            }));
        }

        // 9. remoteStartBuild.
        if worker_handle.remote_start_build(&builder_name).await.is_err() {
            return Self::abort(&mut guard, cleanup, &status, &worker_handle).await;
        }

        // 10. Allocate status-side build (non-persistent UI object).
        let status_number = deps.status_sink.new_build(&builder_name);

        // 11. Persist build row. Only the last request is recorded (a
        // deliberate denormalization, see SPEC_FULL.md §9).
        let row = NewBuildRow {
            builder_id,
            build_request_id: requests.last().expect("checked non-empty above").id,
            worker_id,
            master_id,
            state_strings: vec!["created".to_string()],
        };
        let (db_build_id, number) = match deps.build_store.add_build(row).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("addBuild failed for builder {}: {}", builder_name, err);
                return Self::abort(&mut guard, cleanup, &status, &worker_handle).await;
            }
        };

        // 12. Post-commit re-check. No suspension between the persist step
        // and this check.
        let still_connected = guard.registry.get_mut(&worker_name).map(|slot| slot.is_connected()).unwrap_or(false);
        if !still_connected {
            Self::unwind(&mut guard, cleanup, &status);
            worker_handle.release_locks().await;
            if let Err(err) = deps.build_store.finish_build(db_build_id, BuildResults::Cancelled).await {
                warn!("finishBuild (post-commit abort) failed for build {}: {}", db_build_id, err);
            }
            return false;
        }

        if let Some(entry) = guard.building.last_mut() {
            entry.db_build_id = db_build_id;
            entry.status_number = number;
        }

        // 13. Publish build_started. Exactly one event per build (P3), keyed
        // on the last request of the merged set -- matches step 11's
        // denormalization, which also only records the last request.
        let last_req = requests.last().expect("checked non-empty above");
        deps.status_sink.build_started(last_req.id, &builder_name, number);

        // 14. Launch Build asynchronously; do not await its completion here.
        let inner_for_task = inner.clone();
        let deps_for_task = deps.clone();
        let status_for_task = status.clone();
        let builder_name_for_task = builder_name.clone();
        let worker_name_for_task = worker_name.clone();
        let worker_handle_for_run = worker_handle.clone();
        let requests_for_task = requests.clone();
        drop(guard);

        let (job, token) = ConcurrentJob::new();
        jobs.lock().unwrap().add(job);

        tokio::spawn(async move {
            let _token = token;
            let run_result = std::panic::AssertUnwindSafe(runner.run(worker_handle_for_run)).catch_unwind().await;
            let results = run_result.unwrap_or(BuildResults::Exception);

            CompletionHandler::handle(
                inner_for_task,
                deps_for_task,
                status_for_task,
                builder_id,
                builder_name_for_task,
                db_build_id,
                requests_for_task,
                worker_name_for_task,
                results,
            )
            .await;
        });

        // 15. Cleanup stack discarded -- ownership transferred to CompletionHandler.
        true
    }

    fn unwind(guard: &mut BuilderInner, cleanup: Vec<Undo>, status: &StatusAggregator) {
        for undo in cleanup.into_iter().rev() {
            undo(guard);
        }
        status.refresh(&*guard);
    }

    /// Unwinds the state stack and releases the locks acquired in step 3.5
    /// (spec §5: "the cleanup stack guarantees release on abort"). Always
    /// returns `false`, so every call site can `return Self::abort(...).await`.
    async fn abort(guard: &mut BuilderInner, cleanup: Vec<Undo>, status: &StatusAggregator, worker_handle: &WorkerHandle) -> bool {
        Self::unwind(guard, cleanup, status);
        worker_handle.release_locks().await;
        false
    }
}
