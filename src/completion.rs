//! CompletionHandler (C6, spec §4.6): the terminal callback for one
//! InFlightBuild. Runs once per build, regardless of which of the seven
//! terminal results it saw.

use std::collections::HashSet;
use std::sync::Arc;

use log::warn;
use tokio::sync::Mutex;

use crate::build::BuildResults;
use crate::builder::BuilderInner;
use crate::deps::Collaborators;
use crate::events::{BuildRequestComplete, RoutingKey};
use crate::request::BuildRequest;
use crate::status::StatusAggregator;

pub struct CompletionHandler;

impl CompletionHandler {
    pub async fn handle(
        inner: Arc<Mutex<BuilderInner>>,
        deps: Arc<Collaborators>,
        status: Arc<StatusAggregator>,
        builder_id: u64,
        builder_name: String,
        db_build_id: u64,
        requests: Vec<BuildRequest>,
        worker_name: String,
        results: BuildResults,
    ) {
        // 2. Persist finishBuild. Errors logged, not propagated: I4 depends
        // on the store's own transactional semantics, not on this call.
        if let Err(err) = deps.build_store.finish_build(db_build_id, results).await {
            warn!("finishBuild failed for build {}: {}", db_build_id, err);
        }

        // 3. Remove the Build from building[] (or oldBuilding, if it was
        // inherited from a predecessor master), release the worker slot, and
        // release its locks via the worker handle.
        let worker_handle = {
            let mut guard = inner.lock().await;
            if let Some(pos) = guard.building.iter().position(|b| b.db_build_id == db_build_id) {
                guard.building.remove(pos);
            } else {
                guard.old_building.remove(&db_build_id);
            }
            let handle = guard.registry.get_mut(&worker_name).map(|slot| {
                slot.build_finished();
                slot.handle()
            });
            handle
        };

        // 4. Branch on results.
        let ids: Vec<crate::request::RequestId> = requests.iter().map(|r| r.id).collect();

        if results.is_retry() {
            if let Err(err) = deps.request_store.unclaim_build_requests(&ids).await {
                warn!("unclaimBuildRequests failed for build {}: {}", db_build_id, err);
            }
            for req in &requests {
                deps.message_queue.produce_request_unclaimed(req.id);
            }
        } else {
            let complete_at = deps.clock.now();
            if let Err(err) = deps.request_store.complete_build_requests(&ids, results, complete_at).await {
                warn!("completeBuildRequests failed for build {}: {}", db_build_id, err);
            }
            for req in &requests {
                let key = RoutingKey::build_request_complete(req.buildset_id, builder_id, req.id);
                let body = BuildRequestComplete {
                    brid: req.id,
                    bsid: req.buildset_id,
                    buildername: builder_name.clone(),
                    builderid: builder_id,
                    complete_at,
                    results,
                };
                deps.message_queue.produce_build_request_complete(key, body);
            }
            let mut seen_bsids = HashSet::new();
            for req in &requests {
                if seen_bsids.insert(req.buildset_id) {
                    if let Err(err) = deps.buildset_tracker.maybe_buildset_complete(req.buildset_id).await {
                        warn!("maybeBuildsetComplete failed for bsid {}: {}", req.buildset_id, err);
                    }
                }
            }
        }

        // 5. Release worker locks.
        if let Some(handle) = worker_handle {
            handle.release_locks().await;
        }

        // 6. Refresh StatusAggregator.
        let guard = inner.lock().await;
        status.refresh(&*guard);
    }
}
