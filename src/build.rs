//! The `Build` abstraction the dispatcher hands a request set off to.
//!
//! Everything about *how* a build actually executes (steps, log streaming) is
//! out of scope (spec §1) -- this module only defines the boundary: a factory
//! that turns a request set into a runnable build, and the terminal result
//! that build reports back through.

use async_trait::async_trait;

use crate::request::{BuildRequest, RequestId};
use crate::worker::slot::WorkerHandle;

/// Terminal result of a build, as reported by the `Build` runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResults {
    Success,
    Warnings,
    Failure,
    Skipped,
    Exception,
    Retry,
    Cancelled,
}

impl BuildResults {
    /// `true` for the one result that triggers the resubmit path instead of
    /// the ordinary complete-and-notify path (spec §4.6).
    pub fn is_retry(self) -> bool {
        matches!(self, BuildResults::Retry)
    }
}

/// Constructs a `Build` from a configured factory, bound to a request set.
/// Grounded on `config.factory` in spec §6 (configuration consumed at reconfigure).
pub trait BuildFactory: Send + Sync {
    fn new_build(&self, requests: &[BuildRequest]) -> Box<dyn BuildRunner>;
}

/// A build, ready to run on an already-prepared, already-pinged worker.
///
/// `run` is polled to completion by a task spawned by `BuildStarter` -- the
/// starter does not await it directly (spec §4.5 step 14: "do NOT await its
/// completion").
#[async_trait]
pub trait BuildRunner: Send {
    async fn run(self: Box<Self>, worker: WorkerHandle) -> BuildResults;
}

/// A build that has been handed off to a worker and is executing.
///
/// `db_build_id`/`number` are `None` until the persist step (spec §4.5 step 11)
/// completes; after that they are set for the remainder of the build's life.
#[derive(Clone)]
pub struct InFlightBuild {
    pub requests: Vec<BuildRequest>,
    pub worker_name: String,
    pub db_build_id: u64,
    pub status_number: u64,
}

impl InFlightBuild {
    pub fn request_ids(&self) -> Vec<RequestId> {
        self.requests.iter().map(|r| r.id).collect()
    }
}
