//! The two "produced" external interfaces (spec §6): the message queue, whose
//! routing keys have the shape `(resourceName, keyField_1, .., keyField_n,
//! event)` (grounded on buildbot's `ResourceType.produceEvent`), and the
//! status sink, a set of idempotent pushes describing builder state for a
//! web/status surface this crate does not implement.

use std::time::SystemTime;

use crate::build::BuildResults;
use crate::request::{BuildsetId, RequestId};

/// A dotted routing key, e.g. `buildrequest.7.3.42.complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKey(pub Vec<String>);

impl RoutingKey {
    pub fn build_request_complete(bsid: BuildsetId, builder_id: u64, brid: RequestId) -> Self {
        RoutingKey(vec![
            "buildrequest".to_string(),
            bsid.to_string(),
            builder_id.to_string(),
            brid.to_string(),
            "complete".to_string(),
        ])
    }

    pub fn as_dotted(&self) -> String {
        self.0.join(".")
    }
}

/// Body of the one message kind this core emits (spec §6).
#[derive(Debug, Clone)]
pub struct BuildRequestComplete {
    pub brid: RequestId,
    pub bsid: BuildsetId,
    pub buildername: String,
    pub builderid: u64,
    pub complete_at: SystemTime,
    pub results: BuildResults,
}

/// Message queue producer. Implementations fan this out to subscribers; this
/// crate only guarantees per-builder emission order (spec §5, "Ordering").
pub trait MessageQueue: Send + Sync {
    fn produce_build_request_complete(&self, key: RoutingKey, body: BuildRequestComplete);

    /// The source's `_resubmit_buildreqs` referenced a method that doesn't
    /// exist (`_msg_buildrequests_unclaimed`); SPEC_FULL.md §9 decides this is
    /// the intended signal, emitted once per unclaimed request on RETRY.
    fn produce_request_unclaimed(&self, request_id: RequestId);
}

/// Coarse builder state, derived by `StatusAggregator` (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigState {
    Offline,
    Idle,
    Building,
}

/// Status sink (spec §6). The sink is idempotent, so pushing on every
/// recomputation (rather than only on change) is harmless and simpler.
pub trait StatusSink: Send + Sync {
    fn builder_added(&self, name: &str, builddir: &str, category: Option<&str>, description: Option<&str>);
    fn set_description(&self, name: &str, description: Option<&str>);
    fn set_category(&self, name: &str, category: Option<&str>);
    fn set_workernames(&self, name: &str, worker_names: &[String]);
    fn set_cache_size(&self, name: &str, size: u64);
    fn new_build(&self, name: &str) -> u64;
    fn build_started(&self, brid: RequestId, builder_name: &str, status_build_number: u64);
    fn set_big_state(&self, name: &str, state: BigState);
    fn add_point_event(&self, name: &str, tags: &[String]);
}
