//! The build request type the dispatcher consumes. Ownership (queuing, merge
//! policy beyond the trivial default) belongs to the external scheduler; the
//! dispatcher treats everything but `id`/`buildset_id`/`builder_name` as opaque.

use std::time::SystemTime;

/// Stable identifier for a queued build request, assigned by the request store.
pub type RequestId = u64;

/// Stable identifier for a buildset (a group of requests submitted together).
pub type BuildsetId = u64;

/// A queued unit of work addressed to a builder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub id: RequestId,
    pub buildset_id: BuildsetId,
    pub builder_name: String,
}

/// A build request as returned by the store, carrying the bookkeeping fields
/// the dispatcher itself does not own but needs to report (e.g. `submitted_at`
/// for `Builder::oldest_request_time`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequestRow {
    pub request: BuildRequest,
    pub submitted_at: SystemTime,
    pub claimed: bool,
}
