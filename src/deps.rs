//! The collaborator bundle a `Builder` is constructed with (spec §6,
//! "external interfaces"). Bundling these as one struct rather than passing
//! five `Arc`s around separately is a deliberate redesign (SPEC_FULL.md §9).

use std::sync::Arc;

use crate::clock::Clock;
use crate::events::{MessageQueue, StatusSink};
use crate::store::{BuilderIdRegistry, BuildStore, BuildsetTracker, RequestStore};

pub struct Collaborators {
    pub request_store: Arc<dyn RequestStore>,
    pub build_store: Arc<dyn BuildStore>,
    pub buildset_tracker: Arc<dyn BuildsetTracker>,
    pub builder_id_registry: Arc<dyn BuilderIdRegistry>,
    pub message_queue: Arc<dyn MessageQueue>,
    pub status_sink: Arc<dyn StatusSink>,
    pub clock: Arc<dyn Clock>,
}
