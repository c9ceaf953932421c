//! ReclaimTimer (spec §4.3): periodically re-asserts ownership of every
//! request this master currently believes it owns, so a crashed master's
//! claims eventually expire and get stolen instead of orphaning requests
//! forever.

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::sync::Mutex;

use crate::clock::{schedule_periodic, Clock};
use crate::store::RequestStore;

pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Anything that can list the request ids currently believed in-flight. The
/// `Builder` implements this over `building ∪ oldBuilding` (SPEC_FULL.md §9).
pub trait InFlightRequests: Send + Sync {
    fn in_flight_request_ids(&self) -> Vec<crate::request::RequestId>;
}

pub struct ReclaimTimer {
    interval: Duration,
}

impl ReclaimTimer {
    pub fn new(interval: Duration) -> Self {
        ReclaimTimer { interval }
    }

    pub fn with_default_interval() -> Self {
        ReclaimTimer::new(DEFAULT_RECLAIM_INTERVAL)
    }

    /// Spawns the periodic task. Errors from the store are logged and
    /// swallowed (spec §4.3, §7: a failed reclaim is not fatal, the next tick
    /// tries again).
    pub fn spawn<I>(&self, clock: Arc<dyn Clock>, store: Arc<dyn RequestStore>, source: Arc<Mutex<I>>) -> tokio::task::JoinHandle<()>
    where
        I: InFlightRequests + 'static,
    {
        let interval = self.interval;
        schedule_periodic(clock, interval, move || {
            let store = store.clone();
            let source = source.clone();
            async move {
                let ids = source.lock().await.in_flight_request_ids();
                if ids.is_empty() {
                    return;
                }
                if let Err(err) = store.reclaim_build_requests(&ids).await {
                    warn!("periodic reclaim failed: {}", err);
                }
            }
        })
    }
}
