//! StatusAggregator (spec §4.4): derives the coarse `BigState` for a builder
//! and pushes it (and related status events) to a `StatusSink`. Must never
//! fail into its periodic timer -- there is nothing meaningful to do with a
//! status-push error, so it is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{schedule_periodic, Clock};
use crate::events::{BigState, StatusSink};

pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Inputs `StatusAggregator` needs to derive `BigState` (spec §4.4): whether
/// any worker is connected, and whether any build is in flight.
pub trait StatusInputs: Send + Sync {
    fn any_worker_connected(&self) -> bool;
    fn any_build_in_flight(&self) -> bool;
}

pub struct StatusAggregator {
    builder_name: String,
    sink: Arc<dyn StatusSink>,
}

impl StatusAggregator {
    pub fn new(builder_name: String, sink: Arc<dyn StatusSink>) -> Self {
        StatusAggregator { builder_name, sink }
    }

    /// OFFLINE if no worker is connected, else BUILDING if any build is in
    /// flight, else IDLE (spec §4.4). Called after every attach/detach/start/
    /// finish, and on the 30-minute timer below.
    pub fn refresh(&self, inputs: &dyn StatusInputs) -> BigState {
        let state = if !inputs.any_worker_connected() {
            BigState::Offline
        } else if inputs.any_build_in_flight() {
            BigState::Building
        } else {
            BigState::Idle
        };
        self.sink.set_big_state(&self.builder_name, state);
        state
    }

    pub fn spawn_periodic<I>(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        inputs: Arc<tokio::sync::Mutex<I>>,
    ) -> tokio::task::JoinHandle<()>
    where
        I: StatusInputs + 'static,
    {
        schedule_periodic(clock, interval, move || {
            let this = self.clone();
            let inputs = inputs.clone();
            async move {
                let guard = inputs.lock().await;
                this.refresh(&*guard);
            }
        })
    }
}
