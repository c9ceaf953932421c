//! WorkerSlot (spec §4.1): the state of one worker as seen by one builder.

use log::trace;

use crate::request::BuildRequest;
use crate::worker::remote::{CommandTable, WorkerHandle};

pub use crate::worker::remote::RemoteWorker;

/// Invariant: a slot is in exactly one of {ATTACHING, IDLE, PINGING, BUILDING,
/// DETACHED} at a time; DETACHED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Attaching,
    Idle,
    Pinging,
    Building,
    Detached,
}

pub struct WorkerSlot {
    worker: WorkerHandle,
    state: SlotState,
}

impl WorkerSlot {
    /// A freshly-seen worker starts out ATTACHING; `attach` must be run before
    /// it is usable.
    pub fn new_attaching(worker: WorkerHandle) -> Self {
        WorkerSlot { worker, state: SlotState::Attaching }
    }

    pub fn worker_name(&self) -> &str {
        self.worker.worker_name()
    }

    pub fn worker_id(&self) -> u64 {
        self.worker.worker_id()
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SlotState::Idle
    }

    pub fn is_building(&self) -> bool {
        self.state == SlotState::Building
    }

    pub fn is_connected(&self) -> bool {
        self.worker.is_connected()
    }

    pub fn handle(&self) -> WorkerHandle {
        self.worker.clone()
    }

    /// ATTACHING -> IDLE. Leaves the slot in ATTACHING (for the caller to drop)
    /// if the handshake fails.
    pub async fn attach(&mut self, commands: &CommandTable) -> Result<(), crate::errors::DispatchError> {
        self.worker.attach(commands).await?;
        self.state = SlotState::Idle;
        Ok(())
    }

    /// IDLE -> (still IDLE). Resource setup; `Ok(false)` means not ready.
    pub async fn prepare(&self, requests: &[BuildRequest]) -> Result<bool, crate::errors::DispatchError> {
        self.worker.prepare(requests).await
    }

    /// IDLE -> PINGING -> IDLE (success/decline) or DETACHED (connection lost).
    pub async fn ping(&mut self) -> bool {
        debug_assert_eq!(self.state, SlotState::Idle, "ping called on a non-idle slot");
        self.state = SlotState::Pinging;
        let outcome = self.worker.ping().await;
        self.state = match outcome {
            Ok(_) => SlotState::Idle,
            Err(_) => SlotState::Detached,
        };
        matches!(outcome, Ok(true))
    }

    /// IDLE -> BUILDING.
    pub fn build_started(&mut self) {
        debug_assert_eq!(self.state, SlotState::Idle, "buildStarted called on a non-idle slot");
        self.worker.build_started();
        self.state = SlotState::Building;
    }

    /// BUILDING -> IDLE. Balances exactly one prior `build_started` (spec P4).
    pub fn build_finished(&mut self) {
        self.worker.build_finished();
        if self.state != SlotState::Detached {
            self.state = SlotState::Idle;
        }
    }

    /// Idempotent; any state -> DETACHED.
    pub async fn detach(&mut self) {
        if self.state == SlotState::Detached {
            return;
        }
        trace!("detaching worker {}", self.worker_name());
        self.worker.detach().await;
        self.state = SlotState::Detached;
    }
}
