//! WorkerRegistry (spec §4.1): the set of workers currently attached or
//! attaching to one builder.
//!
//! Grounded on the `attaching_slaves`/`slaves` pair in the source: two lists
//! rather than one map-with-state, collapsed here into a single map keyed by
//! worker name since `WorkerSlot` already carries its own state.

use std::collections::HashMap;

use log::{debug, warn};

use crate::errors::DispatchError;
use crate::worker::{CommandTable, WorkerHandle, WorkerSlot};

#[derive(Default)]
pub struct WorkerRegistry {
    slots: HashMap<String, WorkerSlot>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        WorkerRegistry { slots: HashMap::new() }
    }

    /// A worker has connected. Re-attaching an already-known worker is a
    /// no-op on the map (spec I1: "attaching an already-attached worker name
    /// is a no-op, not an error") -- the existing slot, and its state, is left
    /// alone and `false` is returned so the caller skips the handshake.
    pub fn note_connecting(&mut self, worker: WorkerHandle) -> bool {
        let name = worker.worker_name().to_string();
        if self.slots.contains_key(&name) {
            debug!("worker {} is already attached or attaching, ignoring", name);
            return false;
        }
        self.slots.insert(name, WorkerSlot::new_attaching(worker));
        true
    }

    /// Runs the liveness handshake for a worker previously admitted by
    /// `note_connecting`. On failure the slot is dropped entirely, not left
    /// ATTACHING (spec §4.1: "on handshake failure the worker is discarded").
    pub async fn attach(&mut self, worker_name: &str, commands: &CommandTable) -> Result<(), DispatchError> {
        let result = match self.slots.get_mut(worker_name) {
            Some(slot) => slot.attach(commands).await,
            None => return Err(DispatchError::NotConnected),
        };
        if result.is_err() {
            self.slots.remove(worker_name);
        }
        result
    }

    /// A worker has disconnected, from any state. Idempotent.
    pub async fn detached(&mut self, worker_name: &str) {
        if let Some(mut slot) = self.slots.remove(worker_name) {
            slot.detach().await;
        } else {
            warn!("detached called for unknown worker {}", worker_name);
        }
    }

    /// IDLE workers only (spec §4.1, "available").
    pub fn available(&self) -> impl Iterator<Item = &WorkerSlot> {
        self.slots.values().filter(|s| s.is_idle())
    }

    pub fn get_mut(&mut self, worker_name: &str) -> Option<&mut WorkerSlot> {
        self.slots.get_mut(worker_name)
    }

    pub fn worker_names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WorkerSlot)> {
        self.slots.iter()
    }

    /// Drops any slot whose name is no longer in `allowed` (spec §4.7
    /// reconfigure: workers removed from config are pruned, connected or not).
    pub fn prune_to(&mut self, allowed: &[String]) -> Vec<WorkerHandle> {
        let allowed: std::collections::HashSet<&str> = allowed.iter().map(String::as_str).collect();
        let removed_names: Vec<String> = self
            .slots
            .keys()
            .filter(|name| !allowed.contains(name.as_str()))
            .cloned()
            .collect();
        removed_names
            .into_iter()
            .filter_map(|name| self.slots.remove(&name).map(|slot| slot.handle()))
            .collect()
    }
}
