//! The abstract remote-call interface consumed by `WorkerSlot` (spec §6,
//! "Worker / remote"). The worker-side process and protocol framing are out
//! of scope -- this crate only needs something that can be attached, pinged,
//! told to start a build, and asked to release its locks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::DispatchError;
use crate::request::BuildRequest;

/// Opaque table of command names the remote supports, handed to `attach`.
pub type CommandTable = std::collections::HashMap<String, String>;

/// A handle to a connected (or formerly connected) remote worker.
///
/// `is_connected` models the nullable `connection` field from spec §3/§4.5:
/// once it flips to `false` it never flips back for this handle -- a
/// reconnect creates a new `RemoteWorker`/`WorkerSlot` pair.
#[async_trait]
pub trait RemoteWorker: Send + Sync {
    fn worker_name(&self) -> &str;

    /// Stable numeric id, resolved once at attach time (spec §4.5 step 2:
    /// "Fetch `workerId` from `w.worker`").
    fn worker_id(&self) -> u64;

    fn is_connected(&self) -> bool;

    async fn attach(&self, commands: &CommandTable) -> Result<(), DispatchError>;

    /// Resource setup on the remote ahead of a build; `Ok(false)` means "not
    /// ready", not an error.
    async fn prepare(&self, requests: &[BuildRequest]) -> Result<bool, DispatchError>;

    /// Liveness check. `Ok(false)` means the remote answered but declined;
    /// `Err` and a dropped connection both count as a failed ping.
    async fn ping(&self) -> Result<bool, DispatchError>;

    /// Local bookkeeping hook: the remote has no wire message for this, it's
    /// purely how the worker-side object marks itself busy/free.
    fn build_started(&self) {}
    fn build_finished(&self) {}

    async fn remote_start_build(&self, builder_name: &str) -> Result<(), DispatchError>;

    /// Acquires the builder's configured locks ahead of a build (spec §4.5,
    /// builder.py's `setLocks`). Lock contention/queueing is out of scope
    /// (§1); the default accepts unconditionally, so a worker with no lock
    /// support still brackets correctly with `release_locks`.
    async fn acquire_locks(&self, _locks: &[String]) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn release_locks(&self);

    async fn detach(&self);
}

pub type WorkerHandle = Arc<dyn RemoteWorker>;
