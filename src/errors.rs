//! The error taxonomy shared by every collaborator trait (store, registry,
//! remote worker) plus `Builder::reconfigure`.
//!
//! The dispatcher itself never lets these escape its public surface (see
//! `BuildStarter`/`CompletionHandler`/`Builder`) -- collaborator errors are
//! always converted to a log line and a sentinel return value. `reconfigure`
//! is the one place a `DispatchError` is allowed to propagate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("worker attach handshake failed for {worker_name}: {source}")]
    AttachFailed { worker_name: String, #[source] source: anyhow::Error },

    #[error("worker is not connected")]
    NotConnected,

    #[error("remote worker call failed: {0}")]
    Remote(#[source] anyhow::Error),

    #[error("request store operation failed: {0}")]
    Store(#[source] anyhow::Error),

    #[error("build store operation failed: {0}")]
    BuildStore(#[source] anyhow::Error),

    #[error("builder id lookup failed for {name}: {source}")]
    RegistryLookup { name: String, #[source] source: anyhow::Error },

    #[error("no configuration entry found for builder {name:?}")]
    NoMatchingConfig { name: String },
}
