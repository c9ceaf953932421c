//! The request store (spec §6): claim/reclaim/unclaim/complete for build
//! requests. Schema and cross-master atomicity are the store's own concern;
//! the dispatcher only relies on the operations being atomic.

use std::time::SystemTime;

use async_trait::async_trait;

use crate::build::BuildResults;
use crate::errors::DispatchError;
use crate::request::{BuildRequestRow, RequestId};

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Unclaimed (or all, if `claimed` is `None`) requests for `builder_name`.
    async fn get_build_requests(
        &self,
        builder_name: &str,
        claimed: Option<bool>,
    ) -> Result<Vec<BuildRequestRow>, DispatchError>;

    /// Re-asserts ownership of `ids`. Used by the reclaim timer (spec §4.3) and
    /// is safe to call on ids this master doesn't currently think it owns --
    /// that's how it steals a stale claim from a crashed master.
    async fn reclaim_build_requests(&self, ids: &[RequestId]) -> Result<(), DispatchError>;

    /// Returns `ids` to the unclaimed pool (spec §4.6, RETRY path).
    async fn unclaim_build_requests(&self, ids: &[RequestId]) -> Result<(), DispatchError>;

    /// Marks `ids` as completed with `results` at `complete_at`.
    async fn complete_build_requests(
        &self,
        ids: &[RequestId],
        results: BuildResults,
        complete_at: SystemTime,
    ) -> Result<(), DispatchError>;
}
