//! `maybeBuildsetComplete` (spec §4.6, §5): checks whether every request in a
//! buildset has completed and, if so, finalizes the buildset. Not listed
//! under "Build store" in spec §6 but consumed the same way -- a store-side
//! operation this crate calls and does not implement.

use async_trait::async_trait;

use crate::errors::DispatchError;
use crate::request::BuildsetId;

#[async_trait]
pub trait BuildsetTracker: Send + Sync {
    async fn maybe_buildset_complete(&self, bsid: BuildsetId) -> Result<(), DispatchError>;
}
