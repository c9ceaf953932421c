//! The build store (spec §6): records the start and terminal result of a
//! build. Only the last request of a merged build is recorded -- a deliberate
//! denormalization reproduced from the source, see SPEC_FULL.md §9.

use async_trait::async_trait;

use crate::build::BuildResults;
use crate::errors::DispatchError;
use crate::request::RequestId;

/// Row written at build-start time (spec §4.5 step 11).
#[derive(Debug, Clone)]
pub struct NewBuildRow {
    pub builder_id: u64,
    pub build_request_id: RequestId,
    pub worker_id: u64,
    pub master_id: u64,
    pub state_strings: Vec<String>,
}

#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Returns `(build_id, number)`.
    async fn add_build(&self, row: NewBuildRow) -> Result<(u64, u64), DispatchError>;

    async fn finish_build(&self, build_id: u64, results: BuildResults) -> Result<(), DispatchError>;
}
