//! The builder-id registry (spec §6): `findBuilderId` is idempotent, so the
//! resolved id is cached forever on the `Builder` once known (invariant I3).

use async_trait::async_trait;

use crate::errors::DispatchError;

#[async_trait]
pub trait BuilderIdRegistry: Send + Sync {
    async fn find_builder_id(&self, name: &str) -> Result<u64, DispatchError>;
}
