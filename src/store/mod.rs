pub mod build_store;
pub mod buildset;
pub mod registry;
pub mod request_store;

pub use build_store::{BuildStore, NewBuildRow};
pub use buildset::BuildsetTracker;
pub use registry::BuilderIdRegistry;
pub use request_store::RequestStore;
