pub mod remote;
pub mod slot;

pub use remote::{CommandTable, RemoteWorker, WorkerHandle};
pub use slot::{SlotState, WorkerSlot};
