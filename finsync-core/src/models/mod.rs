//! Data types shared across the sync engine.

mod operation;
mod sync_state;

pub use operation::{OpKind, Operation, QueuedOperation};
pub use sync_state::{SyncState, SyncStatus};
