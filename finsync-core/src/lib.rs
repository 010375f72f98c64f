//! Finsync Core Library
//!
//! Resilient-operation and offline-synchronization engine shared by
//! finsync applications: failure classification, bounded retry with
//! exponential backoff, error recovery with a bounded log, and a
//! durable offline queue replayed in order when connectivity returns.

pub mod connectivity;
pub mod engine;
pub mod error;
pub mod models;
pub mod recovery;
pub mod retry;
pub mod store;
pub mod transport;

pub use connectivity::Connectivity;
pub use engine::{ReplaySummary, SubmitError, SubscriptionId, SyncEngine, SyncFailure};
pub use error::{classify, is_retryable, ErrorKind, OpError};
pub use models::{OpKind, Operation, QueuedOperation, SyncState, SyncStatus};
pub use recovery::{
    user_message, ErrorContext, ErrorLogEntry, HandleOptions, RecoveredError, Recovery, Severity,
};
pub use retry::{retry_with_backoff, retry_with_backoff_observed, RetryError, RetryPolicy};
pub use store::{FileQueueStore, MemoryQueueStore, QueueStore, StoreError};
pub use transport::Transport;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
