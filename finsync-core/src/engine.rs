//! Offline queue and sync engine.
//!
//! The engine is the single owner of the pending-operation queue and
//! the sync status. Submissions while online are executed through the
//! retry executor; submissions while offline (or after transient
//! exhaustion) are persisted and replayed in enqueue order once
//! connectivity returns.
//!
//! Status lifecycle: `Idle` at start; `Offline` on a connection-lost
//! event; `Syncing` while executing or replaying; `Retrying` while an
//! attempt is backing off; `Synced` when the queue drains; `Failed` on
//! a permanent submit failure. All mutation happens through `&mut self`,
//! so a single owner sequences queue writes and notifications.

use chrono::Utc;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connectivity::Connectivity;
use crate::error::{ErrorKind, OpError};
use crate::models::{Operation, QueuedOperation, SyncState, SyncStatus};
use crate::recovery::{user_message, ErrorContext, Recovery, Severity};
use crate::retry::{retry_with_backoff_observed, RetryError, RetryPolicy};
use crate::store::{QueueStore, StoreError};
use crate::transport::Transport;

/// Default replay budget per queued operation.
const DEFAULT_MAX_REPLAY_RETRIES: u32 = 5;

/// Handle returned by [`SyncEngine::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

type StatusListener = Box<dyn Fn(&SyncState) + Send>;

/// Outcome of a replay pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaySummary {
    /// Operations replayed successfully and removed from the queue.
    pub succeeded: usize,
    /// Operations whose replay attempt failed this pass.
    pub failed: usize,
    /// Operations discarded after spending their replay budget.
    pub dropped: usize,
    /// Operations still queued after the pass.
    pub remaining: usize,
}

/// A submitted operation that could not be completed.
#[derive(Debug, Clone, Error)]
#[error("{user_message}")]
pub struct SyncFailure {
    pub user_message: String,
    pub kind: ErrorKind,
    /// True for failures that may resolve on their own.
    pub transient: bool,
    /// True when the operation was captured for later replay.
    pub queued: bool,
    /// Attempts made before giving up; 0 when offline short-circuited.
    pub attempts: u32,
    pub operation_id: Uuid,
    /// Error-log entry id, when one was appended.
    pub error_id: Option<Uuid>,
    #[source]
    pub source: OpError,
}

/// Errors from [`SyncEngine::submit`].
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The operation failed; `queued` says whether it awaits replay.
    #[error(transparent)]
    Sync(#[from] Box<SyncFailure>),
    /// The durable queue mirror could not be written.
    #[error("queue store: {0}")]
    Store(#[from] StoreError),
}

impl SubmitError {
    /// True when the failed operation was captured for later replay.
    pub fn queued(&self) -> bool {
        matches!(self, SubmitError::Sync(failure) if failure.queued)
    }

    /// The sync failure, when the error is one.
    pub fn failure(&self) -> Option<&SyncFailure> {
        match self {
            SubmitError::Sync(failure) => Some(failure),
            SubmitError::Store(_) => None,
        }
    }
}

/// Offline queue and sync engine.
///
/// Construct one instance at startup and pass it by handle. `new` is
/// the idempotent init point: it loads the persisted queue, so a
/// restarted process resumes exactly where it left off.
pub struct SyncEngine<T, S> {
    transport: T,
    store: S,
    connectivity: Connectivity,
    recovery: Recovery,
    policy: RetryPolicy,
    max_replay_retries: u32,
    queue: Vec<QueuedOperation>,
    state: SyncState,
    subscribers: Vec<(SubscriptionId, StatusListener)>,
    next_subscription: SubscriptionId,
}

impl<T: Transport, S: QueueStore> SyncEngine<T, S> {
    pub fn new(transport: T, store: S, connectivity: Connectivity) -> Result<Self, StoreError> {
        let mut queue = store.get_all()?;
        queue.sort_by_key(|op| op.timestamp);

        if !queue.is_empty() {
            info!(pending = queue.len(), "loaded queued operations from store");
        }

        let mut state = SyncState::new(connectivity.is_online());
        state.pending_count = queue.len();

        Ok(Self {
            transport,
            store,
            connectivity,
            recovery: Recovery::new(),
            policy: RetryPolicy::sync_default(),
            max_replay_retries: DEFAULT_MAX_REPLAY_RETRIES,
            queue,
            state,
            subscribers: Vec::new(),
            next_subscription: 0,
        })
    }

    /// Overrides the retry policy used for submissions and replays.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the replay budget given to newly queued operations.
    pub fn with_max_replay_retries(mut self, max_replay_retries: u32) -> Self {
        self.max_replay_retries = max_replay_retries;
        self
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn recovery(&self) -> &Recovery {
        &self.recovery
    }

    pub fn recovery_mut(&mut self) -> &mut Recovery {
        &mut self.recovery
    }

    /// Pending operations in replay order.
    pub fn queued_operations(&self) -> &[QueuedOperation] {
        &self.queue
    }

    /// Registers a status listener. Listeners are invoked synchronously,
    /// in registration order, whenever the status or the pending count
    /// changes.
    pub fn subscribe(&mut self, listener: impl Fn(&SyncState) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns false if the id was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Records a connectivity transition and drives the matching state
    /// change. Going online starts a replay pass; going offline parks
    /// the engine.
    pub async fn set_online(&mut self, online: bool) -> Result<(), StoreError> {
        self.connectivity.set_online(online);
        if online {
            info!("connection restored");
            self.replay_queue().await?;
        } else {
            info!("connection lost");
            self.set_status(SyncStatus::Offline, Some("no network connection"));
        }
        Ok(())
    }

    /// Submits an operation for execution.
    ///
    /// Offline submissions are persisted immediately and reported back
    /// as a queued transient failure; the caller owns user feedback.
    /// Online submissions run through the retry executor; transient
    /// exhaustion queues the operation, permanent failures do not.
    pub async fn submit(&mut self, operation: Operation) -> Result<Value, SubmitError> {
        let action = operation.describe();

        if !self.connectivity.is_online() {
            self.enqueue(&operation)?;
            self.set_status(SyncStatus::Offline, Some("offline, operation queued"));
            warn!(
                operation = %action,
                id = %operation.id,
                pending = self.queue.len(),
                "offline, operation queued for replay"
            );

            let source = OpError::new("no network connection");
            let message = user_message(ErrorKind::Network, Some(&action), &source);
            return Err(Box::new(SyncFailure {
                user_message: message,
                kind: ErrorKind::Network,
                transient: true,
                queued: true,
                attempts: 0,
                operation_id: operation.id,
                error_id: None,
                source,
            })
            .into());
        }

        self.set_status(SyncStatus::Syncing, None);

        match self.execute_with_retry(&operation).await {
            Ok(value) => {
                self.state.last_sync_time = Some(Utc::now());
                self.set_status(SyncStatus::Synced, None);
                Ok(value)
            }
            Err(failure) => {
                let kind = failure.kind;
                let transient = failure.retryable;

                let queued = transient || !self.connectivity.is_online();
                if queued {
                    self.enqueue(&operation)?;
                }

                let message = user_message(kind, Some(&action), &failure.source);
                let context =
                    ErrorContext::new(&action, &failure.source).with_attempts(failure.attempts);
                let error_id = self.recovery.log_failure(
                    context,
                    message.clone(),
                    Severity::for_kind(kind),
                    false,
                );

                if queued {
                    self.set_status(SyncStatus::Offline, Some(&message));
                } else {
                    self.set_status(SyncStatus::Failed, Some(&message));
                }

                Err(Box::new(SyncFailure {
                    user_message: message,
                    kind,
                    transient,
                    queued,
                    attempts: failure.attempts,
                    operation_id: operation.id,
                    error_id: Some(error_id),
                    source: failure.source,
                })
                .into())
            }
        }
    }

    /// Replays queued operations strictly in enqueue order.
    ///
    /// The pass halts at the first entry that fails but still has
    /// replay budget, so a later operation never reaches the transport
    /// before an earlier one has succeeded. Entries that spend their
    /// budget, or fail permanently, are dropped and reported through
    /// the error log.
    pub async fn replay_queue(&mut self) -> Result<ReplaySummary, StoreError> {
        if self.queue.is_empty() {
            self.set_status(SyncStatus::Synced, None);
            return Ok(ReplaySummary::default());
        }

        info!(pending = self.queue.len(), "replaying queued operations");
        self.set_status(SyncStatus::Syncing, None);

        let mut summary = ReplaySummary::default();

        loop {
            let Some(entry) = self.queue.first() else {
                break;
            };
            let operation = entry.operation();

            match self.execute_with_retry(&operation).await {
                Ok(_) => {
                    let done = self.queue.remove(0);
                    self.store.remove(done.id)?;
                    summary.succeeded += 1;
                    debug!(id = %done.id, "queued operation replayed");
                    self.update_pending();
                }
                Err(failure) => {
                    summary.failed += 1;
                    {
                        let entry = &mut self.queue[0];
                        entry.retries += 1;
                        entry.last_error = Some(failure.source.to_string());
                        entry.last_retry_time = Some(Utc::now());
                    }

                    let exhausted = self.queue[0].exhausted();
                    let permanent = !failure.retryable;

                    if exhausted || permanent {
                        let dropped = self.queue.remove(0);
                        self.store.remove(dropped.id)?;
                        summary.dropped += 1;
                        self.report_dropped(&dropped, &failure, permanent);
                        self.update_pending();
                    } else {
                        let entry = self.queue[0].clone();
                        self.store.update(&entry)?;
                        warn!(
                            id = %entry.id,
                            retries = entry.retries,
                            max_retries = entry.max_retries,
                            error = %failure.source,
                            "replay failed, operation stays queued"
                        );
                        break;
                    }
                }
            }
        }

        summary.remaining = self.queue.len();
        if self.queue.is_empty() {
            self.state.last_sync_time = Some(Utc::now());
            self.set_status(SyncStatus::Synced, None);
            info!(succeeded = summary.succeeded, dropped = summary.dropped, "sync queue drained");
        } else {
            let message = format!("{} operations still pending", summary.remaining);
            self.set_status(SyncStatus::Offline, Some(&message));
            info!(
                succeeded = summary.succeeded,
                remaining = summary.remaining,
                "partial sync, queue not drained"
            );
        }

        Ok(summary)
    }

    /// Clears the queue. Operator action only.
    pub fn clear_queue(&mut self) -> Result<(), StoreError> {
        self.store.clear()?;
        self.queue.clear();
        self.update_pending();
        self.set_status(SyncStatus::Synced, Some("queue cleared"));
        info!("sync queue cleared");
        Ok(())
    }

    async fn execute_with_retry(&mut self, operation: &Operation) -> Result<Value, RetryError> {
        let mut policy = self.policy.clone();
        policy.operation_name = Some(operation.describe());

        let Self {
            transport,
            state,
            subscribers,
            connectivity,
            ..
        } = self;
        let transport: &T = transport;

        retry_with_backoff_observed(
            &policy,
            || transport.perform(operation),
            |_attempt, _error, _delay| {
                if state.status != SyncStatus::Retrying {
                    state.status = SyncStatus::Retrying;
                    state.is_online = connectivity.is_online();
                    for (_, listener) in subscribers.iter() {
                        listener(state);
                    }
                }
            },
        )
        .await
    }

    fn enqueue(&mut self, operation: &Operation) -> Result<(), StoreError> {
        let queued = QueuedOperation::from_operation(operation, self.max_replay_retries);
        self.store.add(&queued)?;
        debug!(
            id = %queued.id,
            resource = %queued.resource,
            pending = self.queue.len() + 1,
            "operation queued"
        );
        self.queue.push(queued);
        self.update_pending();
        Ok(())
    }

    fn report_dropped(&mut self, entry: &QueuedOperation, failure: &RetryError, permanent: bool) {
        let action = format!("{} {}", entry.kind, entry.resource);
        warn!(
            id = %entry.id,
            retries = entry.retries,
            permanent,
            "dropping queued operation"
        );

        // Dead-letter record: the payload travels with the log entry so
        // the data is recoverable from an export even after the drop.
        let mut metadata = Map::new();
        metadata.insert("operation_id".into(), json!(entry.id));
        metadata.insert("resource".into(), json!(entry.resource));
        metadata.insert("payload".into(), entry.payload.clone());
        metadata.insert(
            "reason".into(),
            json!(if permanent {
                "permanent_error"
            } else {
                "retries_exhausted"
            }),
        );

        let message = format!(
            "{} (operation discarded after {} failed replays)",
            user_message(failure.kind, Some(&action), &failure.source),
            entry.retries
        );
        let context = ErrorContext::new(&action, &failure.source)
            .with_attempts(entry.retries)
            .with_metadata(metadata);
        self.recovery
            .log_failure(context, message, Severity::High, false);
    }

    fn set_status(&mut self, status: SyncStatus, message: Option<&str>) {
        let changed = status != self.state.status;
        self.state.status = status;
        self.state.last_error = message.map(String::from);
        self.state.is_online = self.connectivity.is_online();
        if changed {
            self.notify();
        }
    }

    fn update_pending(&mut self) {
        let count = self.queue.len();
        if count != self.state.pending_count {
            self.state.pending_count = count;
            self.notify();
        }
    }

    fn notify(&self) {
        for (_, listener) in &self.subscribers {
            listener(&self.state);
        }
    }
}
