//! Centralized error recovery.
//!
//! The [`Recovery`] coordinator wraps operations with retry, captures
//! context for every terminal failure, keeps a bounded error log,
//! translates failures into user-facing messages, and runs an optional
//! rollback callback. Diagnostic logging here is observability only; it
//! never changes what callers get back.

use std::collections::VecDeque;
use std::future::Future;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{classify, ErrorKind, OpError};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Maximum number of entries retained in the error log.
const LOG_CAPACITY: usize = 100;

/// How serious a logged failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Default severity for a failure kind. Callers may override.
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Unauthorized => Severity::High,
            ErrorKind::Validation => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Context captured at the moment a failure is handled.
///
/// Immutable once built; construct with [`ErrorContext::new`] and the
/// `with_*` builders before logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub user_id: Option<String>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ErrorKind,
    pub error: OpError,
    pub attempts: Option<u32>,
    pub state_snapshot: Option<Value>,
    pub metadata: Option<Map<String, Value>>,
}

impl ErrorContext {
    pub fn new(action: impl Into<String>, error: &OpError) -> Self {
        Self {
            user_id: None,
            action: action.into(),
            timestamp: Utc::now(),
            kind: classify(error),
            error: error.clone(),
            attempts: None,
            state_snapshot: None,
            metadata: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn with_snapshot(mut self, snapshot: Value) -> Self {
        self.state_snapshot = Some(snapshot);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One handled failure in the bounded error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: Uuid,
    pub context: ErrorContext,
    pub user_message: String,
    pub severity: Severity,
    /// True when a rollback restored the caller's previous state, or a
    /// fallback value stood in for the result.
    pub recovered: bool,
    pub timestamp: DateTime<Utc>,
}

/// Rollback callback run after a terminal failure to restore previous state.
pub type RollbackFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), OpError>> + Send>;

/// Options for [`Recovery::handle`].
#[derive(Default)]
pub struct HandleOptions {
    pub user_id: Option<String>,
    pub policy: Option<RetryPolicy>,
    pub severity: Option<Severity>,
    pub state_snapshot: Option<Value>,
    pub metadata: Option<Map<String, Value>>,
    pub rollback: Option<RollbackFn>,
}

impl HandleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_snapshot(mut self, snapshot: Value) -> Self {
        self.state_snapshot = Some(snapshot);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackFn) -> Self {
        self.rollback = Some(rollback);
        self
    }
}

/// Terminal failure augmented with user-facing context.
#[derive(Debug, Clone, Error)]
#[error("{user_message}")]
pub struct RecoveredError {
    pub user_message: String,
    pub error_id: Uuid,
    pub kind: ErrorKind,
    /// True for failures that may resolve on their own.
    pub transient: bool,
    /// True when the rollback callback restored previous state.
    pub recovered: bool,
    pub attempts: u32,
    /// Set when a rollback was attempted and itself failed.
    pub rollback_error: Option<OpError>,
    #[source]
    pub source: OpError,
}

/// Translates an error kind into a human-readable sentence, optionally
/// qualified with the failing action.
pub fn user_message(kind: ErrorKind, action: Option<&str>, error: &OpError) -> String {
    let base = match kind {
        ErrorKind::Network => {
            "Connection problem. Check your internet and try again.".to_string()
        }
        ErrorKind::Timeout => "The operation took too long. Please try again.".to_string(),
        ErrorKind::RateLimit => {
            "Too many requests. Wait a moment and try again.".to_string()
        }
        ErrorKind::NotFound => {
            "The requested resource was not found. Check that the data is correct.".to_string()
        }
        ErrorKind::Unauthorized => "Access denied. Please sign in again.".to_string(),
        ErrorKind::Validation => format!("Invalid data: {}", error.message),
        ErrorKind::Unknown => {
            if error.message.is_empty() {
                "Unknown error. Please try again.".to_string()
            } else {
                error.message.clone()
            }
        }
    };

    match action {
        Some(action) => format!("Error while {}: {}", action, base),
        None => base,
    }
}

/// Coordinates retry, context capture, logging, rollback and user messaging.
///
/// Owns the bounded error log. Construct one per process and pass it by
/// handle; capacity eviction aside, the log is cleared only by an
/// explicit operator action.
#[derive(Debug, Default)]
pub struct Recovery {
    logs: VecDeque<ErrorLogEntry>,
}

impl Recovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, evicting the oldest past capacity.
    ///
    /// Returns the entry id so callers can correlate surfaced errors
    /// with the log.
    pub fn log_failure(
        &mut self,
        context: ErrorContext,
        user_message: impl Into<String>,
        severity: Severity,
        recovered: bool,
    ) -> Uuid {
        let entry = ErrorLogEntry {
            id: Uuid::new_v4(),
            context,
            user_message: user_message.into(),
            severity,
            recovered,
            timestamp: Utc::now(),
        };

        if severity >= Severity::High {
            error!(
                error_id = %entry.id,
                action = %entry.context.action,
                %severity,
                recovered,
                error = %entry.context.error,
                "operation failed"
            );
        } else {
            debug!(
                error_id = %entry.id,
                action = %entry.context.action,
                %severity,
                "operation failed"
            );
        }

        let id = entry.id;
        self.logs.push_back(entry);
        if self.logs.len() > LOG_CAPACITY {
            self.logs.pop_front();
        }
        id
    }

    /// Runs an operation with retry; on terminal failure captures
    /// context, logs, optionally rolls back, and returns the failure
    /// augmented with a user message.
    ///
    /// A rollback failure escalates the log entry to `Critical` and is
    /// surfaced on the returned error, never swallowed.
    pub async fn handle<T, F, Fut>(
        &mut self,
        action: &str,
        options: HandleOptions,
        operation: F,
    ) -> Result<T, RecoveredError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OpError>>,
    {
        let policy = options
            .policy
            .unwrap_or_default()
            .named(action.to_string());

        let failure = match retry_with_backoff(&policy, operation).await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        let kind = failure.kind;
        let mut context = ErrorContext::new(action, &failure.source).with_attempts(failure.attempts);
        context.user_id = options.user_id;
        context.state_snapshot = options.state_snapshot;
        context.metadata = options.metadata;

        let mut severity = options.severity.unwrap_or_else(|| Severity::for_kind(kind));
        let message = user_message(kind, Some(action), &failure.source);

        let mut recovered = false;
        let mut rollback_error = None;
        if let Some(rollback) = options.rollback {
            match rollback().await {
                Ok(()) => {
                    recovered = true;
                    debug!(action, "previous state restored after failure");
                }
                Err(err) => {
                    severity = Severity::Critical;
                    error!(action, error = %err, "state rollback failed");
                    rollback_error = Some(err);
                }
            }
        }

        let error_id = self.log_failure(context, message.clone(), severity, recovered);

        Err(RecoveredError {
            user_message: message,
            error_id,
            kind,
            transient: failure.retryable,
            recovered,
            attempts: failure.attempts,
            rollback_error,
            source: failure.source,
        })
    }

    /// Best-effort execution: on failure logs the error and returns the
    /// fallback value instead. Never fails, never retries.
    pub async fn safe_execute<T, F, Fut>(&mut self, action: &str, operation: F, fallback: T) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OpError>>,
    {
        match operation().await {
            Ok(value) => value,
            Err(err) => {
                let kind = classify(&err);
                let message = user_message(kind, Some(action), &err);
                warn!(action, error = %err, "operation failed, using fallback");
                self.log_failure(ErrorContext::new(action, &err), message, Severity::Low, true);
                fallback
            }
        }
    }

    /// All logged entries, oldest first.
    pub fn logs(&self) -> Vec<ErrorLogEntry> {
        self.logs.iter().cloned().collect()
    }

    /// Entries captured for a specific user.
    pub fn logs_for_user(&self, user_id: &str) -> Vec<ErrorLogEntry> {
        self.logs
            .iter()
            .filter(|entry| entry.context.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }

    /// Entries at `High` severity or above.
    pub fn critical_logs(&self) -> Vec<ErrorLogEntry> {
        self.logs
            .iter()
            .filter(|entry| entry.severity >= Severity::High)
            .cloned()
            .collect()
    }

    /// Entries prepared for export: state snapshots are redacted so
    /// captured application state never leaves the process.
    pub fn export_logs(&self) -> Vec<ErrorLogEntry> {
        self.logs
            .iter()
            .cloned()
            .map(|mut entry| {
                if entry.context.state_snapshot.is_some() {
                    entry.context.state_snapshot = Some(Value::String("[REDACTED]".into()));
                }
                entry
            })
            .collect()
    }

    /// Clears the log. Operator action only.
    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }
}
