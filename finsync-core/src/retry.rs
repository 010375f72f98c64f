//! Bounded retry with exponential backoff.
//!
//! Wraps any fallible async operation. Each attempt races against a
//! per-attempt timeout; failures are classified and only transient
//! kinds are retried. Delays grow geometrically, capped at the policy
//! maximum, with optional symmetric jitter to avoid retry storms.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{classify, ErrorKind, OpError};

/// Smallest delay ever inserted between attempts.
const DELAY_FLOOR: Duration = Duration::from_millis(100);

/// Configuration for bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first attempt. At least 1.
    pub max_retries: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
    /// Growth factor between successive delays.
    pub backoff_multiplier: f64,
    /// Symmetric jitter range as a fraction of the delay (0 disables).
    pub jitter_factor: f64,
    /// Time budget for each individual attempt.
    pub timeout: Duration,
    /// Label used in diagnostics.
    pub operation_name: Option<String>,
}

impl Default for RetryPolicy {
    /// General-purpose policy: 3 attempts, 1s initial delay, 10s cap,
    /// doubling, 10% jitter, 5s per attempt.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            timeout: Duration::from_secs(5),
            operation_name: None,
        }
    }
}

impl RetryPolicy {
    /// Stricter policy used for sync operations: 5 attempts starting at
    /// 100ms, doubling, 3s per attempt.
    pub fn sync_default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            timeout: Duration::from_secs(3),
            operation_name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    fn name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("operation")
    }

    /// Delay inserted after the given failed attempt (1-indexed).
    ///
    /// `initial_delay * multiplier^(attempt-1)`, capped at `max_delay`,
    /// jittered, then floored at 100ms. Deterministic when
    /// `jitter_factor` is 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        // Cap the exponent; 31 doublings is already far past any cap.
        let exp = attempt.saturating_sub(1).min(31) as i32;
        let mut delay_ms = (initial_ms * self.backoff_multiplier.powi(exp)).min(max_ms);

        if self.jitter_factor > 0.0 {
            let range = delay_ms * self.jitter_factor;
            delay_ms += rand::rng().random_range(-range..=range);
        }

        let floor_ms = DELAY_FLOOR.as_millis() as f64;
        let clamped = delay_ms.clamp(floor_ms, max_ms.max(floor_ms));
        Duration::from_millis(clamped.round() as u64)
    }
}

/// Terminal failure from the retry executor.
///
/// `retryable == false` implies a single attempt was made; otherwise
/// `attempts` counts every attempt up to the policy bound.
#[derive(Debug, Clone, Error)]
#[error("{kind} error after {attempts} attempt(s): {source}")]
pub struct RetryError {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub attempts: u32,
    pub last_attempt_time: DateTime<Utc>,
    #[source]
    pub source: OpError,
}

/// Executes an async operation with bounded retry and backoff.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OpError>>,
{
    retry_with_backoff_observed(policy, operation, |_, _, _| {}).await
}

/// Like [`retry_with_backoff`], invoking `on_retry(attempt, error, delay)`
/// before each backoff sleep.
pub async fn retry_with_backoff_observed<T, F, Fut, C>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: C,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OpError>>,
    C: FnMut(u32, &OpError, Duration),
{
    let max_retries = policy.max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(OpError::timed_out(policy.timeout)),
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = policy.name(),
                        attempt, "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let kind = classify(&error);
        let retryable = kind.is_retryable();
        debug!(
            operation = policy.name(),
            attempt,
            max_retries,
            %kind,
            retryable,
            error = %error,
            "attempt failed"
        );

        if !retryable {
            return Err(RetryError {
                kind,
                retryable: false,
                attempts: attempt,
                last_attempt_time: Utc::now(),
                source: error,
            });
        }

        if attempt >= max_retries {
            warn!(
                operation = policy.name(),
                attempts = attempt,
                error = %error,
                "retry budget exhausted"
            );
            return Err(RetryError {
                kind,
                retryable: true,
                attempts: attempt,
                last_attempt_time: Utc::now(),
                source: error,
            });
        }

        let delay = policy.delay_for_attempt(attempt);
        debug!(
            operation = policy.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "backing off before retry"
        );
        on_retry(attempt, &error, delay);
        tokio::time::sleep(delay).await;
    }
}
