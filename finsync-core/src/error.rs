//! Failure classification.
//!
//! Transports and other collaborators report failures of ad hoc shape:
//! a message, sometimes an HTTP status, sometimes a platform error
//! code. [`OpError`] is the common denominator the classifier inspects,
//! and [`classify`] maps every failure onto exactly one [`ErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Closed set of failure categories.
///
/// `Network`, `Timeout` and `RateLimit` are transient and worth
/// retrying; the rest are permanent and retried never.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimit,
    NotFound,
    Unauthorized,
    Validation,
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind can be expected to resolve on its own.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimit
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A failure reported by a transport or other collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// HTTP status code, when the failure came from an HTTP response.
    pub status: Option<u16>,
    /// Platform error code such as `ECONNREFUSED` or `ETIMEDOUT`.
    pub code: Option<String>,
}

impl OpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Error produced when an attempt loses the race against its timeout.
    pub fn timed_out(after: Duration) -> Self {
        Self::new(format!("operation timed out after {}ms", after.as_millis()))
            .with_code("ETIMEDOUT")
    }

    /// The classified kind of this failure.
    pub fn kind(&self) -> ErrorKind {
        classify(self)
    }

    /// Whether this failure is worth retrying.
    pub fn is_retryable(&self) -> bool {
        classify(self).is_retryable()
    }
}

impl fmt::Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(status) = self.status {
            write!(f, " (status {})", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for OpError {}

/// Classifies a failure into exactly one [`ErrorKind`].
///
/// Total over all inputs: anything unrecognized falls back to
/// [`ErrorKind::Unknown`]. Checks run in order, message substrings
/// before status codes within each category.
pub fn classify(error: &OpError) -> ErrorKind {
    let message = error.message.to_lowercase();
    let code = error.code.as_deref().unwrap_or("");
    let status = error.status.unwrap_or(0);

    if message.contains("network")
        || message.contains("failed to fetch")
        || code == "ECONNREFUSED"
    {
        return ErrorKind::Network;
    }

    if message.contains("timeout") || message.contains("timed out") || code == "ETIMEDOUT" {
        return ErrorKind::Timeout;
    }

    if status == 429 || message.contains("rate limit") {
        return ErrorKind::RateLimit;
    }

    if status == 404 || message.contains("404") || code == "ERR_MODULE_NOT_FOUND" {
        return ErrorKind::NotFound;
    }

    if status == 401
        || status == 403
        || message.contains("unauthorized")
        || message.contains("forbidden")
    {
        return ErrorKind::Unauthorized;
    }

    if status == 400 || message.contains("validation") {
        return ErrorKind::Validation;
    }

    ErrorKind::Unknown
}

/// Whether a failure is transient and therefore worth retrying.
pub fn is_retryable(error: &OpError) -> bool {
    classify(error).is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_network_errors() {
        assert_eq!(classify(&OpError::new("Failed to fetch")), ErrorKind::Network);
        assert_eq!(classify(&OpError::new("Network error")), ErrorKind::Network);
        assert_eq!(
            classify(&OpError::new("connection refused").with_code("ECONNREFUSED")),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_classify_timeout_errors() {
        assert_eq!(classify(&OpError::new("Request timeout")), ErrorKind::Timeout);
        assert_eq!(
            classify(&OpError::new("Operation timed out").with_code("ETIMEDOUT")),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_classify_rate_limit_errors() {
        assert_eq!(
            classify(&OpError::new("Rate limit exceeded")),
            ErrorKind::RateLimit
        );
        assert_eq!(
            classify(&OpError::new("Too many requests").with_status(429)),
            ErrorKind::RateLimit
        );
    }

    #[test]
    fn test_classify_not_found_errors() {
        assert_eq!(
            classify(&OpError::new("404 Not Found").with_status(404)),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_classify_unauthorized_errors() {
        assert_eq!(
            classify(&OpError::new("Unauthorized").with_status(401)),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            classify(&OpError::new("Forbidden").with_status(403)),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_classify_validation_errors() {
        assert_eq!(
            classify(&OpError::new("Validation failed").with_status(400)),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_classify_unknown_fallback() {
        assert_eq!(classify(&OpError::new("Some random error")), ErrorKind::Unknown);
        assert_eq!(classify(&OpError::new("")), ErrorKind::Unknown);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(is_retryable(&OpError::new("Failed to fetch")));
        assert!(is_retryable(&OpError::new("Request timeout")));
        assert!(is_retryable(&OpError::new("x").with_status(429)));
    }

    #[test]
    fn test_non_retryable_kinds() {
        assert!(!is_retryable(&OpError::new("x").with_status(404)));
        assert!(!is_retryable(&OpError::new("x").with_status(401)));
        assert!(!is_retryable(&OpError::new("x").with_status(400)));
        assert!(!is_retryable(&OpError::new("Some random error")));
    }

    #[test]
    fn test_timed_out_constructor() {
        let err = OpError::timed_out(Duration::from_millis(250));
        assert!(err.message.contains("250ms"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_display_includes_status() {
        let err = OpError::new("Forbidden").with_status(403);
        assert_eq!(err.to_string(), "Forbidden (status 403)");
    }
}
