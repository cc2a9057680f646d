//! Domain error types
//!
//! This module defines error types specific to domain operations
//! (validation of identifiers, timestamps and task payloads) and the
//! synchronization error taxonomy shared by the worker, the reconciler
//! and the transport adapter.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Timestamp that cannot be interpreted as an instant
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid poll watermark
    #[error("Invalid watermark: {0}")]
    InvalidWatermark(String),

    /// A sync task was built with a payload that does not match its kind
    #[error("Invalid task payload for {kind}: {reason}")]
    InvalidTaskPayload {
        /// The request kind of the task
        kind: String,
        /// Why the payload was rejected
        reason: String,
    },

    /// Unknown request kind name (e.g. read back from the outbox)
    #[error("Unknown request kind: {0}")]
    UnknownRequestKind(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// Transport errors
// ============================================================================

/// Failures reported by a [`ITransport`](crate::ports::ITransport) implementation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server could not be reached (DNS, connection refused, reset...)
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// The server answered with a non-success status code
    #[error("Server returned status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, kept for logging
        body: String,
    },

    /// The request did not complete within the transport timeout
    #[error("Request timed out")]
    Timeout,
}

impl TransportError {
    /// Whether a later attempt of the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Unreachable(_) | TransportError::Timeout => true,
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

// ============================================================================
// Sync error taxonomy
// ============================================================================

/// Error taxonomy of the synchronization core
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network unreachable, non-success status or transport timeout
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The worker gave up waiting for a task to complete
    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    /// A poll response could not be parsed at all
    #[error("Parse error: {0}")]
    Parse(String),

    /// An event name outside the classifier's known set
    #[error("Unknown attribute value: {0}")]
    UnknownAttribute(String),

    /// The local store or outbox adapter failed
    #[error("Local store error: {0}")]
    Store(String),

    /// A domain-level validation error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SyncError {
    /// Wraps an adapter error (anyhow chain) as a store failure
    pub fn store(err: anyhow::Error) -> Self {
        SyncError::Store(format!("{err:#}"))
    }

    /// Whether the failed task should be retried with backoff
    ///
    /// Retryable failures are transient transport errors (unreachable,
    /// timeout, 429, 5xx), worker timeouts and store failures. Parse,
    /// unknown attribute and domain errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(e) => e.is_transient(),
            SyncError::Timeout(_) | SyncError::Store(_) => true,
            SyncError::Parse(_) | SyncError::UnknownAttribute(_) | SyncError::Domain(_) => false,
        }
    }

    /// Short label used for metrics and structured logs
    pub fn label(&self) -> &'static str {
        match self {
            SyncError::Transport(_) => "transport",
            SyncError::Timeout(_) => "timeout",
            SyncError::Parse(_) => "parse",
            SyncError::UnknownAttribute(_) => "unknown_attribute",
            SyncError::Store(_) => "store",
            SyncError::Domain(_) => "domain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidWatermark("empty".to_string());
        assert_eq!(err.to_string(), "Invalid watermark: empty");

        let err = DomainError::InvalidTaskPayload {
            kind: "Upload".to_string(),
            reason: "payload required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid task payload for Upload: payload required"
        );

        let err = SyncError::from(TransportError::Status {
            status: 503,
            body: String::new(),
        });
        assert_eq!(err.to_string(), "Transport error: Server returned status 503");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidId("x".to_string());
        let err2 = DomainError::InvalidId("x".to_string());
        let err3 = DomainError::InvalidId("y".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_transport_transient_classification() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Unreachable("refused".into()).is_transient());
        assert!(TransportError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(TransportError::Status {
            status: 502,
            body: String::new()
        }
        .is_transient());
        assert!(!TransportError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
    }

    #[test]
    fn test_sync_error_retryable() {
        assert!(SyncError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(SyncError::Store("busy".into()).is_retryable());
        assert!(!SyncError::Parse("bad json".into()).is_retryable());
        assert!(!SyncError::UnknownAttribute("Yoga".into()).is_retryable());
        assert!(!SyncError::Domain(DomainError::InvalidId("x".into())).is_retryable());
        assert!(!SyncError::Transport(TransportError::Status {
            status: 404,
            body: String::new()
        })
        .is_retryable());
    }

    #[test]
    fn test_sync_error_label() {
        assert_eq!(SyncError::Parse("x".into()).label(), "parse");
        assert_eq!(SyncError::from(TransportError::Timeout).label(), "transport");
    }
}
