//! Error types for locbroker.
//!
//! Broker operations favor silent idempotence: duplicate adds and removals of
//! absent subscribers are no-ops, not errors. The types here cover what is
//! left: identifier validation and talking to the worker thread.

use thiserror::Error;

/// Validation errors for identifiers handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Identifier '{field}' cannot be empty")]
    EmptyIdentifier {
        field: &'static str,
    },

    #[error("Identifier '{value}' for {field} must be an ASCII letter or underscore followed by letters, digits or underscores")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
    },

    #[error("Namespaced region identifier '{value}' is malformed: {reason}")]
    MalformedNamespacedId {
        value: String,
        reason: &'static str,
    },
}

/// Errors raised while interacting with the broker's serial worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Broker worker disconnected ({path})")]
    Disconnected {
        path: &'static str,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Shared broker has not been configured")]
    SharedNotConfigured,
}

/// Top-level error type for locbroker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl BrokerError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Timeout { .. }))
    }
}

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identifier_message() {
        let err = ValidationError::InvalidIdentifier {
            field: "subscriber_identifier",
            value: "9lives".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("9lives"));
        assert!(msg.contains("subscriber_identifier"));
    }

    #[test]
    fn test_timeout_message() {
        let err = ExecutionError::Timeout { duration_ms: 250 };
        assert!(format!("{err}").contains("250ms"));
    }

    #[test]
    fn test_broker_error_from_validation() {
        let err: BrokerError = ValidationError::EmptyIdentifier { field: "region" }.into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_broker_error_retryable() {
        let timeout: BrokerError = ExecutionError::Timeout { duration_ms: 10 }.into();
        assert!(timeout.is_execution());
        assert!(timeout.is_retryable());

        let gone: BrokerError = ExecutionError::Disconnected { path: "control" }.into();
        assert!(!gone.is_retryable());
    }
}
