//! Task disposition vocabulary for the deferred-retry dispatch.
//!
//! The dispatcher makes exactly one distinction when a table handler
//! returns: the entry was consumed, or it stays at the head of its
//! queue for a later pass. Route-level operations add one more axis on
//! failure: a transient condition worth retrying, a fatal HAL status
//! that takes the process down, or an invalid request that is logged
//! and dropped. Nothing else is ever branched on, so nothing else is
//! modeled.

use thiserror::Error;

/// Disposition of one table entry after a handler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The entry was consumed: applied, absorbed as a duplicate, or
    /// rejected as invalid. It never comes back.
    Handled,
    /// A dependency is missing (group not yet configured, route
    /// migration still in flight); the entry stays at the head of its
    /// queue and is re-examined on a later pass.
    Retry,
}

impl TaskStatus {
    /// Returns true if the entry was consumed.
    pub fn is_handled(&self) -> bool {
        matches!(self, TaskStatus::Handled)
    }

    /// Returns true if the entry must be re-queued head-of-line.
    pub fn needs_retry(&self) -> bool {
        matches!(self, TaskStatus::Retry)
    }
}

/// Failure of a route-level operation.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Transient condition: an unresolved dependency or HAL resource
    /// pressure. The operation may succeed on a later pass with no
    /// state change required in between.
    #[error("retry needed: {reason}")]
    Retry { reason: String },

    /// Non-transient HAL failure, classified fatal by the platform
    /// status handler; propagated up to process-level failure.
    #[error("HAL failure: {message}")]
    HalFailure { message: String },

    /// The request or the manager's own bookkeeping is invalid for this
    /// operation; the entry is logged and dropped.
    #[error("invalid operation: {message}")]
    Invalid { message: String },
}

impl TaskError {
    /// Creates a transient, retryable error.
    pub fn retry(reason: impl Into<String>) -> Self {
        TaskError::Retry {
            reason: reason.into(),
        }
    }

    /// Creates a fatal HAL error.
    pub fn hal_failure(message: impl Into<String>) -> Self {
        TaskError::HalFailure {
            message: message.into(),
        }
    }

    /// Creates an invalid-operation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        TaskError::Invalid {
            message: message.into(),
        }
    }

    /// How the enclosing table entry should be dispositioned.
    ///
    /// Only transient errors keep the entry alive; a fatal HAL failure
    /// is surfaced out-of-band by the dispatcher and an invalid request
    /// is dropped, so both consume the entry.
    pub fn to_status(&self) -> TaskStatus {
        match self {
            TaskError::Retry { .. } => TaskStatus::Retry,
            TaskError::HalFailure { .. } | TaskError::Invalid { .. } => TaskStatus::Handled,
        }
    }
}

/// Result type for route-level operations.
pub type TaskResult<T> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_defers_the_entry() {
        let err = TaskError::retry("FG_NHG fgnhg_v4 not received yet");
        assert_eq!(err.to_status(), TaskStatus::Retry);
        assert!(err.to_status().needs_retry());
        assert!(!err.to_status().is_handled());
    }

    #[test]
    fn test_invalid_request_is_consumed_not_retried() {
        // A zero bucket_size or a member on a prefix-based group is
        // rejected once; re-running it would reject it forever
        let err = TaskError::invalid("bucket_size of 0 for fgnhg_v4");
        assert_eq!(err.to_status(), TaskStatus::Handled);
        assert!(!err.to_status().needs_retry());
    }

    #[test]
    fn test_fatal_hal_failure_consumes_the_entry() {
        // The dispatcher stops the process instead of spinning on the
        // same doomed HAL call
        let err = TaskError::hal_failure("SAI_STATUS_FAILURE on member create");
        assert_eq!(err.to_status(), TaskStatus::Handled);
    }
}
