//! SAI error types, status handling and the task-status classifier.

use std::fmt;
use thiserror::Error;

/// SAI status codes matching the SAI C API.
///
/// These values correspond to `sai_status_t` in the SAI header files.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InsufficientResources = -4,
    InvalidParameter = -5,
    ItemAlreadyExists = -6,
    ItemNotFound = -7,
    Uninitialized = -12,
    TableFull = -13,
    NotImplemented = -15,
    ObjectInUse = -17,
    NotExecuted = -23,
}

impl SaiStatus {
    /// Creates a SaiStatus from a raw i32 value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SaiStatus::Success,
            -2 => SaiStatus::NotSupported,
            -3 => SaiStatus::NoMemory,
            -4 => SaiStatus::InsufficientResources,
            -5 => SaiStatus::InvalidParameter,
            -6 => SaiStatus::ItemAlreadyExists,
            -7 => SaiStatus::ItemNotFound,
            -12 => SaiStatus::Uninitialized,
            -13 => SaiStatus::TableFull,
            -15 => SaiStatus::NotImplemented,
            -17 => SaiStatus::ObjectInUse,
            -23 => SaiStatus::NotExecuted,
            _ => SaiStatus::Failure,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> SaiResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SaiError::from_status(self))
        }
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Success => "SAI_STATUS_SUCCESS",
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::NotSupported => "SAI_STATUS_NOT_SUPPORTED",
            SaiStatus::NoMemory => "SAI_STATUS_NO_MEMORY",
            SaiStatus::InsufficientResources => "SAI_STATUS_INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::Uninitialized => "SAI_STATUS_UNINITIALIZED",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::NotImplemented => "SAI_STATUS_NOT_IMPLEMENTED",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
            SaiStatus::NotExecuted => "SAI_STATUS_NOT_EXECUTED",
        };
        write!(f, "{}", s)
    }
}

/// Error type for SAI operations.
#[derive(Debug, Clone, Error)]
pub enum SaiError {
    /// SAI API returned an error status.
    #[error("SAI operation failed: {status}")]
    Status { status: SaiStatus },

    /// The requested feature is not supported by the SAI implementation.
    #[error("Feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Invalid parameter passed to SAI API.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The requested item was not found.
    #[error("Item not found: {item}")]
    NotFound { item: String },

    /// The item already exists.
    #[error("Item already exists: {item}")]
    AlreadyExists { item: String },

    /// Hardware table is full.
    #[error("Table full: {table}")]
    TableFull { table: String },

    /// Object is in use and cannot be removed.
    #[error("Object in use: {object}")]
    ObjectInUse { object: String },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SaiError {
    /// Creates an error from a SAI status code.
    pub fn from_status(status: SaiStatus) -> Self {
        match status {
            SaiStatus::Success => SaiError::Internal {
                message: "from_status called with success status".to_string(),
            },
            SaiStatus::NotSupported | SaiStatus::NotImplemented => SaiError::NotSupported {
                feature: "unknown".to_string(),
            },
            SaiStatus::InvalidParameter => SaiError::InvalidParameter {
                message: format!("SAI returned {}", status),
            },
            SaiStatus::ItemNotFound => SaiError::NotFound {
                item: "unknown".to_string(),
            },
            SaiStatus::ItemAlreadyExists => SaiError::AlreadyExists {
                item: "unknown".to_string(),
            },
            SaiStatus::TableFull => SaiError::TableFull {
                table: "unknown".to_string(),
            },
            SaiStatus::ObjectInUse => SaiError::ObjectInUse {
                object: "unknown".to_string(),
            },
            _ => SaiError::Status { status },
        }
    }

    /// Creates a not supported error with a feature description.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        SaiError::NotSupported {
            feature: feature.into(),
        }
    }

    /// Creates an invalid parameter error with a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates a not found error with an item description.
    pub fn not_found(item: impl Into<String>) -> Self {
        SaiError::NotFound { item: item.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(item: impl Into<String>) -> Self {
        SaiError::AlreadyExists { item: item.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SaiError::Internal {
            message: message.into(),
        }
    }

    /// Returns the underlying SAI status if this is a Status error.
    pub fn status(&self) -> Option<SaiStatus> {
        match self {
            SaiError::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this error is transient and worth a later retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SaiError::TableFull { .. }
                | SaiError::ObjectInUse { .. }
                | SaiError::Status {
                    status: SaiStatus::InsufficientResources
                        | SaiStatus::NoMemory
                        | SaiStatus::NotExecuted
                }
        )
    }
}

/// Result type for SAI operations.
pub type SaiResult<T> = Result<T, SaiError>;

/// Outcome of classifying a failed SAI call, mirroring the vendor
/// status handlers (`task_process_status` in the C++ orchagent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// The operation succeeded (or the failure may be ignored).
    TaskSuccess,
    /// Transient failure: fail the enclosing operation, retry later.
    TaskNeedRetry,
    /// Fatal failure: propagate to process-level failure.
    TaskFailed,
}

impl HandleStatus {
    /// Returns true if the enclosing operation may continue.
    pub fn is_success(&self) -> bool {
        matches!(self, HandleStatus::TaskSuccess)
    }
}

/// Classifies a SAI error into a task status.
///
/// Transient resource errors map to retry; everything else is fatal.
pub fn handle_sai_status(err: &SaiError) -> HandleStatus {
    if err.is_retryable() {
        HandleStatus::TaskNeedRetry
    } else {
        HandleStatus::TaskFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_into_result() {
        assert!(SaiStatus::Success.into_result().is_ok());
        assert!(SaiStatus::Failure.into_result().is_err());
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(SaiStatus::from_raw(0), SaiStatus::Success);
        assert_eq!(SaiStatus::from_raw(-7), SaiStatus::ItemNotFound);
        assert_eq!(SaiStatus::from_raw(-999), SaiStatus::Failure);
    }

    #[test]
    fn test_error_from_status() {
        let err = SaiError::from_status(SaiStatus::ItemNotFound);
        assert!(matches!(err, SaiError::NotFound { .. }));

        let err = SaiError::from_status(SaiStatus::TableFull);
        assert!(matches!(err, SaiError::TableFull { .. }));
    }

    #[test]
    fn test_classifier() {
        let transient = SaiError::from_status(SaiStatus::InsufficientResources);
        assert_eq!(handle_sai_status(&transient), HandleStatus::TaskNeedRetry);

        let fatal = SaiError::from_status(SaiStatus::Failure);
        assert_eq!(handle_sai_status(&fatal), HandleStatus::TaskFailed);
        assert!(!handle_sai_status(&fatal).is_success());
    }
}
