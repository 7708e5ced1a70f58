//! Error types for PolyKV
//!
//! Provides a unified error type shared by every backend adapter.
//! `NotFound` is the only variant callers are expected to branch on;
//! everything else propagates as-is.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for PolyKV operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("key not found")]
    NotFound,

    // -------------------------------------------------------------------------
    // Cancellation Errors
    // -------------------------------------------------------------------------
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    // -------------------------------------------------------------------------
    // Protocol Violations
    // -------------------------------------------------------------------------
    #[error("batch already committed")]
    BatchCommitted,

    #[error("store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("backend error: {0}")]
    Backend(String),

    #[error("close failed: {}", .0.join("; "))]
    CloseFailed(Vec<String>),
}

impl StoreError {
    /// True when the error means the key is absent, as opposed to the
    /// store being broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    /// True for context-derived failures (cancellation or deadline).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_failed_joins_all_causes() {
        let err = StoreError::CloseFailed(vec!["flush failed".into(), "fsync failed".into()]);
        let display = format!("{}", err);
        assert!(display.contains("flush failed"));
        assert!(display.contains("fsync failed"));
    }

    #[test]
    fn test_not_found_is_distinguishable() {
        assert!(StoreError::NotFound.is_not_found());
        assert!(!StoreError::Backend("io".into()).is_not_found());
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(StoreError::Cancelled.is_cancellation());
        assert!(StoreError::DeadlineExceeded.is_cancellation());
        assert!(!StoreError::NotFound.is_cancellation());
    }
}
