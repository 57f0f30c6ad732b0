// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crate-wide error taxonomy.
//!
//! One `thiserror` enum, shared by storage, dispatch, and the job manager,
//! so callers can match on a stable set of kinds instead of parsing
//! strings. Lower layers wrap into this via `#[from]`/`.into()`; they never
//! collapse to a stringly-typed catch-all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("unknown worker type: {0}")]
    UnknownWorker(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal panic recovered: {0}")]
    Panic(String),
}

impl CoreError {
    /// Whether this error should be treated as transient and retried by
    /// a caller that chooses to retry (the storage manager's atomic
    /// read-modify-write primitive uses this to decide whether to loop).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StorageFailure(_) | CoreError::Timeout(_))
    }

    pub fn cancelled() -> Self {
        CoreError::Cancelled
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failure_is_retryable() {
        assert!(CoreError::StorageFailure("disk full".into()).is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        assert!(!CoreError::NotFound("doc_x".into()).is_retryable());
    }

    #[test]
    fn display_includes_message() {
        let err = CoreError::UnknownWorker("rating_xyz".into());
        assert_eq!(err.to_string(), "unknown worker type: rating_xyz");
    }
}
