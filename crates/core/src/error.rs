//! Error classification shared by every component.
//!
//! Each component owns a closed error enum. They all report one of a handful of
//! [`ErrorKind`]s so callers can branch on the kind without matching every
//! variant of every enum.

use thiserror::Error;

/// Result type for persistence-port calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse category of a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-fixable input problem (bad amounts, unbalanced lines, duplicates).
    Validation,
    /// Business-rule violation against current state (stock, payments, status).
    StateConflict,
    /// Transient optimistic-lock failure; safe to retry.
    Concurrency,
    /// Persistence layer unavailable; propagated unchanged.
    Fatal,
    /// The caller cancelled the operation before it committed.
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        self == ErrorKind::Concurrency
    }
}

/// Implemented by every error enum in the workspace.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Failure reported by the persistence port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row read by the unit changed before commit, or a unique key was taken
    /// by a concurrent commit.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The store cannot be reached (or its state is poisoned).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Conflict(_) => ErrorKind::Concurrency,
            StoreError::Unavailable(_) => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(StoreError::conflict("account 1").kind().is_retryable());
        assert!(!StoreError::unavailable("down").kind().is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
    }
}
