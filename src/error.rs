//! Unified error types for Basalt.
//!
//! This module provides a clean error type that wraps internal errors
//! and presents a consistent interface to users.

use thiserror::Error;

/// All Basalt errors.
///
/// This is the canonical error type for all public operations. It hides
/// internal error details behind stable categories.
#[derive(Debug, Error)]
pub enum Error {
    /// A concurrent transaction committed a conflicting change; the
    /// transaction was rolled back or must be
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    /// Waiting would have deadlocked
    #[error("deadlock: {0}")]
    Deadlock(String),

    /// Gave up waiting for another session
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// Table or row not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Name already taken
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Operation not allowed in the current transaction state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid input or API misuse
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Redo log failure
    #[error("log error: {0}")]
    Logging(String),

    /// Configuration could not be parsed
    #[error("config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Basalt operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Running the whole transaction again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SerializationFailure(_) | Error::Deadlock(_) | Error::LockTimeout(_)
        )
    }

    /// Check if this is a serialization failure.
    pub fn is_serialization_failure(&self) -> bool {
        matches!(self, Error::SerializationFailure(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Logging(_))
    }
}

// Convert from internal core errors
impl From<basalt_core::Error> for Error {
    fn from(e: basalt_core::Error) -> Self {
        use basalt_core::Error as CoreError;
        match e {
            CoreError::SerializationFailure { reason } => Error::SerializationFailure(reason),
            CoreError::InvalidTransactionState(msg) => Error::InvalidState(msg),
            CoreError::DeadlockRefused { session } => {
                Error::Deadlock(format!("wait refused for {}", session))
            }
            CoreError::LockTimeout { session, waited_ms } => {
                Error::LockTimeout(format!("{} waited {}ms", session, waited_ms))
            }
            CoreError::TableNotFound(name) => Error::NotFound(format!("table {}", name)),
            CoreError::TableExists(name) => Error::AlreadyExists(format!("table {}", name)),
            CoreError::RowNotFound(key) => Error::NotFound(format!("row {}", key)),
            CoreError::Logging(msg) => Error::Logging(msg),
            CoreError::InvalidOperation(msg) => Error::ConstraintViolation(msg),
            CoreError::Config(msg) => Error::Config(msg),
            CoreError::Io(io_err) => Error::Io(io_err),
            CoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}
