//! Internal error type shared by all crates
//!
//! Conflicts detected by the transaction manager come in two shapes:
//! - serialization failures, surfaced as [`Error::SerializationFailure`]
//! - redo requests, which are NOT errors and travel as a session flag
//!
//! Deadlock refusal is a boolean inside the lock coordinator and only becomes
//! [`Error::DeadlockRefused`] at the statement boundary.

use crate::types::{RowKey, SessionId};
use thiserror::Error;

/// Errors raised by the storage and transaction layers
#[derive(Debug, Error)]
pub enum Error {
    /// A concurrent committed write invalidated this transaction
    #[error("serialization failure: {reason}")]
    SerializationFailure {
        /// What conflicted
        reason: String,
    },

    /// Operation not allowed in the current transaction state
    #[error("invalid transaction state: {0}")]
    InvalidTransactionState(String),

    /// Waiting for the requested lock would close a cycle in the wait graph
    #[error("deadlock refused for {session}")]
    DeadlockRefused {
        /// Session whose wait was refused
        session: SessionId,
    },

    /// Gave up waiting for a lock
    #[error("lock wait timeout for {session} after {waited_ms}ms")]
    LockTimeout {
        /// Session that timed out
        session: SessionId,
        /// How long it waited
        waited_ms: u64,
    },

    /// Table does not exist
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Table name already taken
    #[error("table already exists: {0}")]
    TableExists(String),

    /// Row does not exist (or is not visible)
    #[error("row not found: {0}")]
    RowNotFound(RowKey),

    /// The redo log refused a commit record
    #[error("log error: {0}")]
    Logging(String),

    /// Invalid argument or misuse of an API
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be parsed
    #[error("config error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation (bug)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for internal operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a serialization failure
    pub fn serialization(reason: impl Into<String>) -> Self {
        Error::SerializationFailure {
            reason: reason.into(),
        }
    }

    /// Check if this is a serialization failure
    pub fn is_serialization_failure(&self) -> bool {
        matches!(self, Error::SerializationFailure { .. })
    }

    /// Check if retrying the whole transaction may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SerializationFailure { .. }
                | Error::DeadlockRefused { .. }
                | Error::LockTimeout { .. }
        )
    }
}
