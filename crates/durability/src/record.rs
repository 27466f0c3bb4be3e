//! Redo log record types
//!
//! This module defines the records the transaction manager hands to the
//! redo log at commit time:
//! - Insert: a row that became visible
//! - Delete: a row that was removed
//! - Commit: successful transaction completion
//! - Rollback: transaction discarded
//!
//! Every record carries the session that produced it, so a log can be
//! filtered per session when replayed.

use basalt_core::{RowKey, SessionId, Timestamp, Value};
use serde::{Deserialize, Serialize};

/// One redo log record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LogRecord {
    /// Row inserted by a committed transaction
    Insert {
        /// Session that inserted the row
        session: SessionId,
        /// Row identity
        key: RowKey,
        /// Column values
        values: Vec<Value>,
    },

    /// Row deleted by a committed transaction
    Delete {
        /// Session that deleted the row
        session: SessionId,
        /// Row identity
        key: RowKey,
    },

    /// Commit marker
    ///
    /// All Insert/Delete records of the session before this marker are durable.
    Commit {
        /// Session that committed
        session: SessionId,
        /// Logical commit timestamp
        commit_timestamp: Timestamp,
        /// Wall-clock time of the commit (unix seconds)
        wall_clock: i64,
    },

    /// Rollback marker
    Rollback {
        /// Session that rolled back
        session: SessionId,
    },
}

impl LogRecord {
    /// Session that produced the record
    pub fn session(&self) -> SessionId {
        match self {
            LogRecord::Insert { session, .. }
            | LogRecord::Delete { session, .. }
            | LogRecord::Commit { session, .. }
            | LogRecord::Rollback { session } => *session,
        }
    }

    /// Row identity for row-level records
    pub fn row_key(&self) -> Option<RowKey> {
        match self {
            LogRecord::Insert { key, .. } | LogRecord::Delete { key, .. } => Some(*key),
            _ => None,
        }
    }

    /// Check if the record ends a transaction
    pub fn is_txn_boundary(&self) -> bool {
        matches!(self, LogRecord::Commit { .. } | LogRecord::Rollback { .. })
    }
}
