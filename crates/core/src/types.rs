//! Core types for the storage engine
//!
//! This module defines the fundamental identifiers used throughout the system:
//! - [`Timestamp`]: logical time drawn from the global clock
//! - [`SessionId`]: identity of a connected session
//! - [`TableId`] / [`RowPosition`] / [`RowKey`]: persistent row identity
//! - [`IsolationLevel`] and [`TransactionControl`]: concurrency settings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical timestamp drawn from the global clock
///
/// Timestamps are 63-bit, strictly increasing and never shared between two
/// events. They order both transaction starts and commits.
pub type Timestamp = u64;

/// Largest value a timestamp may take (63 bits)
pub const MAX_TIMESTAMP: Timestamp = i64::MAX as u64;

/// Unique identifier for a session
///
/// Sessions are the unit of transactional work: one thread drives one
/// session, and every row change is owned by exactly one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw session number
    pub const fn new(id: u64) -> Self {
        SessionId(id)
    }

    /// Raw session number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Identifier of a table within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(u32);

impl TableId {
    /// Wrap a raw table number
    pub const fn new(id: u32) -> Self {
        TableId(id)
    }

    /// Raw table number
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table-{}", self.0)
    }
}

/// Storage position of a row inside its table
///
/// Positions are allocated once and never reused while the table exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowPosition(u64);

impl RowPosition {
    /// Wrap a raw position
    pub const fn new(pos: u64) -> Self {
        RowPosition(pos)
    }

    /// Raw position
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent identity of a row: table plus position
///
/// Used as the key of the global row-version map for disk-resident tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    /// Owning table
    pub table: TableId,
    /// Position within the table
    pub position: RowPosition,
}

impl RowKey {
    /// Create a row key
    pub const fn new(table: TableId, position: RowPosition) -> Self {
        Self { table, position }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.table, self.position)
    }
}

/// Transaction isolation level
///
/// Decides which timestamp bounds a session's snapshot:
/// - `ReadCommitted`: the current statement's action timestamp
/// - `RepeatableRead` / `Serializable`: the transaction start timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Each statement sees everything committed before it started
    #[default]
    ReadCommitted,
    /// The whole transaction sees one snapshot
    RepeatableRead,
    /// Snapshot plus commit-time validation of inspected rows
    Serializable,
}

impl IsolationLevel {
    /// Whether the snapshot is fixed for the whole transaction
    ///
    /// Row conflicts under these levels raise a serialization failure
    /// instead of asking the statement to redo.
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable
        )
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        f.write_str(name)
    }
}

/// Concurrency strategy of the whole transaction manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionControl {
    /// Multi-version rows, catalog lock only
    #[default]
    Mvcc,
    /// Multi-version rows plus two-phase table locks
    Locks,
}

impl fmt::Display for TransactionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionControl::Mvcc => f.write_str("MVCC"),
            TransactionControl::Locks => f.write_str("LOCKS"),
        }
    }
}
