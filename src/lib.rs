//! # Basalt
//!
//! Embedded relational storage core with multi-version concurrency control.
//!
//! Basalt keeps rows in memory-resident or cached tables and lets many
//! sessions read and change them concurrently. Every row change is versioned;
//! each session sees a consistent snapshot chosen by its isolation level, and
//! conflicting writers are resolved first-committer-wins.
//!
//! ## Quick Start
//!
//! ```ignore
//! use basalt::prelude::*;
//!
//! let db = Database::ephemeral();
//! let mut conn = db.connect();
//! conn.create_table("accounts", TableType::Memory)?;
//!
//! // Autocommit: each statement is its own transaction
//! let key = conn.insert("accounts", vec![Value::Int(1), Value::Int(100)])?;
//!
//! // Explicit transaction with a savepoint
//! conn.set_autocommit(false)?;
//! conn.savepoint("before_delete");
//! conn.delete("accounts", key)?;
//! conn.rollback_to_savepoint("before_delete")?;
//! conn.commit()?;
//! ```
//!
//! ## Isolation
//!
//! - READ COMMITTED (default): each statement sees rows committed before it
//!   started; conflicting deletes are redone transparently
//! - REPEATABLE READ: the whole transaction sees one snapshot; conflicts fail
//!   with [`Error::SerializationFailure`]
//! - SERIALIZABLE: as REPEATABLE READ, and a committed write to a row this
//!   transaction read also fails it
//!
//! ## Crates
//!
//! - `basalt-core` - identifiers, values, isolation levels, internal errors
//! - `basalt-storage` - tables, rows and row version markers
//! - `basalt-durability` - redo log boundary
//! - `basalt-concurrency` - the transaction manager

#![warn(missing_docs)]

mod connection;
mod database;
mod error;

pub mod prelude;

// Re-export main entry points
pub use connection::Connection;
pub use database::{Database, DatabaseBuilder, DatabaseMetrics};
pub use error::{Error, Result};

// Re-export types
pub use basalt_concurrency::{
    DegradedEvent, DegradedKind, TransactionConfig, TransactionManager, TransactionMetrics,
};
pub use basalt_core::{
    IsolationLevel, RowKey, RowPosition, SessionId, TableId, Timestamp, TransactionControl, Value,
};
pub use basalt_durability::{LogRecord, MemoryLog, NullLog, RedoLog};
pub use basalt_storage::{TableMeta, TableType};
