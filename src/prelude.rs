//! Convenient imports for Basalt.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use basalt::prelude::*;
//!
//! let db = Database::ephemeral();
//! let conn = db.connect();
//! conn.create_table("t", TableType::Memory)?;
//! ```

// Main entry point
pub use crate::connection::Connection;
pub use crate::database::{Database, DatabaseBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use basalt_core::{IsolationLevel, RowKey, TransactionControl, Value};

// Table types
pub use basalt_storage::{TableMeta, TableType};
