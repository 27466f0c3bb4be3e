//! Storage layer for basalt
//!
//! This crate implements the row storage the transaction manager works on:
//! - Store: table registry (DashMap by TableId)
//! - Table: rows by position, with residency and logging flags
//! - Row: immutable column values plus an inline version-marker slot
//! - RowAction: per-row version history with its own critical section

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod row;
pub mod row_action;
pub mod store;
pub mod table;

pub use row::Row;
pub use row_action::{ActionEntry, ActionType, DeleteRefusal, MergeOutcome, RowAction};
pub use store::Store;
pub use table::{Table, TableMeta, TableType};
