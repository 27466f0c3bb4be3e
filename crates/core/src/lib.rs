//! Core types for the basalt storage engine
//!
//! This crate defines the vocabulary shared by every other crate:
//! - [`types`]: timestamps, session/table/row identifiers, isolation levels
//! - [`value`]: column values carried by rows
//! - [`error`]: the internal error type and `Result` alias

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use types::{
    IsolationLevel, RowKey, RowPosition, SessionId, TableId, Timestamp, TransactionControl,
};
pub use value::Value;
