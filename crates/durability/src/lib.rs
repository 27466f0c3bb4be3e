//! Durability boundary for basalt
//!
//! This crate defines what the transaction manager hands to persistence:
//! - LogRecord types: Insert, Delete, Commit, Rollback
//! - Record framing with CRC32 checksums
//! - RedoLog trait with null and in-memory implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod log;
pub mod record;

pub use encoding::{decode_record, encode_record};
pub use log::{MemoryLog, NullLog, RedoLog};
pub use record::LogRecord;
