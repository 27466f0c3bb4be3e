//! Redo log boundary
//!
//! The transaction manager writes to an abstract [`RedoLog`] after commit
//! validation and before releasing the committed versions. Two
//! implementations ship with the crate:
//!
//! - [`NullLog`]: discards everything (ephemeral databases, temp tables)
//! - [`MemoryLog`]: keeps framed records in memory, for tests and for
//!   embedding into a host that owns persistence
//!
//! No file format is defined here; a host owning persistence implements the trait.

use crate::encoding::{decode_record, encode_record};
use crate::record::LogRecord;
use basalt_core::{Result, SessionId, Timestamp};
use basalt_storage::Row;
use parking_lot::Mutex;

/// Write-ahead logger invoked by the commit protocol
///
/// Row-level writes are best effort: the manager records a failure and
/// carries on. A failed commit write refuses the commit.
pub trait RedoLog: Send + Sync {
    /// Log a row made visible by a commit
    fn write_insert_statement(&self, session: SessionId, row: &Row) -> Result<()>;

    /// Log a row deleted by a commit
    fn write_delete_statement(&self, session: SessionId, row: &Row) -> Result<()>;

    /// Log the commit marker
    fn write_commit_statement(&self, session: SessionId, commit_timestamp: Timestamp)
        -> Result<()>;

    /// Log a rollback marker
    fn write_rollback_statement(&self, _session: SessionId) -> Result<()> {
        Ok(())
    }
}

/// Logger that discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl RedoLog for NullLog {
    fn write_insert_statement(&self, _session: SessionId, _row: &Row) -> Result<()> {
        Ok(())
    }

    fn write_delete_statement(&self, _session: SessionId, _row: &Row) -> Result<()> {
        Ok(())
    }

    fn write_commit_statement(&self, _session: SessionId, _ts: Timestamp) -> Result<()> {
        Ok(())
    }
}

/// Logger that keeps framed records in a memory buffer
#[derive(Debug, Default)]
pub struct MemoryLog {
    buf: Mutex<Vec<u8>>,
}

impl MemoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, record: &LogRecord) -> Result<()> {
        let frame = encode_record(record)?;
        self.buf.lock().extend_from_slice(&frame);
        Ok(())
    }

    /// Size of the log in bytes
    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    /// Check if nothing was logged
    pub fn is_empty(&self) -> bool {
        self.buf.lock().is_empty()
    }

    /// Decode every record in append order
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        let buf = self.buf.lock();
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let (record, used) = decode_record(&buf[offset..])?;
            records.push(record);
            offset += used;
        }
        Ok(records)
    }
}

impl RedoLog for MemoryLog {
    fn write_insert_statement(&self, session: SessionId, row: &Row) -> Result<()> {
        self.append(&LogRecord::Insert {
            session,
            key: row.key(),
            values: row.values().to_vec(),
        })
    }

    fn write_delete_statement(&self, session: SessionId, row: &Row) -> Result<()> {
        self.append(&LogRecord::Delete {
            session,
            key: row.key(),
        })
    }

    fn write_commit_statement(&self, session: SessionId, commit_timestamp: Timestamp) -> Result<()> {
        self.append(&LogRecord::Commit {
            session,
            commit_timestamp,
            wall_clock: chrono::Utc::now().timestamp(),
        })
    }

    fn write_rollback_statement(&self, session: SessionId) -> Result<()> {
        self.append(&LogRecord::Rollback { session })
    }
}
