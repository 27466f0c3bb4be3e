//! Record framing
//!
//! Each record is stored as:
//!
//! ```text
//! [len: u32 LE][crc32: u32 LE][bincode payload: len bytes]
//! ```
//!
//! The checksum covers the payload only.

use crate::record::LogRecord;
use basalt_core::{Error, Result};
use tracing::warn;

const HEADER_LEN: usize = 8;

/// Encode one record into a frame
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)
        .map_err(|e| Error::Logging(format!("encode failed: {}", e)))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::Logging(format!("record too large: {} bytes", payload.len())))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode the frame at the start of `buf`
///
/// Returns the record and the number of bytes consumed.
pub fn decode_record(buf: &[u8]) -> Result<(LogRecord, usize)> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Logging(format!(
            "incomplete header: have {} bytes",
            buf.len()
        )));
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);

    let end = HEADER_LEN + len;
    if buf.len() < end {
        return Err(Error::Logging(format!(
            "incomplete record: need {} bytes, have {}",
            end,
            buf.len()
        )));
    }
    let payload = &buf[HEADER_LEN..end];
    if crc32fast::hash(payload) != crc {
        warn!(expected = crc, len, "log record checksum mismatch");
        return Err(Error::Logging("checksum mismatch".to_string()));
    }
    let record = bincode::deserialize(payload)
        .map_err(|e| Error::Logging(format!("decode failed: {}", e)))?;
    Ok((record, end))
}
