//! Global logical clock
//!
//! Every state-changing event draws a fresh value: transaction begin,
//! statement begin, commit and rollback. Values are unique and strictly
//! increasing across all callers.

use basalt_core::types::MAX_TIMESTAMP;
use basalt_core::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic change counter
#[derive(Debug)]
pub struct GlobalClock {
    counter: AtomicU64,
}

impl GlobalClock {
    /// Create a clock whose next value is `start + 1`
    pub fn new(start: Timestamp) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Draw the next timestamp
    #[inline]
    pub fn next_change_timestamp(&self) -> Timestamp {
        let ts = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(ts <= MAX_TIMESTAMP, "timestamp overflowed 63 bits");
        ts
    }

    /// Most recently drawn timestamp
    #[inline]
    pub fn current(&self) -> Timestamp {
        self.counter.load(Ordering::Acquire)
    }
}

impl Default for GlobalClock {
    fn default() -> Self {
        Self::new(0)
    }
}
