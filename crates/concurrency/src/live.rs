//! Live transaction registry
//!
//! Start timestamps of every transaction between begin and end. Timestamps
//! are drawn under the manager lock and pushed in order, so the deque stays
//! sorted and the oldest snapshot is always at the front.

use basalt_core::Timestamp;
use std::collections::VecDeque;

/// Ordered multiset of live transaction start timestamps
#[derive(Debug, Default)]
pub struct LiveTransactions {
    timestamps: VecDeque<Timestamp>,
}

impl LiveTransactions {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transaction start
    pub fn add(&mut self, ts: Timestamp) {
        match self.timestamps.back() {
            Some(&last) if last > ts => {
                let at = self.timestamps.partition_point(|&t| t <= ts);
                self.timestamps.insert(at, ts);
            }
            _ => self.timestamps.push_back(ts),
        }
    }

    /// Remove one occurrence of `ts`; returns false if absent
    pub fn remove(&mut self, ts: Timestamp) -> bool {
        match self.timestamps.iter().position(|&t| t == ts) {
            Some(at) => {
                self.timestamps.remove(at);
                true
            }
            None => false,
        }
    }

    /// Oldest live snapshot
    pub fn oldest(&self) -> Option<Timestamp> {
        self.timestamps.front().copied()
    }

    /// Number of live transactions
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if no transaction is live
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
