//! Transaction counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the transaction manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionMetrics {
    /// Transactions committed
    pub committed: u64,
    /// Commits refused by conflict validation
    pub serialization_failures: u64,
    /// Transactions rolled back
    pub rolled_back: u64,
    /// Committed versions folded into base rows
    pub rows_merged: u64,
    /// Best-effort failures recorded on the degraded channel
    pub degraded_events: u64,
    /// Transactions currently live
    pub live_transactions: usize,
    /// Committed batches waiting for merge
    pub queued_commits: usize,
}

impl TransactionMetrics {
    /// Share of finished transactions that committed (0.0 - 1.0)
    pub fn commit_rate(&self) -> f64 {
        let finished = self.committed + self.rolled_back;
        if finished == 0 {
            return 1.0;
        }
        self.committed as f64 / finished as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) committed: AtomicU64,
    pub(crate) serialization_failures: AtomicU64,
    pub(crate) rolled_back: AtomicU64,
    pub(crate) rows_merged: AtomicU64,
    pub(crate) degraded_events: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, live: usize, queued: usize) -> TransactionMetrics {
        TransactionMetrics {
            committed: self.committed.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            rows_merged: self.rows_merged.load(Ordering::Relaxed),
            degraded_events: self.degraded_events.load(Ordering::Relaxed),
            live_transactions: live,
            queued_commits: queued,
        }
    }
}
