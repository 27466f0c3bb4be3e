//! Commit queue
//!
//! Transactions that commit while an older snapshot is still live cannot
//! fold their versions yet. Their action lists wait here, in commit order,
//! until the merge sweep finds every live snapshot newer than them.

use basalt_core::{SessionId, Timestamp};
use basalt_storage::RowAction;
use std::collections::VecDeque;
use std::sync::Arc;

/// Committed changes waiting to be merged
#[derive(Debug, Clone)]
pub struct CommittedBatch {
    /// Session that committed
    pub session: SessionId,
    /// Commit timestamp shared by every action in the batch
    pub commit_timestamp: Timestamp,
    /// Row markers written by the transaction
    pub actions: Vec<Arc<RowAction>>,
}

/// FIFO of committed batches ordered by commit timestamp
#[derive(Debug, Default)]
pub struct CommitQueue {
    batches: VecDeque<CommittedBatch>,
}

impl CommitQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch; commit timestamps must arrive in increasing order
    pub fn push(&mut self, batch: CommittedBatch) {
        debug_assert!(self
            .batches
            .back()
            .map_or(true, |last| last.commit_timestamp < batch.commit_timestamp));
        self.batches.push_back(batch);
    }

    /// Commit timestamp of the oldest waiting batch
    pub fn peek_timestamp(&self) -> Option<Timestamp> {
        self.batches.front().map(|b| b.commit_timestamp)
    }

    /// Pop the oldest batch if it committed before `horizon`
    pub fn pop_expired(&mut self, horizon: Timestamp) -> Option<CommittedBatch> {
        match self.peek_timestamp() {
            Some(ts) if ts < horizon => self.batches.pop_front(),
            _ => None,
        }
    }

    /// Number of waiting batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Check if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
