//! Session state owned by the transaction manager
//!
//! A session is driven by one thread. The manager mutates its
//! transaction-scoped fields under the session's own mutex; other sessions
//! only ever touch the two cooperative flags and the latch.
//!
//! # Cooperative Signals
//!
//! - `abort_transaction`: set by a concurrent committer whose write made
//!   this session's reads stale. Checked at the next commit or row write.
//! - `redo_action`: set when a statement under READ COMMITTED hit a row
//!   conflict. The statement executor rolls back the statement and retries.

use crate::latch::CountDownLatch;
use basalt_core::types::MAX_TIMESTAMP;
use basalt_core::{Error, IsolationLevel, Result, RowKey, SessionId, Timestamp};
use basalt_storage::RowAction;
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a row marker is in the session's action list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// The session inserted or deleted the row
    Write,
    /// The session inspected the row in reference mode
    Read,
}

/// One entry of the session's ordered action list
#[derive(Debug, Clone)]
pub struct ActionRecord {
    /// Marker of the row touched
    pub action: Arc<RowAction>,
    /// Write or reference read
    pub kind: RecordKind,
    /// Statement timestamp when the row was touched
    pub action_timestamp: Timestamp,
    /// Snapshot boundary in force when the row was touched
    pub boundary: Timestamp,
}

/// Named position in the action list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    /// Savepoint name
    pub name: String,
    /// Length of the action list when taken
    pub index: usize,
    /// Statement timestamp when taken
    pub action_timestamp: Timestamp,
}

/// Transaction-scoped fields
#[derive(Debug, Default)]
pub(crate) struct TransactionState {
    pub(crate) isolation: IsolationLevel,
    pub(crate) is_transaction: bool,
    pub(crate) transaction_timestamp: Timestamp,
    pub(crate) action_timestamp: Timestamp,
    pub(crate) action_start_index: usize,
    pub(crate) actions: Vec<ActionRecord>,
    pub(crate) savepoints: Vec<Savepoint>,
    /// Rows already registered as reference reads
    pub(crate) read_keys: FxHashSet<RowKey>,
}

impl TransactionState {
    pub(crate) fn snapshot_boundary(&self) -> Timestamp {
        if !self.is_transaction {
            return MAX_TIMESTAMP;
        }
        if self.isolation.is_snapshot() {
            self.transaction_timestamp
        } else {
            self.action_timestamp
        }
    }

    pub(crate) fn reset(&mut self) {
        self.is_transaction = false;
        self.action_start_index = 0;
        self.actions.clear();
        self.savepoints.clear();
        self.read_keys.clear();
    }
}

/// A connected session
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    abort_transaction: AtomicBool,
    redo_action: AtomicBool,
    latch: CountDownLatch,
    state: Mutex<TransactionState>,
}

impl Session {
    pub(crate) fn new(id: SessionId, isolation: IsolationLevel) -> Self {
        Self {
            id,
            abort_transaction: AtomicBool::new(false),
            redo_action: AtomicBool::new(false),
            latch: CountDownLatch::new(),
            state: Mutex::new(TransactionState {
                isolation,
                ..TransactionState::default()
            }),
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, TransactionState> {
        self.state.lock()
    }

    /// Current isolation level
    pub fn isolation(&self) -> IsolationLevel {
        self.state.lock().isolation
    }

    /// Change the isolation level
    ///
    /// Only allowed between transactions.
    pub fn set_isolation(&self, isolation: IsolationLevel) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_transaction {
            return Err(Error::InvalidTransactionState(format!(
                "{} cannot change isolation inside a transaction",
                self.id
            )));
        }
        state.isolation = isolation;
        Ok(())
    }

    /// Whether a transaction is in progress
    pub fn is_in_transaction(&self) -> bool {
        self.state.lock().is_transaction
    }

    /// Start timestamp of the current transaction
    pub fn transaction_timestamp(&self) -> Option<Timestamp> {
        let state = self.state.lock();
        state.is_transaction.then_some(state.transaction_timestamp)
    }

    /// Timestamp of the current statement
    pub fn action_timestamp(&self) -> Option<Timestamp> {
        let state = self.state.lock();
        state.is_transaction.then_some(state.action_timestamp)
    }

    /// Timestamp bounding what this session may see
    pub fn snapshot_boundary(&self) -> Timestamp {
        self.state.lock().snapshot_boundary()
    }

    /// Number of entries in the action list
    pub fn action_count(&self) -> usize {
        self.state.lock().actions.len()
    }

    /// Names of the savepoints currently held
    pub fn savepoint_names(&self) -> Vec<String> {
        self.state
            .lock()
            .savepoints
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Whether another session forced this transaction to fail
    pub fn is_abort_requested(&self) -> bool {
        self.abort_transaction.load(Ordering::Acquire)
    }

    pub(crate) fn request_abort(&self) {
        self.abort_transaction.store(true, Ordering::Release);
    }

    pub(crate) fn clear_abort(&self) {
        self.abort_transaction.store(false, Ordering::Release);
    }

    /// Whether the last statement asked to be redone
    pub fn is_redo_requested(&self) -> bool {
        self.redo_action.load(Ordering::Acquire)
    }

    /// Read and clear the redo flag
    pub fn take_redo(&self) -> bool {
        self.redo_action.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn request_redo(&self) {
        self.redo_action.store(true, Ordering::Release);
    }

    /// Latch this session's thread parks on while waiting for locks
    pub fn latch(&self) -> &CountDownLatch {
        &self.latch
    }
}
