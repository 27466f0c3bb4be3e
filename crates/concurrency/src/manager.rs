//! Transaction manager for multi-version concurrency control
//!
//! Coordinates every session's view of the row store:
//! 1. Timestamps (global clock shared by snapshots and commits)
//! 2. Row version markers (pending and committed changes per row)
//! 3. Commit validation (first-committer-wins)
//! 4. Merge of committed versions once no live snapshot needs the old state
//! 5. Catalog and table lock waits with deadlock refusal
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Acquire manager lock
//! 2. IF abort requested by a concurrent committer: return false
//! 3. can_commit() on every written row - IF a newer commit exists: return false
//! 4. Allocate commit timestamp
//! 5. Write row records, then the commit record (DURABILITY POINT)
//! 6. Stamp pending entries with the commit timestamp; drop reader marks
//! 7. Flag stale reference readers for abort
//! 8. End transaction: leave live set, release locks, wake waiters
//! 9. Merge now if no live snapshot predates the commit, else queue it
//! 10. Sweep the commit queue
//! ```
//!
//! A failure at step 5 on the commit record refuses the commit; nothing was
//! stamped, so the caller's rollback restores the previous state.
//!
//! # Thread Safety
//!
//! One manager lock serializes begin, commit, rollback, merge and lock
//! coordination. Per-row marker mutexes are taken while holding it, never
//! the reverse. Row writes and visibility checks take only the row's mutex.

use crate::catalog::CatalogLocks;
use crate::clock::GlobalClock;
use crate::commit_queue::{CommitQueue, CommittedBatch};
use crate::config::TransactionConfig;
use crate::live::LiveTransactions;
use crate::metrics::{Counters, TransactionMetrics};
use crate::row_versions::RowVersionMap;
use crate::session::{ActionRecord, RecordKind, Savepoint, Session};
use crate::statement::Statement;
use basalt_core::types::MAX_TIMESTAMP;
use basalt_core::{
    Error, Result, RowKey, SessionId, Timestamp, TransactionControl, Value,
};
use basalt_durability::RedoLog;
use basalt_storage::{
    ActionType, DeleteRefusal, MergeOutcome, Row, RowAction, Store, Table, TableType,
};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// How a visibility check treats the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Plain visibility test
    Read,
    /// Visibility test that registers the session as a reader, so a
    /// concurrent writer's commit invalidates it
    Reference,
}

/// Result of asking to start a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPermit {
    /// The statement may run
    Granted,
    /// The session must park until these sessions end their transactions
    Wait {
        /// Sessions being waited for
        blockers: Vec<SessionId>,
    },
}

/// Category of a best-effort failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedKind {
    /// A row record could not be written to the redo log
    RowLog,
    /// A rollback record could not be written to the redo log
    RollbackLog,
    /// A finally deleted row could not be removed from storage
    RowRemoval,
}

/// Best-effort failure recorded instead of failing the operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedEvent {
    /// What failed
    pub kind: DegradedKind,
    /// Session whose operation hit the failure, if any
    pub session: Option<SessionId>,
    /// Row involved, if any
    pub key: Option<RowKey>,
    /// Error text
    pub detail: String,
}

struct ManagerState {
    control: TransactionControl,
    live: LiveTransactions,
    commit_queue: CommitQueue,
    transacting: BTreeSet<SessionId>,
    sessions: FxHashMap<SessionId, Weak<Session>>,
    catalog: CatalogLocks,
    degraded: Vec<DegradedEvent>,
}

impl ManagerState {
    /// Commits older than this are visible to every live snapshot
    fn merge_horizon(&self) -> Timestamp {
        self.live.oldest().unwrap_or(MAX_TIMESTAMP)
    }

    fn session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).and_then(Weak::upgrade)
    }
}

/// Manages transaction lifecycle, row versions and lock waits
///
/// One instance per database. Sessions are created through
/// [`TransactionManager::create_session`] and passed back into every
/// operation.
pub struct TransactionManager {
    /// Source of snapshot, statement and commit timestamps
    clock: GlobalClock,

    /// Next session identifier
    next_session_id: AtomicU64,

    /// Manager lock
    ///
    /// Guards the live set, the commit queue, the lock coordinator and the
    /// session registry.
    state: Mutex<ManagerState>,

    /// Version markers for rows that do not carry them inline
    row_versions: RowVersionMap,

    store: Arc<Store>,
    log: Arc<dyn RedoLog>,
    config: TransactionConfig,
    counters: Counters,
}

impl TransactionManager {
    /// Create a manager over `store`, logging to `log`
    pub fn new(store: Arc<Store>, log: Arc<dyn RedoLog>, config: TransactionConfig) -> Self {
        info!(control = ?config.control, isolation = ?config.default_isolation, "transaction manager started");
        TransactionManager {
            clock: GlobalClock::default(),
            next_session_id: AtomicU64::new(1),
            state: Mutex::new(ManagerState {
                control: config.control,
                live: LiveTransactions::new(),
                commit_queue: CommitQueue::new(),
                transacting: BTreeSet::new(),
                sessions: FxHashMap::default(),
                catalog: CatalogLocks::default(),
                degraded: Vec::new(),
            }),
            row_versions: RowVersionMap::new(),
            store,
            log,
            config,
            counters: Counters::default(),
        }
    }

    /// Row store the manager versions
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Settings in force
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Last timestamp handed out by the clock
    pub fn current_timestamp(&self) -> Timestamp {
        self.clock.current()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Register a new session with the configured default isolation
    pub fn create_session(&self) -> Arc<Session> {
        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session::new(id, self.config.default_isolation));
        let mut state = self.state.lock();
        state.sessions.retain(|_, s| s.strong_count() > 0);
        state.sessions.insert(id, Arc::downgrade(&session));
        debug!(session = %id, "session created");
        session
    }

    /// Roll back any open transaction and unregister the session
    pub fn close_session(&self, session: &Session) {
        self.rollback(session);
        self.state.lock().sessions.remove(&session.id());
        debug!(session = %session.id(), "session closed");
    }

    // ========================================================================
    // Transaction control
    // ========================================================================

    /// Current concurrency strategy
    pub fn get_transaction_control(&self) -> TransactionControl {
        self.state.lock().control
    }

    /// Switch concurrency strategy
    ///
    /// Refused while any other session is inside a transaction.
    pub fn set_transaction_control(
        &self,
        session: &Session,
        control: TransactionControl,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.transacting.iter().any(|s| *s != session.id()) {
            return Err(Error::InvalidTransactionState(
                "cannot change transaction control while other sessions are in a transaction"
                    .to_string(),
            ));
        }
        if state.control != control {
            info!(from = ?state.control, to = ?control, "transaction control changed");
            state.control = control;
        }
        Ok(())
    }

    // ========================================================================
    // Begin
    // ========================================================================

    /// Start a transaction if the session has none
    pub fn begin_transaction(&self, session: &Session) {
        let mut state = self.state.lock();
        self.begin_transaction_locked(&mut state, session);
    }

    fn begin_transaction_locked(&self, state: &mut ManagerState, session: &Session) {
        let ts = {
            let mut txn = session.state();
            if txn.is_transaction {
                return;
            }
            let ts = self.clock.next_change_timestamp();
            txn.is_transaction = true;
            txn.transaction_timestamp = ts;
            txn.action_timestamp = ts;
            txn.action_start_index = 0;
            ts
        };
        state.live.add(ts);
        state.transacting.insert(session.id());
        session.clear_abort();
        debug!(session = %session.id(), ts, "transaction started");
    }

    /// Ask to start `stmt`
    ///
    /// Returns [`ActionPermit::Granted`] after resuming the statement, or
    /// [`ActionPermit::Wait`] with the session's latch armed. A wait that
    /// would close a cycle fails with [`Error::DeadlockRefused`].
    pub fn prepare_action(&self, session: &Session, stmt: &dyn Statement) -> Result<ActionPermit> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let id = session.id();
        let blockers = state
            .catalog
            .blockers(id, stmt, state.control, &state.transacting);

        if blockers.is_empty() {
            self.begin_action_resume(state, session, stmt);
            return Ok(ActionPermit::Granted);
        }

        if state.catalog.graph().would_deadlock(id, &blockers) {
            warn!(session = %id, ?blockers, "lock wait refused: deadlock");
            return Err(Error::DeadlockRefused { session: id });
        }

        state.catalog.graph_mut().add_waits(id, &blockers);
        session.latch().set_count(blockers.len());
        debug!(session = %id, ?blockers, "statement waiting for locks");
        Ok(ActionPermit::Wait { blockers })
    }

    /// Start `stmt`, parking the calling thread while it must wait
    pub fn begin_action(&self, session: &Session, stmt: &dyn Statement) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.prepare_action(session, stmt)? {
                ActionPermit::Granted => return Ok(()),
                ActionPermit::Wait { .. } => self.park(session, started)?,
            }
        }
    }

    /// Park until every session this one waits for has ended
    ///
    /// Used after a row-level wait reported through the redo flag.
    pub fn await_wakeup(&self, session: &Session) -> Result<()> {
        self.park(session, Instant::now())
    }

    fn park(&self, session: &Session, started: Instant) -> Result<()> {
        let remaining = self
            .config
            .lock_wait_timeout()
            .map(|t| t.saturating_sub(started.elapsed()));
        if session.latch().await_zero(remaining) {
            return Ok(());
        }

        let mut state = self.state.lock();
        state.catalog.graph_mut().clear_waits(session.id());
        session.latch().set_count(0);
        let waited_ms = started.elapsed().as_millis() as u64;
        warn!(session = %session.id(), waited_ms, "lock wait timed out");
        Err(Error::LockTimeout {
            session: session.id(),
            waited_ms,
        })
    }

    fn begin_action_resume(&self, state: &mut ManagerState, session: &Session, stmt: &dyn Statement) {
        if session.is_in_transaction() {
            session.state().action_timestamp = self.clock.next_change_timestamp();
        } else {
            self.begin_transaction_locked(state, session);
        }
        {
            let mut txn = session.state();
            txn.action_start_index = txn.actions.len();
        }
        session.take_redo();
        state.catalog.grant(session.id(), stmt, state.control);
    }

    // ========================================================================
    // Row changes
    // ========================================================================

    fn check_abort(&self, session: &Session) -> Result<()> {
        if session.is_abort_requested() {
            return Err(Error::serialization(format!(
                "{} was invalidated by a concurrent commit",
                session.id()
            )));
        }
        Ok(())
    }

    fn lookup_action(&self, table_type: TableType, row: &Row) -> Option<Arc<RowAction>> {
        if table_type.keeps_action_inline() {
            row.action()
        } else {
            self.row_versions.get(row.key())
        }
    }

    fn action_for_update(&self, table_type: TableType, row: &Row) -> Arc<RowAction> {
        let key = row.key();
        if table_type.keeps_action_inline() {
            row.action_or_insert_with(|| RowAction::existing(key))
        } else {
            self.row_versions
                .get_or_insert_with(key, || RowAction::existing(key))
        }
    }

    /// Insert a row as an uncommitted change of `session`
    pub fn add_insert_action(
        &self,
        session: &Session,
        table: &Table,
        values: Vec<Value>,
    ) -> Result<Arc<Row>> {
        self.check_abort(session)?;
        self.begin_transaction(session);

        let mut txn = session.state();
        let action_timestamp = txn.action_timestamp;
        let boundary = txn.snapshot_boundary();
        let inline = table.table_type().keeps_action_inline();
        let mut created = None;
        let row = table.insert_row_with(values, |row| {
            let action = Arc::new(RowAction::inserted(row.key(), session.id(), action_timestamp));
            if inline {
                row.set_action(Arc::clone(&action));
            } else {
                self.row_versions.insert(Arc::clone(&action));
            }
            created = Some(action);
        });
        if let Some(action) = created {
            txn.actions.push(ActionRecord {
                action,
                kind: RecordKind::Write,
                action_timestamp,
                boundary,
            });
        }
        trace!(session = %session.id(), row = %row.key(), "insert");
        Ok(row)
    }

    /// Mark `row` deleted as an uncommitted change of `session`
    ///
    /// Returns `Ok(false)` under READ COMMITTED when the row is in conflict:
    /// the statement has been rolled back and the redo flag set. If the
    /// conflicting session is still uncommitted, this session's latch is
    /// armed and the caller should [`await_wakeup`](Self::await_wakeup)
    /// before redoing. Under snapshot isolation a conflict fails with a
    /// serialization failure and marks the transaction for abort.
    pub fn add_delete_action(&self, session: &Session, table: &Table, row: &Row) -> Result<bool> {
        self.check_abort(session)?;
        self.begin_transaction(session);

        let id = session.id();
        let (action_timestamp, boundary) = {
            let txn = session.state();
            (txn.action_timestamp, txn.snapshot_boundary())
        };

        let (action, refusal) = loop {
            if row.is_removed() {
                break (None, DeleteRefusal::Invisible);
            }
            let action = self.action_for_update(table.table_type(), row);
            match action.add_delete(id, action_timestamp, boundary) {
                Ok(()) => {
                    session.state().actions.push(ActionRecord {
                        action,
                        kind: RecordKind::Write,
                        action_timestamp,
                        boundary,
                    });
                    trace!(session = %id, row = %row.key(), "delete");
                    return Ok(true);
                }
                Err(DeleteRefusal::Stale) => continue,
                Err(refusal) => break (Some(action), refusal),
            }
        };
        self.refuse_delete(session, row.key(), action, refusal)
    }

    fn refuse_delete(
        &self,
        session: &Session,
        key: RowKey,
        action: Option<Arc<RowAction>>,
        refusal: DeleteRefusal,
    ) -> Result<bool> {
        let id = session.id();
        if session.isolation().is_snapshot() {
            session.request_abort();
            Counters::bump(&self.counters.serialization_failures, 1);
            debug!(session = %id, row = %key, ?refusal, "delete refused under snapshot isolation");
            return Err(Error::serialization(format!(
                "row {key} was changed by a concurrent transaction"
            )));
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let start = session.state().action_start_index;
        self.rollback_partial(state, session, start, false);
        session.request_redo();

        if let (DeleteRefusal::Pending(owner), Some(action)) = (refusal, action) {
            let still_pending =
                action.pending_owner() == Some(owner) && state.transacting.contains(&owner);
            if still_pending {
                if state.catalog.graph().would_deadlock(id, &[owner]) {
                    session.request_abort();
                    warn!(session = %id, blocker = %owner, row = %key, "row wait refused: deadlock");
                    return Err(Error::DeadlockRefused { session: id });
                }
                if state.catalog.graph_mut().add_waits(id, &[owner]) > 0 {
                    session.latch().count_up();
                }
                debug!(session = %id, blocker = %owner, row = %key, "statement waits for row owner");
            }
        }
        debug!(session = %id, row = %key, ?refusal, "statement must be redone");
        Ok(false)
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Whether `row` is visible to `session`
    ///
    /// In [`ReadMode::Reference`] inside a transaction, a visible row also
    /// records the session as a reader.
    pub fn can_read(&self, session: &Session, row: &Row, table_type: TableType, mode: ReadMode) -> bool {
        if row.is_removed() {
            return false;
        }
        let id = session.id();
        let (in_transaction, boundary, action_timestamp) = {
            let txn = session.state();
            (txn.is_transaction, txn.snapshot_boundary(), txn.action_timestamp)
        };

        if mode == ReadMode::Reference && in_transaction {
            loop {
                let action = self.action_for_update(table_type, row);
                let Some(visible) = action.read_with_reference(id, boundary) else {
                    continue;
                };
                if visible {
                    let mut txn = session.state();
                    if txn.read_keys.insert(row.key()) {
                        txn.actions.push(ActionRecord {
                            action,
                            kind: RecordKind::Read,
                            action_timestamp,
                            boundary,
                        });
                    }
                }
                return visible;
            }
        }

        match self.lookup_action(table_type, row) {
            Some(action) => action.is_visible(id, boundary),
            None => true,
        }
    }

    /// Whether the row at `key` exists and is visible to `session`
    pub fn can_read_position(&self, session: &Session, key: RowKey, mode: ReadMode) -> bool {
        let Some(table) = self.store.table(key.table) else {
            return false;
        };
        match table.get(key.position) {
            Some(row) => self.can_read(session, &row, table.table_type(), mode),
            None => false,
        }
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Commit the session's transaction
    ///
    /// Returns `Ok(false)` when a concurrent commit invalidated the
    /// transaction; the caller must roll back. Fails with [`Error::Logging`]
    /// if the commit record could not be written, before anything was made
    /// visible. Committing with no transaction open is a no-op.
    pub fn commit_transaction(&self, session: &Session) -> Result<bool> {
        let id = session.id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let records = {
            let txn = session.state();
            if !txn.is_transaction {
                return Ok(true);
            }
            txn.actions.clone()
        };

        if session.is_abort_requested() {
            debug!(session = %id, "commit refused: transaction marked for abort");
            return Ok(false);
        }

        let has_writes = records.iter().any(|r| r.kind == RecordKind::Write);
        let mut stale_readers = Vec::new();
        for record in &records {
            let valid = match record.kind {
                RecordKind::Write => {
                    record
                        .action
                        .can_commit(id, record.boundary, &mut stale_readers)
                }
                // read-only transactions skip read validation
                RecordKind::Read => {
                    !has_writes || record.action.can_commit_read(id, record.boundary)
                }
            };
            if !valid {
                Counters::bump(&self.counters.serialization_failures, 1);
                debug!(session = %id, row = %record.action.key(), "commit refused: row changed by a concurrent commit");
                return Ok(false);
            }
        }

        let commit_timestamp = self.clock.next_change_timestamp();
        if has_writes {
            self.write_redo(state, id, &records, commit_timestamp)?;
        }

        for record in &records {
            match record.kind {
                RecordKind::Write => {
                    record.action.commit(id, commit_timestamp);
                }
                RecordKind::Read => record.action.remove_reader(id),
            }
        }

        stale_readers.sort();
        stale_readers.dedup();
        for reader in stale_readers {
            if !state.transacting.contains(&reader) {
                continue;
            }
            if let Some(other) = state.session(reader) {
                other.request_abort();
                debug!(session = %reader, by = %id, "reader invalidated by commit");
            }
        }

        self.end_transaction(state, session);
        Counters::bump(&self.counters.committed, 1);

        let touched = distinct_actions(&records);
        let horizon = state.merge_horizon();
        if commit_timestamp < horizon {
            self.merge_expired(state);
            self.merge_actions(state, &touched, horizon);
        } else {
            state.commit_queue.push(CommittedBatch {
                session: id,
                commit_timestamp,
                actions: touched,
            });
        }
        self.merge_expired(state);

        debug!(session = %id, commit_timestamp, rows = records.len(), "transaction committed");
        Ok(true)
    }

    fn write_redo(
        &self,
        state: &mut ManagerState,
        session: SessionId,
        records: &[ActionRecord],
        commit_timestamp: Timestamp,
    ) -> Result<()> {
        let mut seen = FxHashSet::default();
        for record in records.iter().filter(|r| r.kind == RecordKind::Write) {
            let key = record.action.key();
            if !seen.insert(key) {
                continue;
            }
            let Some(table) = self.store.table(key.table) else {
                continue;
            };
            if !table.meta().is_logged {
                continue;
            }
            let Some(row) = table.get(key.position) else {
                continue;
            };
            let written = match record.action.action_type() {
                ActionType::Insert => self.log.write_insert_statement(session, &row),
                ActionType::Delete => self.log.write_delete_statement(session, &row),
                _ => Ok(()),
            };
            if let Err(e) = written {
                self.record_degraded(
                    state,
                    DegradedEvent {
                        kind: DegradedKind::RowLog,
                        session: Some(session),
                        key: Some(key),
                        detail: e.to_string(),
                    },
                );
            }
        }

        self.log
            .write_commit_statement(session, commit_timestamp)
            .map_err(|e| {
                warn!(session = %session, error = %e, "commit record not written");
                match e {
                    Error::Logging(_) => e,
                    other => Error::Logging(other.to_string()),
                }
            })
    }

    fn end_transaction(&self, state: &mut ManagerState, session: &Session) {
        let id = session.id();
        let ts = {
            let mut txn = session.state();
            let ts = txn.transaction_timestamp;
            txn.reset();
            ts
        };
        state.live.remove(ts);
        state.transacting.remove(&id);
        for waiter in state.catalog.release(id) {
            if let Some(waiting) = state.session(waiter) {
                waiting.latch().count_down();
            }
        }
        session.clear_abort();
    }

    // ========================================================================
    // Rollback
    // ========================================================================

    /// Discard every change of the session's transaction
    pub fn rollback(&self, session: &Session) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !session.is_in_transaction() {
            return;
        }
        let id = session.id();
        let rollback_timestamp = self.clock.next_change_timestamp();

        self.rollback_partial(state, session, 0, true);
        if let Err(e) = self.log.write_rollback_statement(id) {
            self.record_degraded(
                state,
                DegradedEvent {
                    kind: DegradedKind::RollbackLog,
                    session: Some(id),
                    key: None,
                    detail: e.to_string(),
                },
            );
        }
        self.end_transaction(state, session);
        Counters::bump(&self.counters.rolled_back, 1);
        self.merge_expired(state);
        debug!(session = %id, rollback_timestamp, "transaction rolled back");
    }

    /// Discard the changes of the current statement
    pub fn rollback_action(&self, session: &Session) {
        let mut guard = self.state.lock();
        if !session.is_in_transaction() {
            return;
        }
        let start = session.state().action_start_index;
        self.rollback_partial(&mut guard, session, start, false);
    }

    /// Record a named position in the action list
    ///
    /// Starts a transaction if needed. An existing savepoint of the same
    /// name is replaced.
    pub fn savepoint(&self, session: &Session, name: &str) {
        self.begin_transaction(session);
        let mut txn = session.state();
        let index = txn.actions.len();
        let action_timestamp = txn.action_timestamp;
        txn.savepoints.retain(|s| s.name != name);
        txn.savepoints.push(Savepoint {
            name: name.to_string(),
            index,
            action_timestamp,
        });
    }

    /// Forget a savepoint and every savepoint taken after it
    pub fn release_savepoint(&self, session: &Session, name: &str) -> Result<()> {
        let mut txn = session.state();
        let pos = savepoint_position(&txn.savepoints, name)?;
        txn.savepoints.truncate(pos);
        Ok(())
    }

    /// Discard changes made after savepoint `name`
    ///
    /// The savepoint itself survives; later ones are dropped.
    pub fn rollback_savepoint(&self, session: &Session, name: &str) -> Result<()> {
        let mut guard = self.state.lock();
        let index = {
            let mut txn = session.state();
            let pos = savepoint_position(&txn.savepoints, name)?;
            txn.savepoints.truncate(pos + 1);
            txn.savepoints[pos].index
        };
        self.rollback_partial(&mut guard, session, index, false);
        let mut txn = session.state();
        txn.action_start_index = txn.action_start_index.min(txn.actions.len());
        debug!(session = %session.id(), savepoint = name, "rolled back to savepoint");
        Ok(())
    }

    /// Undo action-list entries from `index` on
    ///
    /// Reference reads survive a partial rollback so their reader marks stay
    /// accounted for; a full rollback drops them too.
    fn rollback_partial(&self, state: &mut ManagerState, session: &Session, index: usize, full: bool) {
        let id = session.id();
        let (reads, writes): (Vec<_>, Vec<_>) = {
            let mut txn = session.state();
            let index = index.min(txn.actions.len());
            txn.actions
                .split_off(index)
                .into_iter()
                .partition(|r| r.kind == RecordKind::Read)
        };

        for record in writes.iter().rev() {
            record.action.rollback(id);
        }

        let mut undone = writes;
        if full {
            for record in &reads {
                record.action.remove_reader(id);
            }
            undone.extend(reads);
        } else {
            session.state().actions.extend(reads);
        }

        let horizon = state.merge_horizon();
        self.merge_actions(state, &distinct_actions(&undone), horizon);
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Fold committed versions no live snapshot needs anymore
    pub fn merge_expired_transactions(&self) {
        let mut state = self.state.lock();
        self.merge_expired(&mut state);
    }

    fn merge_expired(&self, state: &mut ManagerState) {
        let horizon = state.merge_horizon();
        while let Some(batch) = state.commit_queue.pop_expired(horizon) {
            trace!(session = %batch.session, commit_timestamp = batch.commit_timestamp, "merging queued commit");
            self.merge_actions(state, &batch.actions, horizon);
        }
    }

    fn merge_actions(&self, state: &mut ManagerState, actions: &[Arc<RowAction>], horizon: Timestamp) {
        for action in actions {
            let outcome = action.merge(horizon);
            self.apply_merge_outcome(state, action, outcome);
        }
    }

    fn apply_merge_outcome(&self, state: &mut ManagerState, action: &Arc<RowAction>, outcome: MergeOutcome) {
        if outcome.folded > 0 {
            Counters::bump(&self.counters.rows_merged, outcome.folded as u64);
        }
        let key = action.key();
        if outcome.delete_row {
            if let Err(e) = self.store.remove_row(key) {
                self.record_degraded(
                    state,
                    DegradedEvent {
                        kind: DegradedKind::RowRemoval,
                        session: None,
                        key: Some(key),
                        detail: e.to_string(),
                    },
                );
            }
        }
        if outcome.detach {
            match self.store.table(key.table) {
                Some(table) if table.table_type().keeps_action_inline() => {
                    if let Some(row) = table.get(key.position) {
                        row.clear_action_if(action);
                    }
                }
                _ => {
                    self.row_versions.remove_if_same(key, action);
                }
            }
        }
    }

    // ========================================================================
    // Observability
    // ========================================================================

    fn record_degraded(&self, state: &mut ManagerState, event: DegradedEvent) {
        warn!(kind = ?event.kind, session = ?event.session, detail = %event.detail, "degraded operation");
        Counters::bump(&self.counters.degraded_events, 1);
        state.degraded.push(event);
    }

    /// Drain best-effort failures recorded since the last call
    pub fn take_degraded_events(&self) -> Vec<DegradedEvent> {
        std::mem::take(&mut self.state.lock().degraded)
    }

    /// Counter snapshot
    pub fn metrics(&self) -> TransactionMetrics {
        let state = self.state.lock();
        self.counters
            .snapshot(state.live.len(), state.commit_queue.len())
    }

    /// Number of transactions in progress
    pub fn live_transaction_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Number of committed batches waiting for merge
    pub fn commit_queue_len(&self) -> usize {
        self.state.lock().commit_queue.len()
    }

    /// Number of markers in the global row-version map
    pub fn row_version_count(&self) -> usize {
        self.row_versions.len()
    }

    /// Sessions `session` currently waits for
    pub fn blockers_of(&self, session: SessionId) -> Vec<SessionId> {
        self.state.lock().catalog.graph().blockers_of(session)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .field("row_versions", &self.row_versions.len())
            .finish()
    }
}

fn savepoint_position(savepoints: &[Savepoint], name: &str) -> Result<usize> {
    savepoints
        .iter()
        .position(|s| s.name == name)
        .ok_or_else(|| Error::InvalidOperation(format!("savepoint not found: {name}")))
}

fn distinct_actions(records: &[ActionRecord]) -> Vec<Arc<RowAction>> {
    let mut seen = FxHashSet::default();
    records
        .iter()
        .filter(|r| seen.insert(Arc::as_ptr(&r.action) as usize))
        .map(|r| Arc::clone(&r.action))
        .collect()
}
