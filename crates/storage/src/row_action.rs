//! Row version markers
//!
//! A [`RowAction`] records the change history of exactly one row slot that
//! some session is changing or has recently changed. The history is a short
//! chain of [`ActionEntry`] values, oldest first:
//!
//! ```text
//! base row ── [Insert s1 @c=3] ── [Delete s2 pending]
//!              committed           at most one pending owner
//! ```
//!
//! Committed entries stay in the chain until every live snapshot is newer
//! than their commit timestamp; the merge step then folds them into the base
//! state. Pending entries always belong to a single session and sit at the
//! tail of the chain.
//!
//! # Thread Safety
//!
//! Each RowAction carries its own mutex. It is the per-row critical section:
//! held only while reading or mutating this one chain, never across rows.

use basalt_core::{RowKey, SessionId, Timestamp};
use parking_lot::Mutex;
use smallvec::SmallVec;

/// Type of change recorded for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// No change (base data, or reference-only marker)
    None,
    /// Row was inserted
    Insert,
    /// Row was marked deleted
    Delete,
    /// Row was inserted and deleted by the same transaction
    InsertDelete,
    /// Delete is visible to every live snapshot; row may be physically removed
    DeleteFinal,
}

impl ActionType {
    /// Whether applying this change leaves the row absent
    pub fn removes_row(&self) -> bool {
        matches!(
            self,
            ActionType::Delete | ActionType::InsertDelete | ActionType::DeleteFinal
        )
    }
}

/// One change in a row's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    /// Insert, Delete or (after commit) InsertDelete
    pub kind: ActionType,
    /// Session that made the change
    pub session: SessionId,
    /// Statement timestamp at which the change was made
    pub action_timestamp: Timestamp,
    /// Commit timestamp, `None` while pending
    pub commit_timestamp: Option<Timestamp>,
}

impl ActionEntry {
    fn is_committed(&self) -> bool {
        self.commit_timestamp.is_some()
    }

    /// A session always sees its own changes; other changes only once
    /// committed at or before the snapshot boundary.
    fn applies_to(&self, session: SessionId, boundary: Timestamp) -> bool {
        if self.session == session {
            return true;
        }
        matches!(self.commit_timestamp, Some(c) if c <= boundary)
    }
}

/// Why a delete could not be attached to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRefusal {
    /// Another session holds an uncommitted change on the row
    Pending(SessionId),
    /// Another session committed a change after the snapshot boundary
    Conflict {
        /// Session that committed first
        session: SessionId,
        /// Its commit timestamp
        committed_at: Timestamp,
    },
    /// The row is not visible to the deleting session
    Invisible,
    /// The marker was detached from its row; look it up again
    Stale,
}

/// What the caller must do after folding committed entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Number of committed entries folded into the base state
    pub folded: usize,
    /// Row's final state is deleted; physically remove it now
    pub delete_row: bool,
    /// Marker is no longer needed; drop it from the row or version map
    pub detach: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reader {
    session: SessionId,
    boundary: Timestamp,
}

#[derive(Debug)]
struct Chain {
    base_exists: bool,
    entries: SmallVec<[ActionEntry; 2]>,
    readers: SmallVec<[Reader; 2]>,
    final_type: ActionType,
    detached: bool,
}

impl Chain {
    fn visible(&self, session: SessionId, boundary: Timestamp) -> bool {
        if self.final_type == ActionType::DeleteFinal {
            return false;
        }
        self.entries
            .iter()
            .filter(|e| e.applies_to(session, boundary))
            .fold(self.base_exists, |exists, e| match e.kind {
                ActionType::Insert => true,
                ActionType::None => exists,
                _ => false,
            })
    }

    fn pending_owner(&self) -> Option<SessionId> {
        self.entries
            .iter()
            .find(|e| !e.is_committed())
            .map(|e| e.session)
    }

    fn newer_commit(&self, session: SessionId, boundary: Timestamp) -> Option<&ActionEntry> {
        self.entries.iter().find(|e| {
            e.session != session && matches!(e.commit_timestamp, Some(c) if c > boundary)
        })
    }

    fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.readers.is_empty()
    }
}

/// Version marker attached to one row slot
#[derive(Debug)]
pub struct RowAction {
    key: RowKey,
    chain: Mutex<Chain>,
}

impl RowAction {
    /// Marker for a freshly inserted row
    ///
    /// The row did not exist before this entry.
    pub fn inserted(key: RowKey, session: SessionId, action_timestamp: Timestamp) -> Self {
        let mut entries = SmallVec::new();
        entries.push(ActionEntry {
            kind: ActionType::Insert,
            session,
            action_timestamp,
            commit_timestamp: None,
        });
        Self::with_chain(key, false, entries)
    }

    /// Empty marker for a row that already exists as base data
    pub fn existing(key: RowKey) -> Self {
        Self::with_chain(key, true, SmallVec::new())
    }

    fn with_chain(key: RowKey, base_exists: bool, entries: SmallVec<[ActionEntry; 2]>) -> Self {
        Self {
            key,
            chain: Mutex::new(Chain {
                base_exists,
                entries,
                readers: SmallVec::new(),
                final_type: ActionType::None,
                detached: false,
            }),
        }
    }

    /// Identity of the row this marker belongs to
    pub fn key(&self) -> RowKey {
        self.key
    }

    /// Summary type of the most recent change
    pub fn action_type(&self) -> ActionType {
        let chain = self.chain.lock();
        if chain.final_type == ActionType::DeleteFinal {
            return ActionType::DeleteFinal;
        }
        let Some(last) = chain.entries.last() else {
            return ActionType::None;
        };
        let inserted_together = last.kind == ActionType::Delete
            && chain.entries.iter().any(|e| {
                e.kind == ActionType::Insert
                    && e.session == last.session
                    && e.commit_timestamp == last.commit_timestamp
            });
        if inserted_together {
            ActionType::InsertDelete
        } else {
            last.kind
        }
    }

    /// Session owning the uncommitted change, if any
    pub fn pending_owner(&self) -> Option<SessionId> {
        self.chain.lock().pending_owner()
    }

    /// Commit timestamp of the latest committed change
    pub fn last_commit_timestamp(&self) -> Option<Timestamp> {
        self.chain
            .lock()
            .entries
            .iter()
            .rev()
            .find_map(|e| e.commit_timestamp)
    }

    /// Whether the marker was detached from its row
    pub fn is_detached(&self) -> bool {
        self.chain.lock().detached
    }

    /// Whether the row was physically removable at detach time
    pub fn is_final(&self) -> bool {
        self.chain.lock().final_type == ActionType::DeleteFinal
    }

    /// Snapshot of the history, oldest first
    pub fn entries(&self) -> Vec<ActionEntry> {
        self.chain.lock().entries.to_vec()
    }

    /// Whether the row is visible to `session` at snapshot `boundary`
    pub fn is_visible(&self, session: SessionId, boundary: Timestamp) -> bool {
        self.chain.lock().visible(session, boundary)
    }

    /// Visibility check that also registers `session` as a reader
    ///
    /// Returns `None` when the marker was detached and must be looked up again.
    pub fn read_with_reference(&self, session: SessionId, boundary: Timestamp) -> Option<bool> {
        let mut chain = self.chain.lock();
        if chain.detached && chain.final_type != ActionType::DeleteFinal {
            return None;
        }
        let visible = chain.visible(session, boundary);
        if visible && !chain.readers.iter().any(|r| r.session == session) {
            chain.readers.push(Reader { session, boundary });
        }
        Some(visible)
    }

    /// Attach a pending delete by `session`
    ///
    /// Fails when another session has a pending change, when a change was
    /// committed after `boundary`, or when the row is not visible.
    pub fn add_delete(
        &self,
        session: SessionId,
        action_timestamp: Timestamp,
        boundary: Timestamp,
    ) -> Result<(), DeleteRefusal> {
        let mut chain = self.chain.lock();
        if chain.final_type == ActionType::DeleteFinal {
            return Err(DeleteRefusal::Invisible);
        }
        if chain.detached {
            return Err(DeleteRefusal::Stale);
        }
        if let Some(owner) = chain.pending_owner() {
            if owner != session {
                return Err(DeleteRefusal::Pending(owner));
            }
        }
        if let Some(entry) = chain.newer_commit(session, boundary) {
            return Err(DeleteRefusal::Conflict {
                session: entry.session,
                committed_at: entry.commit_timestamp.unwrap_or_default(),
            });
        }
        if !chain.visible(session, boundary) {
            return Err(DeleteRefusal::Invisible);
        }
        chain.entries.push(ActionEntry {
            kind: ActionType::Delete,
            session,
            action_timestamp,
            commit_timestamp: None,
        });
        Ok(())
    }

    /// First-committer-wins check for one of `session`'s rows
    ///
    /// Returns `false` if another session committed a change to this row
    /// after `boundary`. When `session` wrote the row, other sessions that
    /// registered a reference read are pushed onto `stale_readers`.
    pub fn can_commit(
        &self,
        session: SessionId,
        boundary: Timestamp,
        stale_readers: &mut Vec<SessionId>,
    ) -> bool {
        let chain = self.chain.lock();
        if chain.newer_commit(session, boundary).is_some() {
            return false;
        }
        let writes = chain
            .entries
            .iter()
            .any(|e| e.session == session && !e.is_committed());
        if writes {
            stale_readers.extend(
                chain
                    .readers
                    .iter()
                    .filter(|r| r.session != session)
                    .map(|r| r.session),
            );
        }
        true
    }

    /// First-committer-wins check for a row `session` only read
    ///
    /// Returns `false` if another session committed a change to this row
    /// after `boundary`.
    pub fn can_commit_read(&self, session: SessionId, boundary: Timestamp) -> bool {
        self.chain.lock().newer_commit(session, boundary).is_none()
    }

    /// Stamp every pending entry of `session` with `commit_timestamp`
    ///
    /// An insert and delete by the same transaction collapse into one
    /// `InsertDelete` entry. Returns the committed type, or `ActionType::None`
    /// if the session had no pending change here.
    pub fn commit(&self, session: SessionId, commit_timestamp: Timestamp) -> ActionType {
        let mut chain = self.chain.lock();
        chain.readers.retain(|r| r.session != session);

        let mut inserted = false;
        let mut deleted = false;
        let mut first_action = None;
        chain.entries.retain(|e| {
            if e.session == session && !e.is_committed() {
                inserted |= e.kind == ActionType::Insert;
                deleted |= e.kind == ActionType::Delete;
                first_action.get_or_insert(e.action_timestamp);
                false
            } else {
                true
            }
        });

        let kind = match (inserted, deleted) {
            (true, true) => ActionType::InsertDelete,
            (true, false) => ActionType::Insert,
            (false, true) => ActionType::Delete,
            (false, false) => return ActionType::None,
        };
        chain.entries.push(ActionEntry {
            kind,
            session,
            action_timestamp: first_action.unwrap_or(commit_timestamp),
            commit_timestamp: Some(commit_timestamp),
        });
        kind
    }

    /// Drop the reference-read registration of `session`
    pub fn remove_reader(&self, session: SessionId) {
        self.chain.lock().readers.retain(|r| r.session != session);
    }

    /// Discard `session`'s most recent pending entry
    ///
    /// Undoing one action at a time, newest first, leaves entries made
    /// before a savepoint in place even when they share its action
    /// timestamp. Returns true if an entry was removed.
    pub fn rollback(&self, session: SessionId) -> bool {
        let mut chain = self.chain.lock();
        let last = chain
            .entries
            .iter()
            .rposition(|e| e.session == session && !e.is_committed());
        match last {
            Some(index) => {
                chain.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Fold committed entries older than `horizon` into the base state
    ///
    /// Folding stops at the first entry that is pending or not yet older
    /// than every live snapshot. Repeated calls are harmless: folded entries
    /// are gone and a detached marker reports nothing to do.
    pub fn merge(&self, horizon: Timestamp) -> MergeOutcome {
        let mut chain = self.chain.lock();
        if chain.detached {
            return MergeOutcome::default();
        }

        let mut outcome = MergeOutcome::default();
        while let Some(first) = chain.entries.first() {
            match first.commit_timestamp {
                Some(c) if c < horizon => {}
                _ => break,
            }
            let entry = chain.entries.remove(0);
            chain.base_exists = !entry.kind.removes_row();
            outcome.folded += 1;
        }

        if chain.entries.is_empty() {
            if !chain.base_exists && chain.final_type != ActionType::DeleteFinal {
                chain.final_type = ActionType::DeleteFinal;
                outcome.delete_row = true;
            }
            if chain.is_idle() || chain.final_type == ActionType::DeleteFinal {
                chain.detached = true;
                outcome.detach = true;
            }
        }
        outcome
    }
}
