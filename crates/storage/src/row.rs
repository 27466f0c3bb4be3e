//! Physical rows
//!
//! A row is immutable once created; changes are expressed by inserting new
//! rows and marking old ones deleted. Memory-resident rows carry their
//! version marker inline; disk-resident rows leave the slot empty and are
//! tracked by the transaction manager's row-version map instead.

use crate::row_action::RowAction;
use basalt_core::{RowKey, RowPosition, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A stored row
#[derive(Debug)]
pub struct Row {
    key: RowKey,
    values: Vec<Value>,
    /// Inline version marker (memory-resident tables only)
    action: Mutex<Option<Arc<RowAction>>>,
    removed: AtomicBool,
}

impl Row {
    /// Create a row with no version marker
    pub fn new(key: RowKey, values: Vec<Value>) -> Self {
        Self {
            key,
            values,
            action: Mutex::new(None),
            removed: AtomicBool::new(false),
        }
    }

    /// Persistent identity
    pub fn key(&self) -> RowKey {
        self.key
    }

    /// Position within the owning table
    pub fn position(&self) -> RowPosition {
        self.key.position
    }

    /// Column values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Current inline version marker
    pub fn action(&self) -> Option<Arc<RowAction>> {
        self.action.lock().clone()
    }

    /// Install `action` as the inline marker
    pub fn set_action(&self, action: Arc<RowAction>) {
        *self.action.lock() = Some(action);
    }

    /// Return the inline marker, creating one if the slot is empty
    ///
    /// A marker that was detached by a merge is replaced, unless it recorded
    /// the row as finally deleted.
    pub fn action_or_insert_with<F>(&self, make: F) -> Arc<RowAction>
    where
        F: FnOnce() -> RowAction,
    {
        let mut slot = self.action.lock();
        match slot.as_ref() {
            Some(existing) if !existing.is_detached() || existing.is_final() => {
                Arc::clone(existing)
            }
            _ => {
                let action = Arc::new(make());
                *slot = Some(Arc::clone(&action));
                action
            }
        }
    }

    /// Clear the inline marker if it is still `action`
    pub fn clear_action_if(&self, action: &Arc<RowAction>) -> bool {
        let mut slot = self.action.lock();
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, action) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Mark the row as physically removed from its table
    pub fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Whether the row was physically removed
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}
