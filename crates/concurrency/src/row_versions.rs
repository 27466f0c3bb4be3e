//! Global row-version map
//!
//! Disk-resident rows may be evicted and reloaded, so their version markers
//! cannot live on the row object. This map keeps them by persistent row
//! identity instead. Memory-resident rows never appear here.

use basalt_core::RowKey;
use basalt_storage::RowAction;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

/// Row identity to current version marker
#[derive(Debug, Default)]
pub struct RowVersionMap {
    actions: DashMap<RowKey, Arc<RowAction>, BuildHasherDefault<FxHasher>>,
}

impl RowVersionMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Current marker for `key`
    #[inline]
    pub fn get(&self, key: RowKey) -> Option<Arc<RowAction>> {
        self.actions.get(&key).map(|a| Arc::clone(a.value()))
    }

    /// Install a marker, replacing any previous one
    pub fn insert(&self, action: Arc<RowAction>) {
        self.actions.insert(action.key(), action);
    }

    /// Return the marker for `key`, creating one if absent
    ///
    /// A detached marker is replaced unless it recorded a final delete.
    pub fn get_or_insert_with<F>(&self, key: RowKey, make: F) -> Arc<RowAction>
    where
        F: FnOnce() -> RowAction,
    {
        match self.actions.entry(key) {
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                if !current.is_detached() || current.is_final() {
                    Arc::clone(current)
                } else {
                    let action = Arc::new(make());
                    slot.insert(Arc::clone(&action));
                    action
                }
            }
            Entry::Vacant(slot) => {
                let action = Arc::new(make());
                slot.insert(Arc::clone(&action));
                action
            }
        }
    }

    /// Remove the entry for `key` if it is still `action`
    pub fn remove_if_same(&self, key: RowKey, action: &Arc<RowAction>) -> bool {
        self.actions
            .remove_if(&key, |_, current| Arc::ptr_eq(current, action))
            .is_some()
    }

    /// Number of tracked rows
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if no row is tracked
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
