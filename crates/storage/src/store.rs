//! Table registry
//!
//! # Design
//!
//! - DashMap by TableId: lock-free reads, sharded writes
//! - Name index: second DashMap from name to TableId
//! - Tables are never renamed; drop is not supported
//!
//! # Thread Safety
//!
//! All operations are thread-safe. Creating a table is serialized by the
//! catalog lock above this layer; the registry itself only guarantees that
//! two concurrent creates of the same name cannot both succeed.

use crate::row::Row;
use crate::table::{Table, TableMeta};
use basalt_core::{Error, Result, RowKey, TableId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Registry of all tables
pub struct Store {
    tables: DashMap<TableId, Arc<Table>>,
    names: DashMap<String, TableId>,
    next_table_id: AtomicU32,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            names: DashMap::new(),
            next_table_id: AtomicU32::new(1),
        }
    }

    /// Register a new table
    ///
    /// Fails with [`Error::TableExists`] if the name is taken.
    pub fn create_table(&self, meta: TableMeta) -> Result<Arc<Table>> {
        match self.names.entry(meta.name.clone()) {
            Entry::Occupied(_) => Err(Error::TableExists(meta.name)),
            Entry::Vacant(slot) => {
                let id = TableId::new(self.next_table_id.fetch_add(1, Ordering::AcqRel));
                let table = Arc::new(Table::new(id, meta));
                self.tables.insert(id, Arc::clone(&table));
                slot.insert(id);
                tracing::debug!(table = %table.name(), id = %id, "table created");
                Ok(table)
            }
        }
    }

    /// Table by identifier
    #[inline]
    pub fn table(&self, id: TableId) -> Option<Arc<Table>> {
        self.tables.get(&id).map(|t| Arc::clone(t.value()))
    }

    /// Table by name
    pub fn table_by_name(&self, name: &str) -> Result<Arc<Table>> {
        self.names
            .get(name)
            .and_then(|id| self.table(*id.value()))
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Number of tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Row by persistent identity
    #[inline]
    pub fn row(&self, key: RowKey) -> Option<Arc<Row>> {
        self.table(key.table).and_then(|t| t.get(key.position))
    }

    /// Physically delete a row
    ///
    /// Fails with [`Error::RowNotFound`] if the table or row is gone.
    pub fn remove_row(&self, key: RowKey) -> Result<Arc<Row>> {
        self.table(key.table)
            .and_then(|t| t.remove(key.position))
            .ok_or(Error::RowNotFound(key))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("table_count", &self.table_count())
            .finish()
    }
}
