//! Tables
//!
//! Rows live in a DashMap keyed by position (lock-free reads, sharded
//! writes), hashed with FxHash.

use crate::row::Row;
use basalt_core::{RowKey, RowPosition, TableId, Value};
use dashmap::DashMap;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type RowMap = DashMap<RowPosition, Arc<Row>, BuildHasherDefault<FxHasher>>;

/// Where a table's rows reside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    /// Memory-resident, version marker inline on the row
    #[default]
    Memory,
    /// Disk-resident, version marker in the global row-version map
    Cached,
    /// Session-scoped scratch table, never logged
    Temp,
}

impl TableType {
    /// Whether rows of this table carry their version marker inline
    pub fn keeps_action_inline(&self) -> bool {
        !matches!(self, TableType::Cached)
    }
}

/// Structural description of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Table name (unique within a store)
    pub name: String,
    /// Residency
    pub table_type: TableType,
    /// Whether changes are written to the redo log
    pub is_logged: bool,
    /// Whether any column holds large objects
    pub has_lob_column: bool,
}

impl TableMeta {
    /// Logged table without large objects
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            table_type,
            is_logged: table_type != TableType::Temp,
            has_lob_column: false,
        }
    }

    /// Set whether changes are logged (temp tables never are)
    pub fn logged(mut self, logged: bool) -> Self {
        self.is_logged = logged && self.table_type != TableType::Temp;
        self
    }

    /// Mark the table as holding large-object columns
    pub fn with_lob_column(mut self) -> Self {
        self.has_lob_column = true;
        self
    }
}

/// A table of rows
#[derive(Debug)]
pub struct Table {
    id: TableId,
    meta: TableMeta,
    rows: RowMap,
    next_position: AtomicU64,
}

impl Table {
    /// Create an empty table
    pub fn new(id: TableId, meta: TableMeta) -> Self {
        Self {
            id,
            meta,
            rows: RowMap::default(),
            next_position: AtomicU64::new(1),
        }
    }

    /// Table identifier
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Structural description
    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    /// Residency of the rows
    pub fn table_type(&self) -> TableType {
        self.meta.table_type
    }

    /// Store a new row at a fresh position
    pub fn insert_row(&self, values: Vec<Value>) -> Arc<Row> {
        self.insert_row_with(values, |_| {})
    }

    /// Store a new row, running `before_publish` before other threads can see it
    ///
    /// Used to attach the version marker of an uncommitted insert, so no
    /// reader ever observes the row without it.
    pub fn insert_row_with<F>(&self, values: Vec<Value>, before_publish: F) -> Arc<Row>
    where
        F: FnOnce(&Row),
    {
        let position = RowPosition::new(self.next_position.fetch_add(1, Ordering::AcqRel));
        let row = Arc::new(Row::new(RowKey::new(self.id, position), values));
        before_publish(&row);
        self.rows.insert(position, Arc::clone(&row));
        row
    }

    /// Row at `position`
    #[inline]
    pub fn get(&self, position: RowPosition) -> Option<Arc<Row>> {
        self.rows.get(&position).map(|r| Arc::clone(r.value()))
    }

    /// Physically delete the row at `position`
    pub fn remove(&self, position: RowPosition) -> Option<Arc<Row>> {
        self.rows.remove(&position).map(|(_, row)| {
            row.mark_removed();
            row
        })
    }

    /// Number of stored rows, including versions not yet merged
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table stores no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All stored rows, ordered by position
    pub fn rows(&self) -> Vec<Arc<Row>> {
        let mut rows: Vec<_> = self.rows.iter().map(|r| Arc::clone(r.value())).collect();
        rows.sort_by_key(|r| r.position());
        rows
    }
}
