//! Catalog and table lock coordination
//!
//! Under MVCC, ordinary statements never wait here. A catalog-changing
//! statement must wait for every other transacting session, and everyone
//! waits for an active catalog writer. Under [`TransactionControl::Locks`]
//! statements additionally take shared/exclusive table locks held until
//! their transaction ends.
//!
//! Waits are recorded in a [`WaitGraph`]; a wait that would close a cycle
//! is refused instead of granted.

use crate::statement::Statement;
use crate::wait_graph::WaitGraph;
use basalt_core::{SessionId, TransactionControl};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub(crate) struct CatalogLocks {
    catalog_writer: Option<SessionId>,
    table_writers: FxHashMap<String, SessionId>,
    table_readers: FxHashMap<String, FxHashSet<SessionId>>,
    graph: WaitGraph,
}

impl CatalogLocks {
    pub(crate) fn catalog_writer(&self) -> Option<SessionId> {
        self.catalog_writer
    }

    pub(crate) fn graph(&self) -> &WaitGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut WaitGraph {
        &mut self.graph
    }

    /// Sessions `session` must wait for before running `stmt`
    pub(crate) fn blockers(
        &self,
        session: SessionId,
        stmt: &dyn Statement,
        control: TransactionControl,
        transacting: &BTreeSet<SessionId>,
    ) -> Vec<SessionId> {
        let mut blockers = BTreeSet::new();
        blockers.extend(self.catalog_writer);
        if stmt.is_catalog_change() {
            blockers.extend(transacting.iter().copied().filter(|s| *s != session));
        }

        if control == TransactionControl::Locks {
            for table in stmt.table_names_for_write() {
                if let Some(writer) = self.table_writers.get(table) {
                    blockers.insert(*writer);
                }
                if let Some(readers) = self.table_readers.get(table) {
                    blockers.extend(readers.iter().copied());
                }
            }
            for table in stmt.table_names_for_read() {
                if let Some(writer) = self.table_writers.get(table) {
                    blockers.insert(*writer);
                }
            }
        }

        blockers.remove(&session);
        blockers.into_iter().collect()
    }

    /// Record the locks `stmt` holds until `session`'s transaction ends
    pub(crate) fn grant(
        &mut self,
        session: SessionId,
        stmt: &dyn Statement,
        control: TransactionControl,
    ) {
        if stmt.is_catalog_change() {
            self.catalog_writer = Some(session);
        }
        if control != TransactionControl::Locks {
            return;
        }
        for table in stmt.table_names_for_write() {
            self.table_writers.insert(table.clone(), session);
        }
        for table in stmt.table_names_for_read() {
            self.table_readers
                .entry(table.clone())
                .or_default()
                .insert(session);
        }
    }

    /// Drop everything `session` holds or waits for
    ///
    /// Returns the sessions that were waiting for `session`; each must have
    /// its latch counted down once.
    pub(crate) fn release(&mut self, session: SessionId) -> Vec<SessionId> {
        if self.catalog_writer == Some(session) {
            self.catalog_writer = None;
        }
        self.table_writers.retain(|_, writer| *writer != session);
        self.table_readers.retain(|_, readers| {
            readers.remove(&session);
            !readers.is_empty()
        });
        self.graph.clear_waits(session);
        self.graph.release(session)
    }

    /// Whether `session` holds any table lock
    pub(crate) fn holds_table_locks(&self, session: SessionId) -> bool {
        self.table_writers.values().any(|w| *w == session)
            || self.table_readers.values().any(|r| r.contains(&session))
    }
}
