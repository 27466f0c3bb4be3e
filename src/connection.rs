//! Session handle
//!
//! A `Connection` runs statements against the store on behalf of one session.
//! Each call is one statement: it asks the transaction manager for a permit,
//! does its row work, and in autocommit mode commits right away.
//!
//! Under READ COMMITTED a delete that runs into another session's change is
//! redone: the manager rolls the statement back and raises the session's redo
//! flag, the connection waits for the other session if it is still open, and
//! then runs the statement again with a fresh statement timestamp.

use crate::error::{Error, Result};
use basalt_concurrency::{ReadMode, Session, StatementInfo, TransactionManager};
use basalt_core::{IsolationLevel, RowKey, SessionId, TableId, TransactionControl, Value};
use basalt_storage::{Table, TableMeta, TableType};
use std::sync::Arc;
use tracing::debug;

/// A database session
///
/// Dropping the connection rolls back any open transaction.
pub struct Connection {
    manager: Arc<TransactionManager>,
    session: Arc<Session>,
    autocommit: bool,
}

impl Connection {
    pub(crate) fn new(manager: Arc<TransactionManager>) -> Self {
        let session = manager.create_session();
        Self {
            manager,
            session,
            autocommit: true,
        }
    }

    /// Session identifier
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Underlying session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.session.is_in_transaction()
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Current isolation level
    pub fn isolation(&self) -> IsolationLevel {
        self.session.isolation()
    }

    /// Change the isolation level; refused inside a transaction
    pub fn set_isolation(&self, isolation: IsolationLevel) -> Result<()> {
        self.session.set_isolation(isolation).map_err(Into::into)
    }

    /// Whether each statement commits on its own
    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    /// Switch autocommit; turning it on commits the open transaction
    pub fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        if autocommit && !self.autocommit {
            self.commit()?;
        }
        self.autocommit = autocommit;
        Ok(())
    }

    /// Switch the database's concurrency strategy
    ///
    /// Refused while other sessions have open transactions.
    pub fn set_transaction_control(&self, control: TransactionControl) -> Result<()> {
        self.manager
            .set_transaction_control(&self.session, control)
            .map_err(Into::into)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Create a table of the given residency
    pub fn create_table(&self, name: &str, table_type: TableType) -> Result<TableId> {
        self.create_table_with(TableMeta::new(name, table_type))
    }

    /// Create a table from a full description
    pub fn create_table_with(&self, meta: TableMeta) -> Result<TableId> {
        let stmt = StatementInfo::catalog_change(&meta.name);
        self.execute(&stmt, |manager, _| {
            manager.store().create_table(meta.clone()).map(|t| Some(t.id()))
        })
    }

    /// Insert a row, returning its key
    pub fn insert(&self, table: &str, values: Vec<Value>) -> Result<RowKey> {
        let table = self.table(table)?;
        let stmt = StatementInfo::write(table.name());
        self.execute(&stmt, |manager, session| {
            let row = manager.add_insert_action(session, &table, values.clone())?;
            Ok(Some(row.key()))
        })
    }

    /// Delete the row at `key`; returns false if it is not visible
    pub fn delete(&self, table: &str, key: RowKey) -> Result<bool> {
        let table = self.table(table)?;
        let stmt = StatementInfo::write(table.name());
        self.execute(&stmt, |manager, session| {
            let Some(row) = table.get(key.position) else {
                return Ok(Some(false));
            };
            if !manager.can_read(session, &row, table.table_type(), ReadMode::Read) {
                return Ok(Some(false));
            }
            Ok(manager
                .add_delete_action(session, &table, &row)?
                .then_some(true))
        })
    }

    /// Delete every visible row matching `predicate`; returns the count
    pub fn delete_where<P>(&self, table: &str, mut predicate: P) -> Result<usize>
    where
        P: FnMut(&[Value]) -> bool,
    {
        let table = self.table(table)?;
        let stmt = StatementInfo::write(table.name());
        self.execute(&stmt, |manager, session| {
            let mut deleted = 0;
            for row in table.rows() {
                if !manager.can_read(session, &row, table.table_type(), ReadMode::Read)
                    || !predicate(row.values())
                {
                    continue;
                }
                if !manager.add_delete_action(session, &table, &row)? {
                    return Ok(None);
                }
                deleted += 1;
            }
            Ok(Some(deleted))
        })
    }

    /// Values of the row at `key`, if visible
    pub fn get(&self, table: &str, key: RowKey) -> Result<Option<Vec<Value>>> {
        let table = self.table(table)?;
        let stmt = StatementInfo::read(&[table.name()]);
        let mode = self.read_mode();
        self.execute(&stmt, |manager, session| {
            let values = table
                .get(key.position)
                .filter(|row| manager.can_read(session, row, table.table_type(), mode))
                .map(|row| row.values().to_vec());
            Ok(Some(values))
        })
    }

    /// Every visible row, ordered by position
    pub fn scan(&self, table: &str) -> Result<Vec<(RowKey, Vec<Value>)>> {
        let table = self.table(table)?;
        let stmt = StatementInfo::read(&[table.name()]);
        let mode = self.read_mode();
        self.execute(&stmt, |manager, session| {
            let rows = table
                .rows()
                .into_iter()
                .filter(|row| manager.can_read(session, row, table.table_type(), mode))
                .map(|row| (row.key(), row.values().to_vec()))
                .collect();
            Ok(Some(rows))
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Commit the open transaction
    ///
    /// A transaction invalidated by a concurrent commit is rolled back and
    /// reported as [`Error::SerializationFailure`].
    pub fn commit(&self) -> Result<()> {
        match self.manager.commit_transaction(&self.session) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.manager.rollback(&self.session);
                Err(Error::SerializationFailure(format!(
                    "{} rolled back: a concurrent transaction changed the same rows",
                    self.session.id()
                )))
            }
            Err(e) => {
                self.manager.rollback(&self.session);
                Err(e.into())
            }
        }
    }

    /// Roll back the open transaction
    pub fn rollback(&self) {
        self.manager.rollback(&self.session);
    }

    /// Set a named savepoint, starting a transaction if needed
    pub fn savepoint(&self, name: &str) {
        self.manager.savepoint(&self.session, name);
    }

    /// Forget a savepoint
    pub fn release_savepoint(&self, name: &str) -> Result<()> {
        self.manager
            .release_savepoint(&self.session, name)
            .map_err(Into::into)
    }

    /// Undo everything done after savepoint `name`
    pub fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.manager
            .rollback_savepoint(&self.session, name)
            .map_err(Into::into)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.manager.store().table_by_name(name).map_err(Into::into)
    }

    fn read_mode(&self) -> ReadMode {
        match self.session.isolation() {
            IsolationLevel::Serializable => ReadMode::Reference,
            _ => ReadMode::Read,
        }
    }

    /// Run one statement, redoing it while the body reports a conflict
    ///
    /// The body returns `Ok(None)` when the manager asked for a redo.
    fn execute<T, F>(&self, stmt: &StatementInfo, mut body: F) -> Result<T>
    where
        F: FnMut(&TransactionManager, &Session) -> basalt_core::Result<Option<T>>,
    {
        let limit = self.manager.config().max_redo_attempts;
        let mut redone = 0;
        loop {
            if let Err(e) = self.manager.begin_action(&self.session, stmt) {
                return Err(self.abandon(e));
            }
            match body(self.manager.as_ref(), self.session.as_ref()) {
                Ok(Some(value)) => {
                    if self.autocommit {
                        self.commit()?;
                    }
                    return Ok(value);
                }
                Ok(None) => {
                    self.session.take_redo();
                    redone += 1;
                    if redone > limit {
                        return Err(self.abandon(basalt_core::Error::serialization(format!(
                            "statement still conflicting after {} attempts",
                            limit
                        ))));
                    }
                    if let Err(e) = self.manager.await_wakeup(&self.session) {
                        return Err(self.abandon(e));
                    }
                    debug!(session = %self.session.id(), attempt = redone, "redoing statement");
                }
                Err(e) => return Err(self.abandon(e)),
            }
        }
    }

    /// Undo a failed statement; in autocommit mode the whole transaction
    fn abandon(&self, err: basalt_core::Error) -> Error {
        if self.autocommit {
            self.manager.rollback(&self.session);
        } else {
            self.manager.rollback_action(&self.session);
        }
        err.into()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.manager.close_session(&self.session);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session", &self.session.id())
            .field("autocommit", &self.autocommit)
            .finish()
    }
}
