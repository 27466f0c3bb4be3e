//! Main database entry point for Basalt.
//!
//! This module provides the `Database` struct, which owns the row store and
//! the transaction manager, and hands out [`Connection`]s.

use crate::connection::Connection;
use crate::error::Result;
use basalt_concurrency::{DegradedEvent, TransactionConfig, TransactionManager};
use basalt_core::{IsolationLevel, TransactionControl};
use basalt_durability::{NullLog, RedoLog};
use basalt_storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// The Basalt database.
///
/// Cheap to clone; clones share the same store and transaction manager.
///
/// # Example
///
/// ```ignore
/// use basalt::prelude::*;
///
/// let db = Database::ephemeral();
/// let conn = db.connect();
/// conn.create_table("accounts", TableType::Memory)?;
/// conn.insert("accounts", vec![Value::Int(1), Value::Int(100)])?;
/// ```
#[derive(Clone)]
pub struct Database {
    manager: Arc<TransactionManager>,
}

impl Database {
    /// Create an in-memory database that logs nothing.
    pub fn ephemeral() -> Self {
        Self::builder().open()
    }

    /// Create a builder for database configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = Database::builder()
    ///     .isolation(IsolationLevel::RepeatableRead)
    ///     .lock_wait_timeout(Duration::from_secs(5))
    ///     .open();
    /// ```
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Open a new session.
    pub fn connect(&self) -> Connection {
        Connection::new(Arc::clone(&self.manager))
    }

    /// Transaction manager behind this database.
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Current concurrency strategy.
    pub fn transaction_control(&self) -> TransactionControl {
        self.manager.get_transaction_control()
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.manager.store().table_count()
    }

    /// Fold committed versions that no open transaction still needs.
    pub fn merge_expired(&self) {
        self.manager.merge_expired_transactions();
    }

    /// Drain best-effort failures (row log writes, row removal).
    pub fn degraded_events(&self) -> Vec<DegradedEvent> {
        self.manager.take_degraded_events()
    }

    /// Get database metrics.
    pub fn metrics(&self) -> DatabaseMetrics {
        let txn_metrics = self.manager.metrics();
        DatabaseMetrics {
            transactions_committed: txn_metrics.committed,
            transactions_rolled_back: txn_metrics.rolled_back,
            serialization_failures: txn_metrics.serialization_failures,
            transactions_active: txn_metrics.live_transactions,
            queued_commits: txn_metrics.queued_commits,
            rows_merged: txn_metrics.rows_merged,
            degraded_events: txn_metrics.degraded_events,
            commit_rate: txn_metrics.commit_rate(),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("manager", &self.manager)
            .finish()
    }
}

/// Database metrics.
#[derive(Debug, Clone)]
pub struct DatabaseMetrics {
    /// Total committed transactions
    pub transactions_committed: u64,
    /// Total rolled back transactions
    pub transactions_rolled_back: u64,
    /// Commits and statements refused by conflict checks
    pub serialization_failures: u64,
    /// Currently open transactions
    pub transactions_active: usize,
    /// Committed transactions waiting for merge
    pub queued_commits: usize,
    /// Committed row versions folded into base rows
    pub rows_merged: u64,
    /// Best-effort failures recorded
    pub degraded_events: u64,
    /// Commit success rate (0.0 - 1.0)
    pub commit_rate: f64,
}

/// Builder for database configuration.
///
/// # Example
///
/// ```ignore
/// // Snapshot isolation with table locks
/// let db = Database::builder()
///     .isolation(IsolationLevel::Serializable)
///     .transaction_control(TransactionControl::Locks)
///     .open();
///
/// // Settings from a TOML file
/// let db = Database::builder()
///     .config_toml(&std::fs::read_to_string("basalt.toml")?)?
///     .log(Arc::new(MemoryLog::new()))
///     .open();
/// ```
pub struct DatabaseBuilder {
    config: TransactionConfig,
    log: Arc<dyn RedoLog>,
}

impl std::fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DatabaseBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: TransactionConfig::default(),
            log: Arc::new(NullLog),
        }
    }

    /// Replace every transaction setting.
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace every transaction setting with ones parsed from TOML.
    pub fn config_toml(mut self, toml: &str) -> Result<Self> {
        self.config = TransactionConfig::from_toml_str(toml)?;
        Ok(self)
    }

    /// Isolation level for new connections.
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.config.default_isolation = isolation;
        self
    }

    /// Concurrency strategy at startup.
    pub fn transaction_control(mut self, control: TransactionControl) -> Self {
        self.config.control = control;
        self
    }

    /// Give up waiting for another session after `timeout`.
    pub fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_wait_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// How often a READ COMMITTED statement is redone after conflicts.
    pub fn max_redo_attempts(mut self, attempts: u32) -> Self {
        self.config.max_redo_attempts = attempts;
        self
    }

    /// Redo log receiving committed changes.
    pub fn log(mut self, log: Arc<dyn RedoLog>) -> Self {
        self.log = log;
        self
    }

    /// Open the database.
    pub fn open(self) -> Database {
        let store = Arc::new(Store::new());
        Database {
            manager: Arc::new(TransactionManager::new(store, self.log, self.config)),
        }
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
