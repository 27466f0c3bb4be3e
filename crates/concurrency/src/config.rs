//! Transaction manager configuration
//!
//! Built in code through the database builder or parsed from TOML:
//!
//! ```toml
//! control = "mvcc"
//! default_isolation = "repeatable_read"
//! lock_wait_timeout_ms = 5000
//! max_redo_attempts = 16
//! ```

use basalt_core::{Error, IsolationLevel, Result, TransactionControl};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of times a statement is redone before giving up
pub const DEFAULT_MAX_REDO_ATTEMPTS: u32 = 16;

/// Transaction manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Concurrency strategy at startup
    pub control: TransactionControl,
    /// Isolation level given to new sessions
    pub default_isolation: IsolationLevel,
    /// How long a session waits for a lock; `None` waits forever
    pub lock_wait_timeout_ms: Option<u64>,
    /// Statement redo limit under READ COMMITTED
    pub max_redo_attempts: u32,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            control: TransactionControl::Mvcc,
            default_isolation: IsolationLevel::ReadCommitted,
            lock_wait_timeout_ms: None,
            max_redo_attempts: DEFAULT_MAX_REDO_ATTEMPTS,
        }
    }
}

impl TransactionConfig {
    /// Parse settings from TOML; missing keys take defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    /// Lock wait timeout as a duration
    pub fn lock_wait_timeout(&self) -> Option<Duration> {
        self.lock_wait_timeout_ms.map(Duration::from_millis)
    }
}
