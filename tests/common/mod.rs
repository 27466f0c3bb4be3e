//! Shared helpers for integration tests

#![allow(dead_code)]

pub use basalt::prelude::*;
pub use basalt::{MemoryLog, TransactionConfig};

use std::sync::Once;
use std::time::{Duration, Instant};

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Database with a single Memory table `t`
pub fn db_with_table(table_type: TableType) -> Database {
    init_tracing();
    let db = Database::ephemeral();
    db.connect().create_table("t", table_type).unwrap();
    db
}

/// Insert `values` into `table` in one committed transaction each
pub fn seed(conn: &Connection, table: &str, values: &[i64]) -> Vec<RowKey> {
    values
        .iter()
        .map(|v| conn.insert(table, vec![Value::Int(*v)]).unwrap())
        .collect()
}

/// First column of every visible row
pub fn ints(conn: &Connection, table: &str) -> Vec<i64> {
    conn.scan(table)
        .unwrap()
        .iter()
        .filter_map(|(_, values)| values[0].as_int())
        .collect()
}

/// Connection with autocommit off and the given isolation
pub fn manual(db: &Database, isolation: IsolationLevel) -> Connection {
    let mut conn = db.connect();
    conn.set_isolation(isolation).unwrap();
    conn.set_autocommit(false).unwrap();
    conn
}

/// Stored rows of `table`, including versions not merged yet
pub fn stored_rows(db: &Database, table: &str) -> usize {
    db.manager().store().table_by_name(table).unwrap().len()
}

/// Spin until `cond` holds; panic after five seconds
pub fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(2));
    }
}
