//! Concurrency layer for basalt
//!
//! This crate implements multi-version concurrency control with:
//! - GlobalClock: one timestamp source for snapshots and commits
//! - TransactionManager: begin, commit, rollback and merge of row versions
//! - Snapshot isolation for REPEATABLE READ and SERIALIZABLE, per-statement
//!   snapshots for READ COMMITTED
//! - Catalog and table lock waits with deadlock refusal

#![warn(missing_docs)]
#![warn(clippy::all)]

mod catalog;
pub mod clock;
pub mod commit_queue;
pub mod config;
pub mod latch;
pub mod live;
pub mod manager;
pub mod metrics;
pub mod row_versions;
pub mod session;
pub mod statement;
pub mod wait_graph;

pub use clock::GlobalClock;
pub use config::TransactionConfig;
pub use latch::CountDownLatch;
pub use manager::{ActionPermit, DegradedEvent, DegradedKind, ReadMode, TransactionManager};
pub use metrics::TransactionMetrics;
pub use session::{ActionRecord, RecordKind, Savepoint, Session};
pub use statement::{Statement, StatementInfo};
pub use wait_graph::WaitGraph;
