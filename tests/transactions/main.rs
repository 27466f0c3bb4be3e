//! Transaction Manager Integration Tests
//!
//! Tests for basalt through the public facade: snapshot visibility,
//! first-committer-wins, rollback, merge, lock waits and mixed workloads.

#[path = "../common/mod.rs"]
mod common;

mod catalog_locks;
mod first_committer_wins;
mod properties;
mod rollback;
mod snapshot_isolation;
