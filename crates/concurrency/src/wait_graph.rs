//! Wait-for graph between sessions
//!
//! Edges point from a waiting session to each session it waits for. The
//! graph is plain session-id adjacency, so cycle checks never chase live
//! session objects.

use basalt_core::SessionId;
use rustc_hash::{FxHashMap, FxHashSet};

/// Explicit wait-for graph
#[derive(Debug, Default)]
pub struct WaitGraph {
    waits_for: FxHashMap<SessionId, FxHashSet<SessionId>>,
}

impl WaitGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether letting `waiter` wait for `blockers` would close a cycle
    ///
    /// Depth-first search from every blocker; a path back to `waiter` means
    /// granting the wait deadlocks.
    pub fn would_deadlock(&self, waiter: SessionId, blockers: &[SessionId]) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack: Vec<SessionId> = blockers.to_vec();
        while let Some(current) = stack.pop() {
            if current == waiter {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = self.waits_for.get(&current) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// Record that `waiter` waits for each of `blockers`
    ///
    /// Returns how many edges were new.
    pub fn add_waits(&mut self, waiter: SessionId, blockers: &[SessionId]) -> usize {
        let edges = self.waits_for.entry(waiter).or_default();
        blockers.iter().filter(|b| edges.insert(**b)).count()
    }

    /// Sessions `waiter` currently waits for
    pub fn blockers_of(&self, waiter: SessionId) -> Vec<SessionId> {
        let mut out: Vec<_> = self
            .waits_for
            .get(&waiter)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Sessions waiting for `blocker`
    pub fn waiters_of(&self, blocker: SessionId) -> Vec<SessionId> {
        let mut out: Vec<_> = self
            .waits_for
            .iter()
            .filter(|(_, blockers)| blockers.contains(&blocker))
            .map(|(waiter, _)| *waiter)
            .collect();
        out.sort();
        out
    }

    /// Drop every edge into `blocker`, returning the released waiters
    pub fn release(&mut self, blocker: SessionId) -> Vec<SessionId> {
        let mut released = Vec::new();
        for (waiter, blockers) in self.waits_for.iter_mut() {
            if blockers.remove(&blocker) {
                released.push(*waiter);
            }
        }
        self.waits_for.retain(|_, blockers| !blockers.is_empty());
        released.sort();
        released
    }

    /// Drop every edge out of `waiter`
    pub fn clear_waits(&mut self, waiter: SessionId) {
        self.waits_for.remove(&waiter);
    }

    /// Whether `waiter` waits for anyone
    pub fn is_waiting(&self, waiter: SessionId) -> bool {
        self.waits_for.contains_key(&waiter)
    }
}
