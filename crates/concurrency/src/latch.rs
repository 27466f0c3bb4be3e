//! Counting latch used to park a session's thread
//!
//! A session waiting for a lock sets its latch to the number of sessions it
//! waits for; each of those counts it down when its transaction ends.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Countdown latch
#[derive(Debug, Default)]
pub struct CountDownLatch {
    count: Mutex<usize>,
    zero: Condvar,
}

impl CountDownLatch {
    /// Create an open latch (count zero)
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Replace the count
    pub fn set_count(&self, count: usize) {
        let mut guard = self.count.lock();
        *guard = count;
        if count == 0 {
            self.zero.notify_all();
        }
    }

    /// Add one to the count
    pub fn count_up(&self) {
        *self.count.lock() += 1;
    }

    /// Subtract one from the count, waking waiters at zero
    pub fn count_down(&self) {
        let mut guard = self.count.lock();
        if *guard > 0 {
            *guard -= 1;
        }
        if *guard == 0 {
            self.zero.notify_all();
        }
    }

    /// Block until the count is zero
    ///
    /// With a timeout, returns `false` if it elapsed first.
    pub fn await_zero(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.count.lock();
        let deadline = timeout.map(|t| Instant::now() + t);
        while *guard > 0 {
            match deadline {
                Some(deadline) => {
                    if self.zero.wait_until(&mut guard, deadline).timed_out() {
                        return *guard == 0;
                    }
                }
                None => self.zero.wait(&mut guard),
            }
        }
        true
    }
}
