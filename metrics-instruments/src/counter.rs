use std::sync::atomic::Ordering;

use crate::atomics::AtomicI64;

/// A counter.
///
/// An atomic integer that can be incremented and decremented.  Unlike a [`Meter`](crate::Meter),
/// it tracks no rates, and it may go down as well as up.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Creates a new `Counter` starting at zero.
    pub fn new() -> Counter {
        Counter::default()
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increments the counter by `n`.
    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements the counter by one.
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrements the counter by `n`.
    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    /// Gets the current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Resets the counter to zero.
    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}
