//! Atomic types used for instrument storage.
//!
//! Every instrument stores its state in 64-bit atomics, regardless of whether the standard library
//! exposes an atomic integer of that size for the target architecture.  On 32-bit targets we fall
//! back to `portable-atomic`.
//!
//! Floating-point accumulators are stored as their bit representation inside an [`AtomicU64`], and
//! updated through a compare-and-swap retry loop wrapped up in [`AtomicF64`].

use std::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

#[cfg(target_pointer_width = "32")]
pub use portable_atomic::{AtomicI64, AtomicU64};
#[cfg(not(target_pointer_width = "32"))]
pub use std::sync::atomic::{AtomicI64, AtomicU64};

/// An atomic 64-bit floating-point number.
///
/// Values are stored as the raw bits of an `f64`.  Loads and stores are single atomic operations;
/// read-modify-write operations run a compare-and-swap loop, backing off under contention.
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    /// Creates a new `AtomicF64` holding `value`.
    pub fn new(value: f64) -> AtomicF64 {
        AtomicF64 { bits: AtomicU64::new(value.to_bits()) }
    }

    /// Loads the current value.
    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.bits.load(order))
    }

    /// Stores `value`.
    pub fn store(&self, value: f64, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }

    /// Applies `f` to the current value until the update lands, returning the previous value.
    ///
    /// `f` may be called multiple times if other writers race with us, so it must be pure.
    pub fn fetch_update<F>(&self, mut f: F) -> f64
    where
        F: FnMut(f64) -> f64,
    {
        let backoff = Backoff::new();
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self.bits.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(previous) => return f64::from_bits(previous),
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Adds `value` to the current value, returning the previous value.
    #[cfg(test)]
    pub fn fetch_add(&self, value: f64) -> f64 {
        self.fetch_update(|current| current + value)
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        AtomicF64::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::Ordering, Arc};
    use std::thread;

    use super::AtomicF64;

    #[test]
    fn store_and_load() {
        let value = AtomicF64::new(1.5);
        assert_eq!(value.load(Ordering::Relaxed), 1.5);

        value.store(-42.25, Ordering::Relaxed);
        assert_eq!(value.load(Ordering::Relaxed), -42.25);
    }

    #[test]
    fn fetch_update_returns_previous() {
        let value = AtomicF64::new(2.0);
        let previous = value.fetch_update(|v| v * 3.0);
        assert_eq!(previous, 2.0);
        assert_eq!(value.load(Ordering::Relaxed), 6.0);
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let value = Arc::new(AtomicF64::default());
        let handles = (0..8)
            .map(|_| {
                let value = Arc::clone(&value);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        value.fetch_add(1.0);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(value.load(Ordering::Acquire), 80_000.0);
    }
}
