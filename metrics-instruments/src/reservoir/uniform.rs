use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crate::atomics::{AtomicI64, AtomicU64};

use super::{fastrand, Reservoir, DEFAULT_RESERVOIR_SIZE};

/// A uniform sampling reservoir.
///
/// [Reservoir sampling][rs] is a technique used to produce a statistically representative sample of a data stream, in a
/// fixed space, without knowing the length of the stream in advance. `UniformReservoir` is a thread-safe version of a
/// sampling reservoir, based on Vitter's ["Algorithm R"][vitter_paper]: after `n` values have been recorded, each of
/// them has the same `capacity / n` probability of being retained.
///
/// Writers claim their position in the stream with a single atomic increment and store into their slot with a single
/// atomic write, so updates never block each other or readers.
///
/// [rs]: https://en.wikipedia.org/wiki/Reservoir_sampling
/// [vitter_paper]: https://www.cs.umd.edu/~samir/498/vitter.pdf
pub struct UniformReservoir {
    values: Box<[AtomicI64]>,
    count: AtomicU64,
}

impl UniformReservoir {
    /// Creates a new `UniformReservoir` that stores up to `capacity` samples.
    ///
    /// A capacity of zero is bumped up to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let values = (0..capacity).map(|_| AtomicI64::new(0)).collect::<Vec<_>>();

        Self { values: values.into_boxed_slice(), count: AtomicU64::new(0) }
    }

    /// Gets the maximum number of samples this reservoir retains.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Gets the number of values recorded since creation.
    pub fn count(&self) -> u64 {
        self.count.load(Acquire)
    }
}

impl Default for UniformReservoir {
    fn default() -> Self {
        UniformReservoir::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Reservoir for UniformReservoir {
    fn update(&self, value: i64) {
        let idx = self.count.fetch_add(1, Relaxed);
        let capacity = self.values.len() as u64;
        if idx < capacity {
            self.values[idx as usize].store(value, Release);
        } else {
            // This is observation number `idx + 1`: it replaces a random slot with probability `capacity / (idx + 1)`.
            let maybe_idx = fastrand(idx + 1);
            if maybe_idx < capacity {
                self.values[maybe_idx as usize].store(value, Release);
            }
        }
    }

    fn size(&self) -> usize {
        let count = self.count.load(Acquire);
        count.min(self.values.len() as u64) as usize
    }

    fn values(&self) -> Vec<i64> {
        let len = self.size();
        self.values[..len].iter().map(|v| v.load(Acquire)).collect()
    }
}
