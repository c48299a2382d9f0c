use std::{
    sync::{
        atomic::Ordering::{Acquire, Relaxed, Release},
        Arc,
    },
    time::Duration,
};

use arc_swap::ArcSwapOption;
use quanta::{Clock, Instant};

use crate::atomics::{AtomicI64, AtomicU64};

use super::{Reservoir, UniformReservoir, DEFAULT_RESERVOIR_SIZE};

/// Number of slices a time window is cut into.
const SLICES: u64 = 32;

/// A reservoir of the last `capacity` values recorded.
///
/// Writers claim a position with a single atomic increment and overwrite the oldest slot, so the
/// sample always reflects the most recent values, with no bias towards any part of that window.
pub struct SlidingWindowReservoir {
    values: Box<[AtomicI64]>,
    count: AtomicU64,
}

impl SlidingWindowReservoir {
    /// Creates a new `SlidingWindowReservoir` that keeps the last `capacity` values.
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
}

impl Default for SlidingWindowReservoir {
    fn default() -> Self {
        SlidingWindowReservoir::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn update(&self, value: i64) {
        let idx = self.count.fetch_add(1, Relaxed) % self.values.len() as u64;
        self.values[idx as usize].store(value, Release);
    }

    fn size(&self) -> usize {
        self.count.load(Acquire).min(self.values.len() as u64) as usize
    }

    fn values(&self) -> Vec<i64> {
        let len = self.size();
        self.values[..len].iter().map(|v| v.load(Acquire)).collect()
    }
}

/// Values recorded during one slice of a time window.
struct Slice {
    epoch: u64,
    sample: UniformReservoir,
}

/// A reservoir of the values recorded within a trailing window of time.
///
/// The window is cut into 32 equal slices kept in a ring.  A value lands in the slice covering the
/// instant it was recorded, and a whole slice is dropped once it falls out of the window: a value
/// is retained for at least `window - window / 32` and at most `window`.
///
/// Old slices are evicted on both sides.  A writer reaching a ring position still holding a slice
/// from a previous turn replaces it with a fresh one, and readers clear every slice they find
/// outside the window.
///
/// Each slice keeps up to `capacity` values.  Past that, it keeps a uniform sample of the values
/// recorded during the slice, so memory stays bounded under any rate of updates.
pub struct SlidingTimeWindowReservoir {
    slices: Box<[ArcSwapOption<Slice>]>,
    slice_nanos: u64,
    slice_capacity: usize,
    window: Duration,
    start: Instant,
    clock: Clock,
}

impl SlidingTimeWindowReservoir {
    /// Creates a new `SlidingTimeWindowReservoir` keeping the values of the last `window`.
    ///
    /// `capacity` bounds the number of values kept per slice of the window, and is bumped up to
    /// one if zero.
    pub fn new(window: Duration, capacity: usize, clock: Clock) -> Self {
        let window_nanos = u64::try_from(window.as_nanos()).unwrap_or(u64::MAX);
        let slices = (0..SLICES).map(|_| ArcSwapOption::empty()).collect::<Vec<_>>();

        Self {
            slices: slices.into_boxed_slice(),
            slice_nanos: (window_nanos / SLICES).max(1),
            slice_capacity: capacity.max(1),
            window,
            start: clock.now(),
            clock,
        }
    }

    /// Gets the length of the window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Gets the maximum number of samples this reservoir retains.
    pub fn capacity(&self) -> usize {
        self.slice_capacity * SLICES as usize
    }

    /// Records a value as of the given instant.
    pub fn update_at(&self, value: i64, now: Instant) {
        let epoch = self.epoch_at(now);
        let slot = &self.slices[(epoch % SLICES) as usize];
        loop {
            let current = slot.load_full();
            match &current {
                Some(slice) if slice.epoch == epoch => {
                    slice.sample.update(value);
                    return;
                }
                // The ring has already come around past this value: it is outside the window.
                Some(slice) if slice.epoch > epoch => return,
                _ => {}
            }

            let fresh = Arc::new(Slice { epoch, sample: UniformReservoir::new(self.slice_capacity) });
            slot.compare_and_swap(&current, Some(fresh));
        }
    }

    fn epoch_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start).as_nanos();
        u64::try_from(elapsed).unwrap_or(u64::MAX) / self.slice_nanos
    }

    /// Gets the slices still inside the window as of `now`, clearing the ones that are not.
    fn live_slices(&self, now: Instant) -> Vec<Arc<Slice>> {
        let epoch = self.epoch_at(now);
        let mut live = Vec::with_capacity(SLICES as usize);
        for slot in self.slices.iter() {
            let current = slot.load_full();
            match &current {
                Some(slice) if epoch.saturating_sub(slice.epoch) < SLICES => live.push(Arc::clone(slice)),
                Some(_) => {
                    slot.compare_and_swap(&current, None);
                }
                None => {}
            }
        }
        live
    }
}

impl Reservoir for SlidingTimeWindowReservoir {
    fn update(&self, value: i64) {
        self.update_at(value, self.clock.now());
    }

    fn size(&self) -> usize {
        self.live_slices(self.clock.now()).iter().map(|slice| slice.sample.size()).sum()
    }

    fn values(&self) -> Vec<i64> {
        self.live_slices(self.clock.now()).iter().flat_map(|slice| slice.sample.values()).collect()
    }
}
