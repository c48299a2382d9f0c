//! Sampling reservoirs.
//!
//! A reservoir retains a fixed-size, statistically representative sample of an unbounded stream
//! of values.  Histograms feed every value they see into a reservoir and compute quantiles from
//! the retained sample.

use std::{cell::UnsafeCell, time::Duration};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::Snapshot;

mod decaying;
pub use self::decaying::ExponentiallyDecayingReservoir;

mod sliding;
pub use self::sliding::{SlidingTimeWindowReservoir, SlidingWindowReservoir};

mod uniform;
pub use self::uniform::UniformReservoir;

/// Default number of samples retained by a reservoir.
///
/// 1028 samples offer a 99.9% confidence level with a 5% margin of error, assuming a normal
/// distribution.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Default decay factor for [`ExponentiallyDecayingReservoir`].
///
/// Heavily biases the reservoir towards roughly the last five minutes of values.
pub const DEFAULT_DECAY_ALPHA: f64 = 0.015;

/// Default interval between two landmarks of an [`ExponentiallyDecayingReservoir`].
pub const DEFAULT_RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

thread_local! {
    static FAST_RNG: UnsafeCell<Xoshiro256StarStar> = {
        UnsafeCell::new(Xoshiro256StarStar::from_rng(&mut rand::rng()))
    };
}

fn with_rng<F, T>(f: F) -> T
where
    F: FnOnce(&mut Xoshiro256StarStar) -> T,
{
    FAST_RNG.with(|rng| {
        // SAFETY: We know it's safe to take a mutable reference since we're getting a pointer to a thread-local value,
        // and the reference never outlives the closure executing on this thread.
        let rng = unsafe { &mut *rng.get() };
        f(rng)
    })
}

/// Draws a uniformly random integer in `[0, upper)`.
pub(crate) fn fastrand(upper: u64) -> u64 {
    with_rng(|rng| rng.random_range(0..upper))
}

/// Draws a uniformly random float in `(0, 1]`.
pub(crate) fn fastrand_unit() -> f64 {
    with_rng(|rng| 1.0 - rng.random::<f64>())
}

/// A fixed-capacity sample of a stream of values.
///
/// Implementations must be safe to update from many threads at once without blocking, and must
/// never retain more than their capacity.
pub trait Reservoir: Send + Sync {
    /// Records a value.
    fn update(&self, value: i64);

    /// Gets the number of values currently retained.
    fn size(&self) -> usize;

    /// Gets a copy of the values currently retained, in no particular order.
    fn values(&self) -> Vec<i64>;

    /// Gets a snapshot of the values currently retained.
    ///
    /// Every statistic of the returned snapshot is derived from the retained values alone.
    fn snapshot(&self) -> Snapshot {
        Snapshot::from_values(self.values())
    }
}

/// Sampling strategy for a histogram.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SamplingKind {
    /// Every value seen so far is equally likely to be retained.
    ///
    /// Suited to distributions that do not change over the lifetime of the process.
    #[default]
    Uniform,

    /// Recent values are exponentially more likely to be retained than old ones.
    ///
    /// Suited to distributions that drift, such as request latencies.
    ExponentiallyDecaying,

    /// Only the most recent values are retained, up to the reservoir size.
    SlidingWindow,

    /// Only the values recorded within the given trailing window of time are retained.
    ///
    /// The reservoir size bounds the values kept per slice of the window; see
    /// [`SlidingTimeWindowReservoir`].
    SlidingTimeWindow(Duration),
}
