use std::{fmt, sync::atomic::Ordering};

use arc_swap::ArcSwap;
use quanta::Clock;

use crate::{
    atomics::{AtomicI64, AtomicU64},
    reservoir::{
        ExponentiallyDecayingReservoir, Reservoir, SamplingKind, SlidingTimeWindowReservoir,
        SlidingWindowReservoir, UniformReservoir, DEFAULT_RESERVOIR_SIZE,
    },
    snapshot::RunningStats,
    Snapshot,
};

/// Welford's running mean and sum of squared differences.
#[derive(Clone, Copy, Debug, Default)]
struct Variance {
    n: u64,
    m: f64,
    s: f64,
}

impl Variance {
    fn update(&self, value: f64) -> Variance {
        let n = self.n + 1;
        if n == 1 {
            return Variance { n, m: value, s: 0.0 };
        }

        let delta = value - self.m;
        let m = self.m + delta / n as f64;
        let s = self.s + delta * (value - m);
        Variance { n, m, s }
    }

    fn std_dev(&self) -> f64 {
        if self.n > 1 {
            (self.s / (self.n - 1) as f64).sqrt()
        } else {
            0.0
        }
    }
}

/// A histogram.
///
/// Measures the distribution of a stream of values.  Every value updates a set of running
/// statistics (count, min, max, sum, and the running variance, using [Welford's method][welford])
/// and is offered to a [`Reservoir`], from which quantiles are estimated.
///
/// Updates never lock: the count, min, max and sum are each a single atomic operation, and the
/// running variance is swapped in as a whole through a compare-and-swap loop.
///
/// [welford]: https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
    count: AtomicU64,
    min: AtomicI64,
    max: AtomicI64,
    sum: AtomicI64,
    variance: ArcSwap<Variance>,
}

impl Histogram {
    /// Creates a new `Histogram` sampling into `reservoir`.
    pub fn new<R>(reservoir: R) -> Histogram
    where
        R: Reservoir + 'static,
    {
        Histogram {
            reservoir: Box::new(reservoir),
            count: AtomicU64::new(0),
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
            sum: AtomicI64::new(0),
            variance: ArcSwap::from_pointee(Variance::default()),
        }
    }

    /// Creates a new `Histogram` with the given sampling strategy and the default reservoir
    /// settings.
    pub fn with_sampling(kind: SamplingKind) -> Histogram {
        match kind {
            SamplingKind::Uniform => Histogram::new(UniformReservoir::default()),
            SamplingKind::ExponentiallyDecaying => Histogram::new(ExponentiallyDecayingReservoir::default()),
            SamplingKind::SlidingWindow => Histogram::new(SlidingWindowReservoir::default()),
            SamplingKind::SlidingTimeWindow(window) => Histogram::new(SlidingTimeWindowReservoir::new(
                window,
                DEFAULT_RESERVOIR_SIZE,
                Clock::new(),
            )),
        }
    }

    /// Records a value.
    pub fn update(&self, value: i64) {
        self.reservoir.update(value);
        self.min.fetch_min(value, Ordering::AcqRel);
        self.max.fetch_max(value, Ordering::AcqRel);
        self.sum.fetch_add(value, Ordering::AcqRel);
        self.variance.rcu(|variance| variance.update(value as f64));

        // Published last: a reader that sees a non-zero count also sees a real min and max.
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Gets the number of values recorded.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Gets a snapshot of this histogram.
    ///
    /// Quantiles come from the reservoir, while the count, min, max, sum, mean and standard
    /// deviation cover every value recorded.  Each field is read atomically, but the fields are
    /// not read all at once, so concurrent updates may be reflected in some and not yet in others.
    /// The count is always read first and written last, so whenever it is non-zero, `min` and
    /// `max` are values that were actually recorded.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::with_stats(self.reservoir.values(), self.stats())
    }

    fn stats(&self) -> RunningStats {
        let count = self.count();
        if count == 0 {
            return RunningStats::default();
        }

        let sum = self.sum.load(Ordering::Acquire);
        RunningStats {
            count,
            min: self.min.load(Ordering::Acquire),
            max: self.max.load(Ordering::Acquire),
            sum,
            mean: sum as f64 / count as f64,
            std_dev: self.variance.load().std_dev(),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram::with_sampling(SamplingKind::Uniform)
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram").field("count", &self.count()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use approx::assert_relative_eq;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use proptest::prelude::*;

    use super::Histogram;
    use crate::reservoir::{Reservoir, SamplingKind, UniformReservoir};

    // Parks every update inside the reservoir until released.
    struct Gated {
        inner: UniformReservoir,
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl Reservoir for Gated {
        fn update(&self, value: i64) {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            self.inner.update(value);
        }

        fn size(&self) -> usize {
            self.inner.size()
        }

        fn values(&self) -> Vec<i64> {
            self.inner.values()
        }
    }

    #[test]
    fn in_flight_updates_never_expose_initial_bounds() {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let histogram = Arc::new(Histogram::new(Gated {
            inner: UniformReservoir::new(10),
            entered: entered_tx,
            release: release_rx,
        }));

        let writer = {
            let histogram = Arc::clone(&histogram);
            thread::spawn(move || histogram.update(7))
        };

        // The update is parked in the reservoir: nothing about it may be visible yet.
        entered_rx.recv().unwrap();
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 0);
        assert_eq!(snapshot.min(), 0);
        assert_eq!(snapshot.max(), 0);
        assert_eq!(snapshot.mean(), 0.0);

        release_tx.send(()).unwrap();
        writer.join().unwrap();

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 1);
        assert_eq!(snapshot.min(), 7);
        assert_eq!(snapshot.max(), 7);
        assert_eq!(snapshot.mean(), 7.0);
    }

    #[test]
    fn an_empty_histogram() {
        let histogram = Histogram::new(UniformReservoir::new(100));
        let snapshot = histogram.snapshot();

        assert_eq!(histogram.count(), 0);
        assert_eq!(snapshot.count(), 0);
        assert_eq!(snapshot.min(), 0);
        assert_eq!(snapshot.max(), 0);
        assert_eq!(snapshot.sum(), 0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.std_dev(), 0.0);
        assert_eq!(snapshot.median(), 0.0);
        assert_eq!(snapshot.p999(), 0.0);
    }

    #[test]
    fn a_histogram_of_the_numbers_1_through_10000() {
        let histogram = Histogram::new(UniformReservoir::new(100_000));
        for i in 1..=10_000 {
            histogram.update(i);
        }

        let snapshot = histogram.snapshot();
        assert_eq!(histogram.count(), 10_000);
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 10_000);
        assert_relative_eq!(snapshot.mean(), 5000.5, epsilon = 0.01);
        assert_relative_eq!(snapshot.std_dev(), 2886.8956799071675, epsilon = 0.0001);
        assert_relative_eq!(snapshot.median(), 5000.5, epsilon = 0.01);
        assert_relative_eq!(snapshot.p75(), 7500.75, epsilon = 0.01);
        assert_relative_eq!(snapshot.p99(), 9900.99, epsilon = 0.01);
        assert_eq!(snapshot.size(), 10_000);
    }

    #[test]
    fn running_stats_cover_values_outside_the_sample() {
        let histogram = Histogram::new(UniformReservoir::new(10));
        for i in 1..=1_000 {
            histogram.update(i);
        }

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.size(), 10);
        assert_eq!(snapshot.count(), 1_000);
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 1_000);
        assert_eq!(snapshot.sum(), 500_500);
    }

    #[test]
    fn a_single_value() {
        let histogram = Histogram::with_sampling(SamplingKind::ExponentiallyDecaying);
        histogram.update(10);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.min(), 10);
        assert_eq!(snapshot.max(), 10);
        assert_eq!(snapshot.mean(), 10.0);
        assert_eq!(snapshot.std_dev(), 0.0);
        assert_eq!(snapshot.median(), 10.0);
        assert_eq!(snapshot.p999(), 10.0);
    }

    #[test]
    fn negative_values() {
        let histogram = Histogram::default();
        histogram.update(-5);
        histogram.update(5);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.min(), -5);
        assert_eq!(snapshot.max(), 5);
        assert_eq!(snapshot.mean(), 0.0);
        assert_relative_eq!(snapshot.std_dev(), 50.0f64.sqrt(), epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn running_stats_match_a_direct_computation(values in proptest::collection::vec(-1_000_000i64..1_000_000, 2..256)) {
            let histogram = Histogram::default();
            for value in &values {
                histogram.update(*value);
            }

            let n = values.len() as f64;
            let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
            let variance = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0);

            let snapshot = histogram.snapshot();
            prop_assert_eq!(snapshot.count(), values.len() as u64);
            prop_assert_eq!(snapshot.min(), *values.iter().min().unwrap());
            prop_assert_eq!(snapshot.max(), *values.iter().max().unwrap());
            prop_assert!((snapshot.mean() - mean).abs() < 1e-6);
            prop_assert!((snapshot.std_dev() - variance.sqrt()).abs() < 1e-6 * variance.sqrt().max(1.0));
        }
    }
}
