//! Point-in-time views over sampled values.

const MEDIAN_Q: f64 = 0.5;
const P75_Q: f64 = 0.75;
const P95_Q: f64 = 0.95;
const P98_Q: f64 = 0.98;
const P99_Q: f64 = 0.99;
const P999_Q: f64 = 0.999;

/// Running statistics over every value a histogram has ever seen.
///
/// Unlike the sampled values in a [`Snapshot`], these are exact: they are accumulated on every
/// update rather than derived from the reservoir.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct RunningStats {
    pub count: u64,
    pub min: i64,
    pub max: i64,
    pub sum: i64,
    pub mean: f64,
    pub std_dev: f64,
}

/// An immutable view of a sample and the statistics derived from it.
///
/// Quantiles are always computed from the sampled values.  When the snapshot comes from a
/// [`Histogram`](crate::Histogram), `count`, `min`, `max`, `sum`, `mean` and `std_dev` come from
/// the histogram's running accumulators and so describe the full stream, not just the sample.
///
/// The fields of a histogram snapshot are read one at a time while writers keep updating.  They
/// are each individually valid but are not guaranteed to describe the exact same instant: the
/// count may already include an update whose value has not yet reached the sample, for example.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    values: Vec<i64>,
    count: u64,
    min: i64,
    max: i64,
    sum: i64,
    mean: f64,
    std_dev: f64,
}

impl Snapshot {
    /// Creates a `Snapshot` over the given values, deriving every statistic from them.
    ///
    /// The mean is the arithmetic mean of the values, and the standard deviation is the sample
    /// standard deviation, computed in two passes.
    pub fn from_values(mut values: Vec<i64>) -> Snapshot {
        values.sort_unstable();

        let count = values.len() as u64;
        let min = values.first().copied().unwrap_or(0);
        let max = values.last().copied().unwrap_or(0);
        let sum = values.iter().fold(0i64, |acc, v| acc.wrapping_add(*v));
        let (mean, std_dev) = if values.is_empty() {
            (0.0, 0.0)
        } else {
            let mean = values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64;
            let std_dev = if values.len() > 1 {
                let squares = values
                    .iter()
                    .map(|v| {
                        let diff = *v as f64 - mean;
                        diff * diff
                    })
                    .sum::<f64>();
                (squares / (values.len() - 1) as f64).sqrt()
            } else {
                0.0
            };
            (mean, std_dev)
        };

        Snapshot { values, count, min, max, sum, mean, std_dev }
    }

    pub(crate) fn with_stats(mut values: Vec<i64>, stats: RunningStats) -> Snapshot {
        values.sort_unstable();

        Snapshot {
            values,
            count: stats.count,
            min: stats.min,
            max: stats.max,
            sum: stats.sum,
            mean: stats.mean,
            std_dev: stats.std_dev,
        }
    }

    /// Gets the value at the given quantile.
    ///
    /// The position of the quantile `q` is `q * (size + 1)`.  Positions before the first value
    /// yield the smallest value, positions at or beyond the last yield the largest, and anything
    /// in between is linearly interpolated between the two surrounding values.
    ///
    /// If the quantile is less than 0.0 or greater than 1.0, then the result will be `None`.  An
    /// empty snapshot yields `0.0` for every valid quantile.
    pub fn value(&self, q: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&q) {
            return None;
        }

        Some(self.value_unchecked(q))
    }

    fn value_unchecked(&self, q: f64) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        let len = self.values.len();
        let pos = q * (len + 1) as f64;

        if pos < 1.0 {
            return self.values[0] as f64;
        }

        if pos >= len as f64 {
            return self.values[len - 1] as f64;
        }

        let index = pos as usize;
        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }

    /// Gets the median value.
    pub fn median(&self) -> f64 {
        self.value_unchecked(MEDIAN_Q)
    }

    /// Gets the value at the 75th percentile.
    pub fn p75(&self) -> f64 {
        self.value_unchecked(P75_Q)
    }

    /// Gets the value at the 95th percentile.
    pub fn p95(&self) -> f64 {
        self.value_unchecked(P95_Q)
    }

    /// Gets the value at the 98th percentile.
    pub fn p98(&self) -> f64 {
        self.value_unchecked(P98_Q)
    }

    /// Gets the value at the 99th percentile.
    pub fn p99(&self) -> f64 {
        self.value_unchecked(P99_Q)
    }

    /// Gets the value at the 99.9th percentile.
    pub fn p999(&self) -> f64 {
        self.value_unchecked(P999_Q)
    }

    /// Gets the sampled values, in ascending order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Gets the number of sampled values.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Gets the number of values observed.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Gets the smallest value observed, or `0` if nothing was observed.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Gets the largest value observed, or `0` if nothing was observed.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Gets the sum of all values observed.
    ///
    /// The sum wraps on overflow.
    pub fn sum(&self) -> i64 {
        self.sum
    }

    /// Gets the arithmetic mean of all values observed, or `0.0` if nothing was observed.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Gets the sample standard deviation of all values observed.
    ///
    /// Zero when fewer than two values were observed.
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::Snapshot;

    fn snapshot() -> Snapshot {
        Snapshot::from_values(vec![5, 1, 2, 3, 4])
    }

    #[test]
    fn small_quantiles_are_the_first_value() {
        assert_relative_eq!(snapshot().value(0.0).unwrap(), 1.0);
    }

    #[test]
    fn big_quantiles_are_the_last_value() {
        assert_relative_eq!(snapshot().value(1.0).unwrap(), 5.0);
    }

    #[test]
    fn out_of_range_quantiles_are_rejected() {
        assert_eq!(snapshot().value(-0.1), None);
        assert_eq!(snapshot().value(1.1), None);
        assert_eq!(snapshot().value(f64::NAN), None);
    }

    #[test]
    fn named_percentiles() {
        let snapshot = snapshot();
        assert_relative_eq!(snapshot.median(), 3.0);
        assert_relative_eq!(snapshot.p75(), 4.5);
        assert_relative_eq!(snapshot.p95(), 5.0);
        assert_relative_eq!(snapshot.p98(), 5.0);
        assert_relative_eq!(snapshot.p99(), 5.0);
        assert_relative_eq!(snapshot.p999(), 5.0);
    }

    #[test]
    fn single_value_calibration() {
        let snapshot = Snapshot::from_values(vec![10]);
        for value in [
            snapshot.median(),
            snapshot.p75(),
            snapshot.p95(),
            snapshot.p98(),
            snapshot.p99(),
            snapshot.p999(),
        ] {
            assert_relative_eq!(value, 10.0);
        }
    }

    #[test]
    fn values_are_sorted() {
        assert_eq!(snapshot().values(), &[1, 2, 3, 4, 5]);
        assert_eq!(snapshot().size(), 5);
    }

    #[test]
    fn derived_statistics() {
        let snapshot = snapshot();
        assert_eq!(snapshot.count(), 5);
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 5);
        assert_eq!(snapshot.sum(), 15);
        assert_relative_eq!(snapshot.mean(), 3.0);
        assert_relative_eq!(snapshot.std_dev(), 1.5811, epsilon = 0.0001);
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = Snapshot::from_values(Vec::new());
        assert_eq!(snapshot.size(), 0);
        assert_eq!(snapshot.min(), 0);
        assert_eq!(snapshot.max(), 0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.std_dev(), 0.0);
        assert_eq!(snapshot.median(), 0.0);
        assert_eq!(snapshot.value(0.99), Some(0.0));
    }

    proptest! {
        #[test]
        fn quantiles_are_monotonic_and_bounded(values in proptest::collection::vec(-1_000_000i64..1_000_000, 1..512)) {
            let snapshot = Snapshot::from_values(values);
            let min = snapshot.min() as f64;
            let max = snapshot.max() as f64;

            let mut previous = f64::MIN;
            for step in 0..=100 {
                let q = step as f64 / 100.0;
                let value = snapshot.value(q).unwrap();
                prop_assert!(value >= min && value <= max);
                prop_assert!(value >= previous);
                previous = value;
            }
        }
    }
}
