use std::time::Duration;

use quanta::{Clock, Instant};

use crate::{
    ewma::DEFAULT_TICK_INTERVAL, reservoir::SamplingKind, ticker::Tick, Histogram, Meter, Snapshot,
    TimeUnit,
};

/// A timer.
///
/// Measures both the rate at which a section of code is called and the distribution of its
/// duration.  Durations are recorded in nanoseconds into a [`Histogram`], and every recorded
/// duration also marks a [`Meter`].
///
/// The rate and duration units a timer carries do not affect what is recorded; they tell
/// reporters how to present its values.
#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
    clock: Clock,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
}

impl Timer {
    /// Creates a new `Timer` using the system clock, an exponentially-decaying reservoir, and the
    /// default tick interval.
    pub fn new() -> Timer {
        let clock = Clock::new();
        Timer::with_parts(
            Histogram::with_sampling(SamplingKind::ExponentiallyDecaying),
            Meter::with_clock(clock.clone(), DEFAULT_TICK_INTERVAL),
            clock,
        )
    }

    /// Creates a new `Timer` from its parts.
    ///
    /// `clock` is used to measure [`TimerContext`]s and should be the clock `meter` reads from.
    pub fn with_parts(histogram: Histogram, meter: Meter, clock: Clock) -> Timer {
        Timer {
            histogram,
            meter,
            clock,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
        }
    }

    /// Sets the units reporters should present this timer's rates and durations in.
    pub fn with_units(mut self, rate_unit: TimeUnit, duration_unit: TimeUnit) -> Timer {
        self.rate_unit = rate_unit;
        self.duration_unit = duration_unit;
        self
    }

    /// Records a duration of `value` in the given unit.
    ///
    /// Negative durations are ignored.
    pub fn update(&self, value: i64, unit: TimeUnit) {
        let nanos = unit.to_nanos(value);
        if nanos < 0 {
            return;
        }

        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Records a duration.
    pub fn record(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.update(nanos, TimeUnit::Nanoseconds);
    }

    /// Starts timing.
    ///
    /// The elapsed time is recorded when the returned context is stopped or dropped, whichever
    /// comes first, so an early return or a panic still records the measurement.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext { timer: self, start: self.clock.now(), stopped: false }
    }

    /// Times and records the duration of `f`.
    pub fn time_fn<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _context = self.time();
        f()
    }

    /// Gets the number of durations recorded.
    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Gets a snapshot of the recorded durations, in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }

    /// Gets the mean rate at which durations have been recorded, in events per second.
    pub fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    /// Gets the one-minute rate, in events per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    /// Gets the five-minute rate, in events per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    /// Gets the fifteen-minute rate, in events per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }

    /// Gets the unit rates should be presented in.
    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    /// Gets the unit durations should be presented in.
    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}

impl Tick for Timer {
    fn tick(&self) {
        self.meter.tick();
    }
}

/// A running measurement started by [`Timer::time`].
///
/// Records the elapsed time into its timer exactly once: either on [`stop`](TimerContext::stop),
/// or on drop.
#[must_use = "a timer context records when dropped, so dropping it immediately records a zero-length measurement"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: Instant,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Stops timing, recording and returning the elapsed time in nanoseconds.
    pub fn stop(mut self) -> i64 {
        self.finish()
    }

    fn finish(&mut self) -> i64 {
        self.stopped = true;
        let elapsed = self.timer.clock.now().saturating_duration_since(self.start);
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.timer.update(nanos, TimeUnit::Nanoseconds);
        nanos
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;
    use quanta::Clock;

    use super::Timer;
    use crate::{reservoir::UniformReservoir, Histogram, Meter, TimeUnit};

    fn mocked() -> (Timer, std::sync::Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let timer = Timer::with_parts(
            Histogram::new(UniformReservoir::new(1028)),
            Meter::with_clock(clock.clone(), Duration::from_secs(5)),
            clock,
        );
        (timer, mock)
    }

    #[test]
    fn a_blank_timer() {
        let (timer, _mock) = mocked();
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.mean_rate(), 0.0);
        assert_eq!(timer.one_minute_rate(), 0.0);
        assert_eq!(timer.five_minute_rate(), 0.0);
        assert_eq!(timer.fifteen_minute_rate(), 0.0);

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.max(), 0);
        assert_eq!(snapshot.min(), 0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.std_dev(), 0.0);
        assert_eq!(snapshot.median(), 0.0);
        assert_eq!(snapshot.p999(), 0.0);
        assert_eq!(snapshot.size(), 0);
    }

    #[test]
    fn timing_a_series_of_events() {
        let (timer, _mock) = mocked();
        for value in [10, 20, 20, 30, 40] {
            timer.update(value, TimeUnit::Milliseconds);
        }

        let snapshot = timer.snapshot();
        let ms = |nanos: f64| TimeUnit::Milliseconds.convert_from_nanos(nanos);

        assert_eq!(timer.count(), 5);
        assert_relative_eq!(ms(snapshot.max() as f64), 40.0, epsilon = 0.001);
        assert_relative_eq!(ms(snapshot.min() as f64), 10.0, epsilon = 0.001);
        assert_relative_eq!(ms(snapshot.mean()), 24.0, epsilon = 0.001);
        assert_relative_eq!(ms(snapshot.std_dev()), 11.401, epsilon = 0.001);
        assert_relative_eq!(ms(snapshot.median()), 20.0, epsilon = 0.001);
        assert_relative_eq!(ms(snapshot.p75()), 35.0, epsilon = 0.001);
        assert_relative_eq!(ms(snapshot.p99()), 40.0, epsilon = 0.001);
        assert_eq!(
            snapshot.values(),
            &[10_000_000, 20_000_000, 20_000_000, 30_000_000, 40_000_000]
        );
    }

    #[test]
    fn timing_variant_values() {
        let (timer, _mock) = mocked();
        timer.update(i64::MAX, TimeUnit::Nanoseconds);
        timer.update(0, TimeUnit::Nanoseconds);

        assert_relative_eq!(timer.snapshot().std_dev(), 6.521908912666392E18, max_relative = 1e-12);
    }

    #[test]
    fn ignores_negative_values() {
        let (timer, mock) = mocked();
        mock.increment(Duration::from_secs(1));
        timer.update(-1, TimeUnit::Nanoseconds);
        timer.update(-1, TimeUnit::Seconds);

        assert_eq!(timer.count(), 0);
        assert_eq!(timer.snapshot().size(), 0);
        assert_eq!(timer.mean_rate(), 0.0);
    }

    #[test]
    fn times_contexts() {
        let (timer, mock) = mocked();
        let context = timer.time();
        mock.increment(Duration::from_millis(50));
        assert_eq!(context.stop(), 50_000_000);

        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().values(), &[50_000_000]);
    }

    #[test]
    fn dropped_contexts_record_once() {
        let (timer, mock) = mocked();
        {
            let _context = timer.time();
            mock.increment(Duration::from_millis(5));
        }
        assert_eq!(timer.count(), 1);

        let context = timer.time();
        mock.increment(Duration::from_millis(5));
        let _ = context.stop();
        assert_eq!(timer.count(), 2);
    }

    #[test]
    fn times_closures() {
        let (timer, mock) = mocked();
        let value = timer.time_fn(|| {
            mock.increment(Duration::from_millis(50));
            "one"
        });

        assert_eq!(value, "one");
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().values(), &[50_000_000]);
    }

    #[test]
    fn records_durations() {
        let (timer, _mock) = mocked();
        timer.record(Duration::from_micros(1500));
        assert_eq!(timer.snapshot().values(), &[1_500_000]);
    }

    #[test]
    fn default_units() {
        let timer = Timer::new();
        assert_eq!(timer.rate_unit(), TimeUnit::Seconds);
        assert_eq!(timer.duration_unit(), TimeUnit::Milliseconds);

        let timer = timer.with_units(TimeUnit::Minutes, TimeUnit::Microseconds);
        assert_eq!(timer.rate_unit(), TimeUnit::Minutes);
        assert_eq!(timer.duration_unit(), TimeUnit::Microseconds);
    }
}
