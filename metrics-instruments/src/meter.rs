use std::{sync::atomic::Ordering, time::Duration};

use quanta::{Clock, Instant};

use crate::{
    atomics::AtomicU64,
    ewma::{Ewma, DEFAULT_TICK_INTERVAL},
    ticker::Tick,
    TimeUnit,
};

/// A meter.
///
/// Measures the rate at which a set of events occur: the mean rate since the meter was created,
/// plus one-, five- and fifteen-minute exponentially-weighted moving average rates, in the same
/// fashion as the UNIX load averages.
///
/// The moving averages only move when the meter is [ticked](Tick::tick).  Meters obtained from a
/// [`Registry`](crate::Registry) are ticked by the registry's background ticker; standalone meters
/// must be ticked by the caller, every `tick_interval`.
///
/// Every rate is expressed in events per second; use [`TimeUnit::scale_rate`] to convert to
/// another unit.
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    start: Instant,
    clock: Clock,
}

impl Meter {
    /// Creates a new `Meter` using the system clock and the default tick interval.
    pub fn new() -> Meter {
        Meter::with_clock(Clock::new(), DEFAULT_TICK_INTERVAL)
    }

    /// Creates a new `Meter` reading time from `clock`, expecting to be ticked every
    /// `tick_interval`.
    pub fn with_clock(clock: Clock, tick_interval: Duration) -> Meter {
        Meter {
            count: AtomicU64::new(0),
            m1: Ewma::one_minute(tick_interval),
            m5: Ewma::five_minute(tick_interval),
            m15: Ewma::fifteen_minute(tick_interval),
            start: clock.now(),
            clock,
        }
    }

    /// Marks the occurrence of an event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Marks the occurrence of `n` events.
    pub fn mark_n(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    /// Gets the number of events marked.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Gets the mean rate at which events have occurred since the meter was created.
    ///
    /// Zero until the first event is marked.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }

        let elapsed = self.clock.now().saturating_duration_since(self.start).as_secs_f64();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Gets the one-minute exponentially-weighted moving average rate.
    pub fn one_minute_rate(&self) -> f64 {
        self.m1.rate(TimeUnit::Seconds)
    }

    /// Gets the five-minute exponentially-weighted moving average rate.
    pub fn five_minute_rate(&self) -> f64 {
        self.m5.rate(TimeUnit::Seconds)
    }

    /// Gets the fifteen-minute exponentially-weighted moving average rate.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.m15.rate(TimeUnit::Seconds)
    }
}

impl Default for Meter {
    fn default() -> Self {
        Meter::new()
    }
}

impl Tick for Meter {
    fn tick(&self) {
        self.m1.tick();
        self.m5.tick();
        self.m15.tick();
    }
}
