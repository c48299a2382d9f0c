use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    atomics::{AtomicF64, AtomicU64},
    TimeUnit,
};

/// Default interval between two ticks of an [`Ewma`].
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

const SECONDS_PER_MINUTE: f64 = 60.0;

/// An exponentially-weighted moving average.
///
/// Events are accumulated with [`update`](Ewma::update), which is a single atomic add.  Every
/// `interval`, [`tick`](Ewma::tick) folds the events accumulated since the previous tick into the
/// average:
///
/// ```text
/// instant = uncounted / interval
/// rate    = rate + alpha * (instant - rate)
/// ```
///
/// The very first tick sets the rate to the instant rate directly, so that a fresh average is not
/// biased towards zero.
///
/// `Ewma` does not tick itself: something must call `tick` at the configured interval.  Meters
/// registered with a [`Registry`](crate::Registry) are ticked by its background ticker.
///
/// See [UNIX Load Average Part 1: How It Works][load1] and [UNIX Load Average Part 2: Not Your
/// Average Average][load2] for background.
///
/// [load1]: http://www.teamquest.com/pdfs/whitepaper/ldavg1.pdf
/// [load2]: http://www.teamquest.com/pdfs/whitepaper/ldavg2.pdf
#[derive(Debug)]
pub struct Ewma {
    uncounted: AtomicU64,
    // Events per nanosecond.
    rate: AtomicF64,
    initialized: AtomicBool,
    alpha: f64,
    interval_nanos: f64,
}

impl Ewma {
    /// Creates a new `Ewma` with the given smoothing constant, expecting to be ticked every
    /// `interval`.
    pub fn new(alpha: f64, interval: Duration) -> Ewma {
        Ewma {
            uncounted: AtomicU64::new(0),
            rate: AtomicF64::new(0.0),
            initialized: AtomicBool::new(false),
            alpha,
            interval_nanos: interval.as_nanos() as f64,
        }
    }

    /// Creates a new `Ewma` averaging over a window of `minutes`, ticked every `interval`.
    ///
    /// The smoothing constant is `1 - exp(-interval / 60 / minutes)`, with the interval in
    /// seconds.
    pub fn with_window(minutes: f64, interval: Duration) -> Ewma {
        Ewma::new(Self::alpha_for(minutes, interval), interval)
    }

    /// Creates a new `Ewma` equivalent to the UNIX one minute load average.
    pub fn one_minute(interval: Duration) -> Ewma {
        Ewma::with_window(1.0, interval)
    }

    /// Creates a new `Ewma` equivalent to the UNIX five minute load average.
    pub fn five_minute(interval: Duration) -> Ewma {
        Ewma::with_window(5.0, interval)
    }

    /// Creates a new `Ewma` equivalent to the UNIX fifteen minute load average.
    pub fn fifteen_minute(interval: Duration) -> Ewma {
        Ewma::with_window(15.0, interval)
    }

    fn alpha_for(minutes: f64, interval: Duration) -> f64 {
        1.0 - (-interval.as_secs_f64() / SECONDS_PER_MINUTE / minutes).exp()
    }

    /// Gets the smoothing constant.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Records `n` events.
    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Folds the events recorded since the last tick into the rate.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::AcqRel);
        let instant = if self.interval_nanos > 0.0 { count as f64 / self.interval_nanos } else { 0.0 };

        if self.initialized.load(Ordering::Acquire) {
            let alpha = self.alpha;
            self.rate.fetch_update(|rate| rate + alpha * (instant - rate));
        } else {
            self.rate.store(instant, Ordering::Release);
            self.initialized.store(true, Ordering::Release);
        }
    }

    /// Gets the rate, in events per `unit`.
    pub fn rate(&self, unit: TimeUnit) -> f64 {
        unit.scale_nanos_rate(self.rate.load(Ordering::Acquire))
    }
}
