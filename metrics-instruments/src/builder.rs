use std::{io, time::Duration};

use quanta::Clock;
use thiserror::Error;

use crate::{
    ewma::DEFAULT_TICK_INTERVAL,
    registry::InstrumentConfig,
    reservoir::{
        SamplingKind, DEFAULT_DECAY_ALPHA, DEFAULT_RESCALE_THRESHOLD, DEFAULT_RESERVOIR_SIZE,
    },
    ticker::Ticker,
    Registry, TimeUnit,
};

/// Errors that could occur while building a registry or a reporter.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The reservoir size was zero.
    #[error("reservoir size must be greater than zero")]
    InvalidReservoirSize,

    /// The tick interval was zero.
    #[error("tick interval must be greater than zero")]
    InvalidTickInterval,

    /// The report interval was zero.
    #[error("report interval must be greater than zero")]
    InvalidReportInterval,

    /// The rescale threshold was zero.
    #[error("rescale threshold must be greater than zero")]
    InvalidRescaleThreshold,

    /// The window of the default sliding time window sampling was zero.
    #[error("sliding time window must be greater than zero")]
    InvalidSlidingWindow,

    /// The decay factor was not a positive, finite number.
    #[error("decay alpha must be positive and finite, got {alpha}")]
    InvalidAlpha {
        /// The rejected decay factor.
        alpha: f64,
    },

    /// Failed to spawn a background thread.
    #[error("failed to spawn background thread: {0}")]
    Backend(#[from] io::Error),
}

/// Builder for a [`Registry`].
///
/// Settings apply to every instrument the registry creates.
#[derive(Clone, Debug)]
pub struct RegistryBuilder {
    tick_interval: Duration,
    reservoir_size: usize,
    decay_alpha: f64,
    rescale_threshold: Duration,
    default_sampling: SamplingKind,
    clock: Clock,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
}

impl RegistryBuilder {
    /// Creates a new `RegistryBuilder` with default settings.
    pub fn new() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Sets the interval at which meters and timers are ticked.
    ///
    /// Shorter intervals make the moving averages react faster, at the cost of more work for the
    /// background ticker.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the number of samples each histogram and timer retains.
    ///
    /// Defaults to 1028.
    #[must_use]
    pub fn with_reservoir_size(mut self, size: usize) -> Self {
        self.reservoir_size = size;
        self
    }

    /// Sets the decay factor of exponentially-decaying reservoirs.
    ///
    /// Defaults to 0.015.
    #[must_use]
    pub fn with_decay_alpha(mut self, alpha: f64) -> Self {
        self.decay_alpha = alpha;
        self
    }

    /// Sets how often exponentially-decaying reservoirs move their landmark forward.
    ///
    /// Defaults to 1 hour.
    #[must_use]
    pub fn with_rescale_threshold(mut self, threshold: Duration) -> Self {
        self.rescale_threshold = threshold;
        self
    }

    /// Sets the sampling used by [`Registry::histogram`].
    ///
    /// Timers and [`Registry::biased_histogram`] always use exponentially-decaying sampling.
    ///
    /// Defaults to uniform sampling.
    #[must_use]
    pub fn with_default_sampling(mut self, sampling: SamplingKind) -> Self {
        self.default_sampling = sampling;
        self
    }

    /// Sets the clock instruments read time from.
    ///
    /// Mostly useful for tests, with a mocked clock.
    ///
    /// Defaults to [`Clock::new`].
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the unit timer rates are presented in.
    ///
    /// Defaults to seconds.
    #[must_use]
    pub fn with_rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    /// Sets the unit timer durations are presented in.
    ///
    /// Defaults to milliseconds.
    #[must_use]
    pub fn with_duration_unit(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Builds the registry, spawning its background ticker.
    ///
    /// # Errors
    ///
    /// If any setting is invalid, or the ticker thread cannot be spawned, an error variant will be
    /// returned describing the problem.
    pub fn build(self) -> Result<Registry, BuildError> {
        if self.reservoir_size == 0 {
            return Err(BuildError::InvalidReservoirSize);
        }
        if self.tick_interval.is_zero() {
            return Err(BuildError::InvalidTickInterval);
        }
        if self.rescale_threshold.is_zero() {
            return Err(BuildError::InvalidRescaleThreshold);
        }
        if self.default_sampling == SamplingKind::SlidingTimeWindow(Duration::ZERO) {
            return Err(BuildError::InvalidSlidingWindow);
        }
        if !(self.decay_alpha.is_finite() && self.decay_alpha > 0.0) {
            return Err(BuildError::InvalidAlpha { alpha: self.decay_alpha });
        }

        let ticker = Ticker::spawn(self.tick_interval)?;
        let config = InstrumentConfig {
            reservoir_size: self.reservoir_size,
            decay_alpha: self.decay_alpha,
            rescale_threshold: self.rescale_threshold,
            default_sampling: self.default_sampling,
            clock: self.clock,
            rate_unit: self.rate_unit,
            duration_unit: self.duration_unit,
        };

        Ok(Registry::from_parts(config, ticker))
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        RegistryBuilder {
            tick_interval: DEFAULT_TICK_INTERVAL,
            reservoir_size: DEFAULT_RESERVOIR_SIZE,
            decay_alpha: DEFAULT_DECAY_ALPHA,
            rescale_threshold: DEFAULT_RESCALE_THRESHOLD,
            default_sampling: SamplingKind::Uniform,
            clock: Clock::new(),
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
        }
    }
}
