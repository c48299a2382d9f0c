//! Periodic reporting of registry contents.
//!
//! A [`Reporter`] turns the metrics of a registry into output of some kind.  It can be driven by
//! hand, or on an interval from a background thread with [`ScheduledReporter`].
//!
//! [`LogReporter`] emits one `tracing` event per metric, which makes it a reasonable default when
//! all you need is to see the numbers, and a reference for writing reporters for other systems.
use std::{
    collections::BTreeMap,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, Level};

use crate::{
    BuildError, Counter, Gauge, Histogram, Meter, Metric, MetricKindMask, MetricName, Registry,
    Snapshot, TimeUnit, Timer,
};

/// Consumes point-in-time views of a registry.
pub trait Reporter: Send {
    /// Reports the given metrics.
    fn report(&self, metrics: &BTreeMap<MetricName, Metric>);
}

impl<R: Reporter + Sync> Reporter for Arc<R> {
    fn report(&self, metrics: &BTreeMap<MetricName, Metric>) {
        (**self).report(metrics)
    }
}

// `tracing` wants the level of an event at compile time.
macro_rules! event_at {
    ($level:expr, $($fields:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(Level::ERROR, $($fields)+);
        } else if level == Level::WARN {
            tracing::event!(Level::WARN, $($fields)+);
        } else if level == Level::INFO {
            tracing::event!(Level::INFO, $($fields)+);
        } else if level == Level::DEBUG {
            tracing::event!(Level::DEBUG, $($fields)+);
        } else {
            tracing::event!(Level::TRACE, $($fields)+);
        }
    }};
}

/// Reports metrics as `tracing` events.
///
/// Every metric is logged as a single event, with one field per statistic.  Meter rates are
/// expressed per second unless configured otherwise; timers are presented in their own rate and
/// duration units unless configured otherwise.
#[derive(Clone, Debug)]
pub struct LogReporter {
    level: Level,
    kinds: MetricKindMask,
    rate_unit: Option<TimeUnit>,
    duration_unit: Option<TimeUnit>,
}

impl LogReporter {
    /// Creates a new `LogReporter` logging every metric at the `INFO` level.
    pub fn new() -> LogReporter {
        LogReporterBuilder::new().build()
    }

    /// Creates a [`LogReporterBuilder`] to configure a new `LogReporter`.
    pub fn builder() -> LogReporterBuilder {
        LogReporterBuilder::new()
    }

    fn report_counter(&self, name: &MetricName, counter: &Counter) {
        event_at!(self.level, metric = %name, kind = "counter", count = counter.count());
    }

    fn report_gauge(&self, name: &MetricName, gauge: &Gauge) {
        event_at!(self.level, metric = %name, kind = "gauge", value = gauge.value());
    }

    fn report_histogram(&self, name: &MetricName, histogram: &Histogram) {
        let s = histogram.snapshot();
        event_at!(
            self.level,
            metric = %name,
            kind = "histogram",
            count = s.count(),
            min = s.min(),
            max = s.max(),
            mean = s.mean(),
            std_dev = s.std_dev(),
            median = s.median(),
            p75 = s.p75(),
            p95 = s.p95(),
            p98 = s.p98(),
            p99 = s.p99(),
            p999 = s.p999()
        );
    }

    fn report_meter(&self, name: &MetricName, meter: &Meter) {
        let unit = self.rate_unit.unwrap_or(TimeUnit::Seconds);
        event_at!(
            self.level,
            metric = %name,
            kind = "meter",
            count = meter.count(),
            mean_rate = unit.scale_rate(meter.mean_rate()),
            m1_rate = unit.scale_rate(meter.one_minute_rate()),
            m5_rate = unit.scale_rate(meter.five_minute_rate()),
            m15_rate = unit.scale_rate(meter.fifteen_minute_rate()),
            rate_unit = unit.as_canonical_label()
        );
    }

    fn report_timer(&self, name: &MetricName, timer: &Timer) {
        let rate_unit = self.rate_unit.unwrap_or_else(|| timer.rate_unit());
        let duration_unit = self.duration_unit.unwrap_or_else(|| timer.duration_unit());
        let s: Snapshot = timer.snapshot();
        let d = |nanos: f64| duration_unit.convert_from_nanos(nanos);
        event_at!(
            self.level,
            metric = %name,
            kind = "timer",
            count = s.count(),
            min = d(s.min() as f64),
            max = d(s.max() as f64),
            mean = d(s.mean()),
            std_dev = d(s.std_dev()),
            median = d(s.median()),
            p75 = d(s.p75()),
            p95 = d(s.p95()),
            p98 = d(s.p98()),
            p99 = d(s.p99()),
            p999 = d(s.p999()),
            mean_rate = rate_unit.scale_rate(timer.mean_rate()),
            m1_rate = rate_unit.scale_rate(timer.one_minute_rate()),
            m5_rate = rate_unit.scale_rate(timer.five_minute_rate()),
            m15_rate = rate_unit.scale_rate(timer.fifteen_minute_rate()),
            rate_unit = rate_unit.as_canonical_label(),
            duration_unit = duration_unit.as_canonical_label()
        );
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        LogReporter::new()
    }
}

impl Reporter for LogReporter {
    fn report(&self, metrics: &BTreeMap<MetricName, Metric>) {
        for (name, metric) in metrics {
            if !self.kinds.matches(metric.kind()) {
                continue;
            }

            match metric {
                Metric::Counter(counter) => self.report_counter(name, counter),
                Metric::Gauge(gauge) => self.report_gauge(name, gauge),
                Metric::Histogram(histogram) => self.report_histogram(name, histogram),
                Metric::Meter(meter) => self.report_meter(name, meter),
                Metric::Timer(timer) => self.report_timer(name, timer),
            }
        }
    }
}

/// Builder for a [`LogReporter`].
#[derive(Clone, Debug)]
pub struct LogReporterBuilder {
    level: Level,
    kinds: MetricKindMask,
    rate_unit: Option<TimeUnit>,
    duration_unit: Option<TimeUnit>,
    interval: Duration,
}

impl LogReporterBuilder {
    /// Creates a new `LogReporterBuilder` with default settings.
    pub fn new() -> LogReporterBuilder {
        LogReporterBuilder::default()
    }

    /// Sets the level events are logged at.
    ///
    /// Defaults to `INFO`.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the kinds of metrics to report.
    ///
    /// Defaults to every kind.
    #[must_use]
    pub fn with_kinds(mut self, kinds: MetricKindMask) -> Self {
        self.kinds = kinds;
        self
    }

    /// Sets the unit rates are reported in, overriding the units timers carry.
    #[must_use]
    pub fn with_rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = Some(unit);
        self
    }

    /// Sets the unit durations are reported in, overriding the units timers carry.
    #[must_use]
    pub fn with_duration_unit(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = Some(unit);
        self
    }

    /// Sets the interval between two reports when spawned.
    ///
    /// Defaults to 60 seconds.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Builds the reporter.
    pub fn build(self) -> LogReporter {
        LogReporter {
            level: self.level,
            kinds: self.kinds,
            rate_unit: self.rate_unit,
            duration_unit: self.duration_unit,
        }
    }

    /// Builds the reporter and spawns it, reporting the contents of `registry` on the configured
    /// interval.
    ///
    /// # Errors
    ///
    /// If the interval is zero, or the background thread cannot be spawned, an error variant will
    /// be returned describing the problem.
    pub fn spawn(self, registry: Arc<Registry>) -> Result<ScheduledReporter, BuildError> {
        let interval = self.interval;
        ScheduledReporter::spawn(registry, self.build(), interval)
    }
}

impl Default for LogReporterBuilder {
    fn default() -> Self {
        LogReporterBuilder {
            level: Level::INFO,
            kinds: MetricKindMask::ALL,
            rate_unit: None,
            duration_unit: None,
            interval: Duration::from_secs(60),
        }
    }
}

/// Drives a [`Reporter`] on an interval from a background thread.
///
/// The thread stops when the `ScheduledReporter` is dropped.
pub struct ScheduledReporter {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledReporter {
    /// Spawns a thread reporting the contents of `registry` to `reporter` every `interval`.
    ///
    /// The first report happens one interval after spawning.
    ///
    /// # Errors
    ///
    /// If the interval is zero, or the background thread cannot be spawned, an error variant will
    /// be returned describing the problem.
    pub fn spawn<R>(
        registry: Arc<Registry>,
        reporter: R,
        interval: Duration,
    ) -> Result<ScheduledReporter, BuildError>
    where
        R: Reporter + 'static,
    {
        if interval.is_zero() {
            return Err(BuildError::InvalidReportInterval);
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("metrics-instruments-reporter".to_string())
            .spawn(move || {
                debug!(?interval, "reporter started");

                let mut next = Instant::now() + interval;
                loop {
                    match shutdown_rx.recv_deadline(next) {
                        Err(RecvTimeoutError::Timeout) => {
                            reporter.report(&registry.all_metrics());
                            next = std::cmp::max(next + interval, Instant::now());
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                debug!("reporter stopped");
            })?;

        Ok(ScheduledReporter { shutdown: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Stops reporting, waiting for a report in progress to finish.
    ///
    /// Dropping the `ScheduledReporter` does the same.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ScheduledReporter {
    fn drop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
