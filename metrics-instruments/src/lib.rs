//! Counters, gauges, meters, histograms and timers for measuring running applications.
//!
//! Every instrument can be updated from any number of threads without taking a lock, and read at
//! any time without stopping writers.
//!
//! # Instruments
//!
//! - [`Counter`]: a signed integer that can go up and down
//! - [`Gauge`]: a value sampled on demand from a closure
//! - [`Meter`]: a count of events, along with its mean rate and one-, five- and fifteen-minute
//!   exponentially-weighted moving average rates
//! - [`Histogram`]: the distribution of a stream of values, computed from a sampling
//!   [`reservoir`], with exact running count, minimum, maximum, mean and standard deviation
//! - [`Timer`]: a histogram of durations plus a meter of their rate
//!
//! # Registry
//!
//! Instruments are usually created through a [`Registry`], which stores them by [`MetricName`],
//! returns the existing instrument when asked for a name twice, and ticks the moving averages of
//! every meter and timer it holds from a background thread:
//!
//! ```rust
//! use metrics_instruments::{Registry, TimeUnit};
//!
//! let registry = Registry::builder().build().expect("failed to build registry");
//!
//! let requests = registry.meter("requests").expect("not a meter");
//! requests.mark();
//!
//! let latency = registry.timer(["http", "latency"]).expect("not a timer");
//! latency.update(12, TimeUnit::Milliseconds);
//!
//! assert_eq!(registry.meter("requests").unwrap().count(), 1);
//! assert_eq!(latency.snapshot().max(), 12_000_000);
//! ```
//!
//! # Reporting
//!
//! The contents of a registry can be handed to a [`Reporter`], either by hand or on an interval
//! through a [`ScheduledReporter`].  [`LogReporter`] emits one `tracing` event per metric.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod atomics;

mod builder;
pub use self::builder::{BuildError, RegistryBuilder};

mod counter;
pub use self::counter::Counter;

mod ewma;
pub use self::ewma::{Ewma, DEFAULT_TICK_INTERVAL};

mod gauge;
pub use self::gauge::Gauge;

mod histogram;
pub use self::histogram::Histogram;

mod kind;
pub use self::kind::{MetricKind, MetricKindMask};

mod meter;
pub use self::meter::Meter;

mod name;
pub use self::name::MetricName;

mod registry;
pub use self::registry::{Instrument, Metric, Registry, RegistryError, RegistryListener};

pub mod reporter;
pub use self::reporter::{LogReporter, LogReporterBuilder, Reporter, ScheduledReporter};

pub mod reservoir;

mod snapshot;
pub use self::snapshot::Snapshot;

mod ticker;
pub use self::ticker::Tick;

mod timer;
pub use self::timer::{Timer, TimerContext};

mod unit;
pub use self::unit::TimeUnit;
