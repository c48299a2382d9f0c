use std::{fmt, sync::Arc};

use crate::{ticker::Tick, Counter, Gauge, Histogram, Meter, MetricKind, Timer};

/// A registered metric.
///
/// Cloning a `Metric` is cheap: it only clones the reference to the underlying instrument.
#[derive(Clone)]
pub enum Metric {
    /// A counter.
    Counter(Arc<Counter>),
    /// A gauge.
    Gauge(Arc<Gauge>),
    /// A histogram.
    Histogram(Arc<Histogram>),
    /// A meter.
    Meter(Arc<Meter>),
    /// A timer.
    Timer(Arc<Timer>),
}

impl Metric {
    /// Gets the kind of this metric.
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }

    /// Whether or not both metrics refer to the same instrument.
    pub fn ptr_eq(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(a, b),
            (Metric::Gauge(a), Metric::Gauge(b)) => Arc::ptr_eq(a, b),
            (Metric::Histogram(a), Metric::Histogram(b)) => Arc::ptr_eq(a, b),
            (Metric::Meter(a), Metric::Meter(b)) => Arc::ptr_eq(a, b),
            (Metric::Timer(a), Metric::Timer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Counter(counter) => f.debug_tuple("Counter").field(counter).finish(),
            Metric::Gauge(gauge) => f.debug_tuple("Gauge").field(gauge).finish(),
            Metric::Histogram(histogram) => f.debug_tuple("Histogram").field(histogram).finish(),
            Metric::Meter(meter) => f.debug_tuple("Meter").field(meter).finish(),
            Metric::Timer(timer) => f.debug_tuple("Timer").field(timer).finish(),
        }
    }
}

/// An instrument that can be stored in a [`Registry`](crate::Registry).
pub trait Instrument: Send + Sync + Sized + 'static {
    /// The kind of metric this instrument is registered as.
    const KIND: MetricKind;

    /// Wraps this instrument up as a [`Metric`].
    fn into_metric(this: Arc<Self>) -> Metric;

    /// Extracts an instrument of this type from `metric`, if it holds one.
    fn from_metric(metric: &Metric) -> Option<Arc<Self>>;

    /// Gets the handle to tick this instrument with, if it needs ticking.
    fn as_tick(_this: &Arc<Self>) -> Option<Arc<dyn Tick>> {
        None
    }
}

macro_rules! impl_instrument {
    ($ty:ident, $kind:ident) => {
        impl_instrument!($ty, $kind, |_this| None);
    };
    ($ty:ident, $kind:ident, ticked) => {
        impl_instrument!($ty, $kind, |this| Some(Arc::clone(this) as Arc<dyn Tick>));
    };
    ($ty:ident, $kind:ident, |$this:ident| $tick:expr) => {
        impl Instrument for $ty {
            const KIND: MetricKind = MetricKind::$kind;

            fn into_metric(this: Arc<Self>) -> Metric {
                Metric::$kind(this)
            }

            fn from_metric(metric: &Metric) -> Option<Arc<Self>> {
                match metric {
                    Metric::$kind(inner) => Some(Arc::clone(inner)),
                    _ => None,
                }
            }

            fn as_tick($this: &Arc<Self>) -> Option<Arc<dyn Tick>> {
                $tick
            }
        }
    };
}

impl_instrument!(Counter, Counter);
impl_instrument!(Gauge, Gauge);
impl_instrument!(Histogram, Histogram);
impl_instrument!(Meter, Meter, ticked);
impl_instrument!(Timer, Timer, ticked);
