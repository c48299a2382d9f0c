use std::{fmt, ops::BitOr};

/// Metric kind.
///
/// Defines the kind, or type, of a metric:
/// - counters
/// - gauges
/// - histograms
/// - meters
/// - timers
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Histogram type.
    Histogram,
    /// Meter type.
    Meter,
    /// Timer type.
    Timer,
}

impl MetricKind {
    /// Gets the string form of this `MetricKind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric kind mask.
///
/// Useful for matching against a kind, or kinds, of metrics.
///
/// In order to use for defining multiple metric kinds, can be used in a bitmask fashion, as this
/// type implements bitwise OR support, and checking for inclusion of a specific kind within another
/// kind value can be checked via [`matches`](MetricKindMask::matches):
///
/// ```rust
/// # use metrics_instruments::{MetricKind, MetricKindMask};
/// # fn main() {
/// // Let's only match meters and timers:
/// let mask = MetricKindMask::METER | MetricKindMask::TIMER;
///
/// // And check to see if the kinds we have matches our mask:
/// assert!(!mask.matches(MetricKind::Gauge));
/// assert!(mask.matches(MetricKind::Timer));
///
/// // There's even two handy versions to avoid extra typing:
/// let none_mask = MetricKindMask::NONE;
/// let all_mask = MetricKindMask::ALL;
///
/// assert!(!none_mask.matches(MetricKind::Counter));
/// assert!(all_mask.matches(MetricKind::Histogram));
/// # }
/// ```
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Ord, PartialOrd)]
pub struct MetricKindMask(u8);

impl MetricKindMask {
    /// No metric kinds.
    pub const NONE: MetricKindMask = MetricKindMask(0);

    /// The counter kind.
    pub const COUNTER: MetricKindMask = MetricKindMask(1);

    /// The gauge kind.
    pub const GAUGE: MetricKindMask = MetricKindMask(2);

    /// The histogram kind.
    pub const HISTOGRAM: MetricKindMask = MetricKindMask(4);

    /// The meter kind.
    pub const METER: MetricKindMask = MetricKindMask(8);

    /// The timer kind.
    pub const TIMER: MetricKindMask = MetricKindMask(16);

    /// All metric kinds.
    pub const ALL: MetricKindMask = MetricKindMask(31);

    #[inline]
    fn value(&self) -> u8 {
        self.0
    }

    /// Whether or not this metric kind contains the specified kind.
    pub fn matches(&self, kind: MetricKind) -> bool {
        let bit = match kind {
            MetricKind::Counter => MetricKindMask::COUNTER,
            MetricKind::Gauge => MetricKindMask::GAUGE,
            MetricKind::Histogram => MetricKindMask::HISTOGRAM,
            MetricKind::Meter => MetricKindMask::METER,
            MetricKind::Timer => MetricKindMask::TIMER,
        };
        self.0 & bit.value() != 0
    }
}

impl Default for MetricKindMask {
    fn default() -> Self {
        MetricKindMask::ALL
    }
}

impl BitOr for MetricKindMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
