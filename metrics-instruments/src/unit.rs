use std::fmt;

/// Units of time.
///
/// Used both to scale durations recorded by timers and to express rates (events per unit).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    ///
    /// One microsecond is equal to 1000 nanoseconds.
    Microseconds,
    /// Milliseconds.
    ///
    /// One millisecond is equal to 1000 microseconds.
    Milliseconds,
    /// Seconds.
    ///
    /// One second is equal to 1000 milliseconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Gets the string form of this `TimeUnit`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }

    /// Gets the canonical string label for the given unit.
    ///
    /// For example, the canonical label for `Milliseconds` would be `ms`.
    pub fn as_canonical_label(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "μs",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    /// Converts the string representation of a unit back into `TimeUnit` if possible.
    ///
    /// The value passed here should match the output of [`TimeUnit::as_str`].
    pub fn from_string(s: &str) -> Option<TimeUnit> {
        match s {
            "nanoseconds" => Some(TimeUnit::Nanoseconds),
            "microseconds" => Some(TimeUnit::Microseconds),
            "milliseconds" => Some(TimeUnit::Milliseconds),
            "seconds" => Some(TimeUnit::Seconds),
            "minutes" => Some(TimeUnit::Minutes),
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            _ => None,
        }
    }

    /// Number of nanoseconds in one of this unit.
    pub const fn nanos(&self) -> i64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 60 * 60 * 1_000_000_000,
            TimeUnit::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }

    /// Converts `value` of this unit into nanoseconds, saturating at the bounds of `i64`.
    pub fn to_nanos(&self, value: i64) -> i64 {
        value.saturating_mul(self.nanos())
    }

    /// Converts a quantity of nanoseconds into a (fractional) quantity of this unit.
    pub fn convert_from_nanos(&self, nanos: f64) -> f64 {
        nanos / self.nanos() as f64
    }

    /// Converts a per-second rate into a per-unit rate.
    ///
    /// An event rate of 2/s becomes 120/min, and 0.002/ms.
    pub fn scale_rate(&self, per_second: f64) -> f64 {
        per_second * (self.nanos() as f64 / 1e9)
    }

    /// Converts a per-nanosecond rate into a per-unit rate.
    pub(crate) fn scale_nanos_rate(&self, per_nanosecond: f64) -> f64 {
        per_nanosecond * self.nanos() as f64
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TimeUnit;

    #[test]
    fn test_unit_conversions() {
        let units = [
            TimeUnit::Nanoseconds,
            TimeUnit::Microseconds,
            TimeUnit::Milliseconds,
            TimeUnit::Seconds,
            TimeUnit::Minutes,
            TimeUnit::Hours,
            TimeUnit::Days,
        ];

        for unit in units {
            let s = unit.as_str();
            let parsed = TimeUnit::from_string(s);
            assert_eq!(Some(unit), parsed);
        }

        assert_eq!(TimeUnit::from_string("fortnights"), None);
    }

    #[test]
    fn to_nanos_saturates() {
        assert_eq!(TimeUnit::Milliseconds.to_nanos(10), 10_000_000);
        assert_eq!(TimeUnit::Nanoseconds.to_nanos(-1), -1);
        assert_eq!(TimeUnit::Days.to_nanos(i64::MAX), i64::MAX);
        assert_eq!(TimeUnit::Days.to_nanos(i64::MIN), i64::MIN);
    }

    #[test]
    fn rate_scaling() {
        assert_eq!(TimeUnit::Minutes.scale_rate(2.0), 120.0);
        assert_eq!(TimeUnit::Seconds.scale_rate(2.0), 2.0);
        assert!((TimeUnit::Milliseconds.scale_rate(2.0) - 0.002).abs() < 1e-12);
        assert_eq!(TimeUnit::Milliseconds.convert_from_nanos(2_500_000.0), 2.5);
    }
}
