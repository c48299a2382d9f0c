use std::fmt;

/// A gauge.
///
/// A gauge does not store anything: it wraps a closure that is sampled every time the gauge is
/// read, such as the depth of a queue or the number of open connections.
pub struct Gauge {
    sample: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl Gauge {
    /// Creates a new `Gauge` that samples `f` whenever it is read.
    pub fn new<F>(f: F) -> Gauge
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Gauge { sample: Box::new(f) }
    }

    /// Samples the current value.
    pub fn value(&self) -> f64 {
        (self.sample)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}
