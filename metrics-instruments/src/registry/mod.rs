//! Central storage of named metrics.

mod metric;
use std::{
    collections::BTreeMap,
    hash::BuildHasher,
    iter::repeat,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use hashbrown::{DefaultHashBuilder, HashMap};
use quanta::Clock;
use thiserror::Error;
use tracing::{debug, warn};

pub use self::metric::{Instrument, Metric};
use crate::{
    reservoir::{
        ExponentiallyDecayingReservoir, SamplingKind, SlidingTimeWindowReservoir,
        SlidingWindowReservoir, UniformReservoir,
    },
    ticker::{TickHandle, Ticker},
    Counter, Gauge, Histogram, Meter, MetricKind, MetricKindMask, MetricName, RegistryBuilder,
    TimeUnit, Timer,
};

/// Errors that can occur when looking up a metric.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A metric already exists under the name, but it is of another kind.
    #[error("metric `{name}` is registered as a {found}, not a {expected}")]
    KindMismatch {
        /// Name of the metric.
        name: MetricName,
        /// Kind that was requested.
        expected: MetricKind,
        /// Kind that is registered.
        found: MetricKind,
    },
}

/// Observes metrics being added to and removed from a [`Registry`].
///
/// Callbacks run on the thread that added or removed the metric, after the registry has released
/// the shard holding it, so they may look metrics up.
pub trait RegistryListener: Send + Sync {
    /// Called after a metric is added.
    fn on_metric_added(&self, name: &MetricName, metric: &Metric);

    /// Called after a metric is removed.
    fn on_metric_removed(&self, _name: &MetricName, _metric: &Metric) {}
}

/// Settings applied to the instruments a registry creates.
#[derive(Clone, Debug)]
pub(crate) struct InstrumentConfig {
    pub reservoir_size: usize,
    pub decay_alpha: f64,
    pub rescale_threshold: Duration,
    pub default_sampling: SamplingKind,
    pub clock: Clock,
    pub rate_unit: TimeUnit,
    pub duration_unit: TimeUnit,
}

struct Entry {
    metric: Metric,
    tick: Option<TickHandle>,
}

type Shard = RwLock<HashMap<MetricName, Entry>>;

fn downcast<T: Instrument>(name: &MetricName, metric: &Metric) -> Result<Arc<T>, RegistryError> {
    T::from_metric(metric).ok_or_else(|| {
        warn!(%name, expected = %T::KIND, found = %metric.kind(), "metric kind mismatch");
        RegistryError::KindMismatch { name: name.clone(), expected: T::KIND, found: metric.kind() }
    })
}

/// A registry of named metrics.
///
/// Metrics are created lazily, on first request for a name, and live until they are removed or
/// the registry is dropped.  Only one metric ever exists for a given name: when several threads
/// race to create the same metric, exactly one of them creates it and all of them get it back.
///
/// Meters and timers are ticked by a background thread owned by the registry, which stops when
/// the registry is dropped.
///
/// ## Performance
///
/// `Registry` is optimized for reads.  Metrics are spread over a number of independently locked
/// shards, and looking up an existing metric only takes a read lock on its shard.
pub struct Registry {
    shards: Vec<Shard>,
    shard_mask: usize,
    hasher: DefaultHashBuilder,
    listeners: parking_lot::RwLock<Vec<Arc<dyn RegistryListener>>>,
    config: InstrumentConfig,
    ticker: Ticker,
}

impl Registry {
    /// Creates a [`RegistryBuilder`] to configure a new `Registry`.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn from_parts(config: InstrumentConfig, ticker: Ticker) -> Registry {
        let shard_count = std::cmp::max(1, num_cpus::get()).next_power_of_two();
        let shard_mask = shard_count - 1;
        let shards = repeat(()).take(shard_count).map(|_| RwLock::new(HashMap::new())).collect();

        Registry {
            shards,
            shard_mask,
            hasher: DefaultHashBuilder::default(),
            listeners: parking_lot::RwLock::new(Vec::new()),
            config,
            ticker,
        }
    }

    #[inline]
    fn shard_for(&self, name: &MetricName) -> &Shard {
        // The shard count is a power of two and `shard_mask` is one less than it, so the masked
        // hash is always in bounds.
        let hash = self.hasher.hash_one(name);
        &self.shards[hash as usize & self.shard_mask]
    }

    /// Gets the metric registered under `name`, creating it with `factory` if it does not exist.
    ///
    /// `factory` is only called if no metric exists under `name`, and is called with the shard
    /// holding `name` locked for writing: it must not call back into this registry.
    ///
    /// # Errors
    ///
    /// If a metric of another kind is already registered under `name`, an error variant will be
    /// returned describing the conflict.
    pub fn get_or_create<T, N, F>(&self, name: N, factory: F) -> Result<Arc<T>, RegistryError>
    where
        T: Instrument,
        N: Into<MetricName>,
        F: FnOnce() -> T,
    {
        let name = name.into();
        let shard = self.shard_for(&name);

        // Try and get the metric if it exists.
        {
            let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = shard_read.get(&name) {
                return downcast(&name, &entry.metric);
            }
        }

        // Switch to write guard, making sure nobody beat us to it.
        let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = shard_write.get(&name) {
            return downcast(&name, &entry.metric);
        }

        let instrument = Arc::new(factory());
        let tick = T::as_tick(&instrument).map(|tick| self.ticker.register(&tick));
        let metric = T::into_metric(Arc::clone(&instrument));
        shard_write.insert(name.clone(), Entry { metric: metric.clone(), tick });
        drop(shard_write);

        debug!(%name, kind = %T::KIND, "registered metric");
        for listener in self.listeners.read().iter() {
            listener.on_metric_added(&name, &metric);
        }

        Ok(instrument)
    }

    /// Gets or creates a counter.
    pub fn counter<N>(&self, name: N) -> Result<Arc<Counter>, RegistryError>
    where
        N: Into<MetricName>,
    {
        self.get_or_create(name, Counter::new)
    }

    /// Gets or creates a gauge sampling `f`.
    ///
    /// If a gauge already exists under `name`, it is returned as is and `f` is dropped.
    pub fn gauge<N, F>(&self, name: N, f: F) -> Result<Arc<Gauge>, RegistryError>
    where
        N: Into<MetricName>,
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.get_or_create(name, || Gauge::new(f))
    }

    /// Gets or creates a histogram using the registry's default sampling.
    pub fn histogram<N>(&self, name: N) -> Result<Arc<Histogram>, RegistryError>
    where
        N: Into<MetricName>,
    {
        self.histogram_with_sampling(name, self.config.default_sampling)
    }

    /// Gets or creates a histogram biased towards recent values.
    pub fn biased_histogram<N>(&self, name: N) -> Result<Arc<Histogram>, RegistryError>
    where
        N: Into<MetricName>,
    {
        self.histogram_with_sampling(name, SamplingKind::ExponentiallyDecaying)
    }

    /// Gets or creates a histogram with the given sampling.
    ///
    /// The sampling only applies if the histogram is created by this call.
    pub fn histogram_with_sampling<N>(
        &self,
        name: N,
        sampling: SamplingKind,
    ) -> Result<Arc<Histogram>, RegistryError>
    where
        N: Into<MetricName>,
    {
        self.get_or_create(name, || self.new_histogram(sampling))
    }

    /// Gets or creates a meter.
    pub fn meter<N>(&self, name: N) -> Result<Arc<Meter>, RegistryError>
    where
        N: Into<MetricName>,
    {
        self.get_or_create(name, || self.new_meter())
    }

    /// Gets or creates a timer.
    pub fn timer<N>(&self, name: N) -> Result<Arc<Timer>, RegistryError>
    where
        N: Into<MetricName>,
    {
        self.get_or_create(name, || {
            Timer::with_parts(
                self.new_histogram(SamplingKind::ExponentiallyDecaying),
                self.new_meter(),
                self.config.clock.clone(),
            )
            .with_units(self.config.rate_unit, self.config.duration_unit)
        })
    }

    fn new_histogram(&self, sampling: SamplingKind) -> Histogram {
        let config = &self.config;
        match sampling {
            SamplingKind::Uniform => Histogram::new(UniformReservoir::new(config.reservoir_size)),
            SamplingKind::ExponentiallyDecaying => {
                Histogram::new(ExponentiallyDecayingReservoir::with_rescale_threshold(
                    config.reservoir_size,
                    config.decay_alpha,
                    config.rescale_threshold,
                    config.clock.clone(),
                ))
            }
            SamplingKind::SlidingWindow => Histogram::new(SlidingWindowReservoir::new(config.reservoir_size)),
            SamplingKind::SlidingTimeWindow(window) => Histogram::new(SlidingTimeWindowReservoir::new(
                window,
                config.reservoir_size,
                config.clock.clone(),
            )),
        }
    }

    fn new_meter(&self) -> Meter {
        Meter::with_clock(self.config.clock.clone(), self.ticker.interval())
    }

    /// Gets the metric registered under `name`, if any.
    pub fn get(&self, name: &MetricName) -> Option<Metric> {
        let shard = self.shard_for(name);
        let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
        shard_read.get(name).map(|entry| entry.metric.clone())
    }

    /// Removes the metric registered under `name`, returning it if it existed.
    ///
    /// A removed meter or timer is no longer ticked.  Handles to it held elsewhere stay usable,
    /// but nothing they record is visible through the registry anymore.
    pub fn remove(&self, name: &MetricName) -> Option<Metric> {
        let shard = self.shard_for(name);
        let entry = shard.write().unwrap_or_else(PoisonError::into_inner).remove(name)?;
        let metric = self.retire(name, entry);
        self.notify_removed(name, &metric);
        Some(metric)
    }

    /// Removes every metric for which `predicate` returns `true`, returning how many were removed.
    ///
    /// This operation proceeds through the shards one at a time, so metrics added concurrently
    /// may or may not be visited.
    pub fn remove_matching<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&MetricName, &Metric) -> bool,
    {
        let mut removed = Vec::new();
        for shard in &self.shards {
            let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
            let names = shard_write
                .iter()
                .filter(|(name, entry)| predicate(name, &entry.metric))
                .map(|(name, _)| name.clone())
                .collect::<Vec<_>>();
            for name in names {
                if let Some(entry) = shard_write.remove(&name) {
                    removed.push((name, entry));
                }
            }
        }

        let count = removed.len();
        for (name, entry) in removed {
            let metric = self.retire(&name, entry);
            self.notify_removed(&name, &metric);
        }
        count
    }

    /// Removes every metric of the kinds in `mask`, returning how many were removed.
    pub fn remove_kinds(&self, mask: MetricKindMask) -> usize {
        self.remove_matching(|_, metric| mask.matches(metric.kind()))
    }

    /// Removes all metrics from the registry.
    ///
    /// This operation is eventually consistent: metrics will be removed piecemeal, and this method
    /// does not ensure that callers will see the registry as entirely empty at any given point.
    pub fn clear(&self) {
        self.remove_matching(|_, _| true);
    }

    fn retire(&self, name: &MetricName, entry: Entry) -> Metric {
        if let Some(tick) = &entry.tick {
            self.ticker.deregister(tick);
        }
        debug!(%name, kind = %entry.metric.kind(), "removed metric");
        entry.metric
    }

    fn notify_removed(&self, name: &MetricName, metric: &Metric) {
        for listener in self.listeners.read().iter() {
            listener.on_metric_removed(name, metric);
        }
    }

    /// Gets the number of registered metrics.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len()).sum()
    }

    /// Whether or not no metric is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every registered metric.
    ///
    /// This operation does not lock the entire registry, but proceeds directly through the
    /// shards that are kept internally.  As a result, all shards will be visited, but a metric
    /// that existed at the exact moment that `visit` was called may not actually be observed if it
    /// is deleted before that shard is reached.  Likewise, a metric that is added after the call
    /// to `visit`, but before `visit` finishes, may also not be observed.
    pub fn visit<F>(&self, mut collect: F)
    where
        F: FnMut(&MetricName, &Metric),
    {
        for shard in &self.shards {
            let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
            for (name, entry) in shard_read.iter() {
                collect(name, &entry.metric);
            }
        }
    }

    /// Gets every registered metric, sorted by name.
    pub fn all_metrics(&self) -> BTreeMap<MetricName, Metric> {
        let mut metrics = BTreeMap::new();
        self.visit(|name, metric| {
            metrics.insert(name.clone(), metric.clone());
        });
        metrics
    }

    /// Gets every registered metric, grouped by the parent of their name.
    ///
    /// A metric named `["db", "pool", "connections"]` lands in the `["db", "pool"]` group.
    pub fn grouped_metrics(&self) -> BTreeMap<MetricName, BTreeMap<MetricName, Metric>> {
        self.grouped_metrics_matching(|_, _| true)
    }

    /// Gets every registered metric for which `predicate` returns `true`, grouped by the parent
    /// of their name.
    pub fn grouped_metrics_matching<F>(
        &self,
        mut predicate: F,
    ) -> BTreeMap<MetricName, BTreeMap<MetricName, Metric>>
    where
        F: FnMut(&MetricName, &Metric) -> bool,
    {
        let mut groups: BTreeMap<MetricName, BTreeMap<MetricName, Metric>> = BTreeMap::new();
        self.visit(|name, metric| {
            if predicate(name, metric) {
                groups.entry(name.parent()).or_default().insert(name.clone(), metric.clone());
            }
        });
        groups
    }

    /// Adds a listener notified of every metric added to or removed from this registry.
    ///
    /// The listener is immediately notified of every metric already registered.  A metric
    /// registered concurrently with this call may be reported to the listener twice.
    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        self.listeners.write().push(Arc::clone(&listener));
        self.visit(|name, metric| listener.on_metric_added(name, metric));
    }

    /// Removes a listener previously added with [`add_listener`](Registry::add_listener).
    ///
    /// Returns `true` if the listener was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn RegistryListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    /// Ticks every registered meter and timer once, right now.
    ///
    /// The background ticker keeps ticking them on its own schedule.
    pub fn tick_now(&self) {
        self.ticker.tick_now();
    }

    /// Gets the interval at which meters and timers are ticked.
    pub fn tick_interval(&self) -> Duration {
        self.ticker.interval()
    }

    /// Gets the unit rates of this registry's timers are presented in.
    pub fn rate_unit(&self) -> TimeUnit {
        self.config.rate_unit
    }

    /// Gets the unit durations of this registry's timers are presented in.
    pub fn duration_unit(&self) -> TimeUnit {
        self.config.duration_unit
    }
}
