use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use approx::assert_relative_eq;
use metrics_instruments::{
    Counter, Ewma, Histogram, Meter, Metric, MetricKind, MetricName, RegistryBuilder, RegistryError,
    RegistryListener, Tick, TimeUnit, Timer,
};
use parking_lot::Mutex;
use quanta::Clock;

#[test]
fn histogram_of_one_to_one_hundred() {
    let histogram = Histogram::default();
    for value in 1..=100 {
        histogram.update(value);
    }

    let snapshot = histogram.snapshot();
    assert_eq!(snapshot.count(), 100);
    assert_eq!(snapshot.min(), 1);
    assert_eq!(snapshot.max(), 100);
    assert_eq!(snapshot.sum(), 5050);
    assert_relative_eq!(snapshot.mean(), 50.5, epsilon = 1e-9);
    assert_relative_eq!(snapshot.std_dev(), 29.011491975882016, epsilon = 1e-9);
    assert_relative_eq!(snapshot.median(), 50.5, epsilon = 1e-9);
    assert_relative_eq!(snapshot.p75(), 75.75, epsilon = 1e-9);
    assert_relative_eq!(snapshot.p99(), 99.99, epsilon = 1e-9);
    assert_eq!(snapshot.value(1.5), None);
}

#[test]
fn meter_counts_across_ticks() {
    let (clock, mock) = Clock::mock();
    let meter = Meter::with_clock(clock, Duration::from_secs(5));

    meter.mark_n(5);
    mock.increment(Duration::from_secs(5));
    meter.tick();
    meter.mark_n(3);
    mock.increment(Duration::from_secs(5));
    meter.tick();

    assert_eq!(meter.count(), 8);
    assert_relative_eq!(meter.mean_rate(), 0.8, epsilon = 1e-9);
}

#[test]
fn ewma_starts_at_the_first_interval_rate() {
    let ewma = Ewma::one_minute(Duration::from_secs(5));
    ewma.update(3);
    ewma.tick();

    assert_relative_eq!(ewma.rate(TimeUnit::Seconds), 0.6, epsilon = 1e-12);
    assert_relative_eq!(ewma.rate(TimeUnit::Minutes), 36.0, epsilon = 1e-9);
}

#[test]
fn timer_ignores_negative_durations() {
    let timer = Timer::new();
    timer.update(-1, TimeUnit::Nanoseconds);

    assert_eq!(timer.count(), 0);
    assert_eq!(timer.snapshot().size(), 0);
}

#[test]
fn existing_names_do_not_call_the_factory() {
    let registry = RegistryBuilder::new().build().unwrap();
    let calls = AtomicUsize::new(0);

    let first = registry
        .get_or_create("jobs", || {
            calls.fetch_add(1, Ordering::Relaxed);
            Counter::new()
        })
        .unwrap();
    let second = registry
        .get_or_create("jobs", || {
            calls.fetch_add(1, Ordering::Relaxed);
            Counter::new()
        })
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    let err = registry.meter("jobs").unwrap_err();
    assert_eq!(
        err,
        RegistryError::KindMismatch {
            name: MetricName::from("jobs"),
            expected: MetricKind::Meter,
            found: MetricKind::Counter,
        }
    );
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(bool, MetricName)>>,
}

impl RegistryListener for Recorder {
    fn on_metric_added(&self, name: &MetricName, _metric: &Metric) {
        self.events.lock().push((true, name.clone()));
    }

    fn on_metric_removed(&self, name: &MetricName, _metric: &Metric) {
        self.events.lock().push((false, name.clone()));
    }
}

#[test]
fn listeners_see_registry_changes() {
    let registry = RegistryBuilder::new().build().unwrap();
    registry.counter("before").unwrap();

    let recorder = Arc::new(Recorder::default());
    registry.add_listener(recorder.clone());

    registry.histogram(["db", "rows"]).unwrap();
    registry.histogram(["db", "rows"]).unwrap();
    registry.remove(&MetricName::from("before"));

    let events = recorder.events.lock().clone();
    assert_eq!(
        events,
        vec![
            (true, MetricName::from("before")),
            (true, MetricName::from(["db", "rows"])),
            (false, MetricName::from("before")),
        ]
    );
}
