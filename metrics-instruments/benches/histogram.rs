use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metrics_instruments::{reservoir::SamplingKind, Histogram, Meter, TimeUnit, Timer};

const SAMPLINGS: [(&str, SamplingKind); 4] = [
    ("uniform", SamplingKind::Uniform),
    ("decaying", SamplingKind::ExponentiallyDecaying),
    ("sliding", SamplingKind::SlidingWindow),
    ("sliding_time", SamplingKind::SlidingTimeWindow(Duration::from_secs(60))),
];

fn histogram_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");
    group.throughput(Throughput::Elements(1));
    for (label, sampling) in SAMPLINGS {
        group.bench_function(BenchmarkId::new("update", label), |b| {
            let histogram = Histogram::with_sampling(sampling);
            let mut value = 0i64;
            b.iter(|| {
                value = value.wrapping_add(1);
                histogram.update(value)
            })
        });
        group.bench_function(BenchmarkId::new("snapshot", label), |b| {
            let histogram = Histogram::with_sampling(sampling);
            for i in 0..10_000 {
                histogram.update(i);
            }
            b.iter(|| histogram.snapshot())
        });
    }

    // Updates from a second thread contend with the measured one.
    group.bench_function("update (contended)", |b| {
        let histogram = Arc::new(Histogram::with_sampling(SamplingKind::ExponentiallyDecaying));
        let running = Arc::new(AtomicBool::new(true));
        let background = {
            let histogram = Arc::clone(&histogram);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut value = 0i64;
                while running.load(Ordering::Relaxed) {
                    value = value.wrapping_add(1);
                    histogram.update(value);
                }
            })
        };

        b.iter(|| histogram.update(42));

        running.store(false, Ordering::Relaxed);
        background.join().unwrap();
    });
    group.finish();

    let mut group = c.benchmark_group("rated");
    group.bench_function("meter mark", |b| {
        let meter = Meter::new();
        b.iter(|| meter.mark())
    });
    group.bench_function("timer update", |b| {
        let timer = Timer::new();
        b.iter(|| timer.update(250, TimeUnit::Microseconds))
    });
    group.finish();
}

criterion_group!(benches, histogram_benchmark);
criterion_main!(benches);
