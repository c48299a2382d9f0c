use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use metrics_instruments::{Counter, MetricName, Registry};

fn registry_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    group.bench_function("cached lookup (basic)", |b| {
        let registry = Registry::builder().build().unwrap();
        let name = MetricName::from("simple_key");
        registry.counter(name.clone()).unwrap();

        b.iter(|| registry.counter(name.clone()).unwrap())
    });
    group.bench_function("cached lookup (segments)", |b| {
        let registry = Registry::builder().build().unwrap();
        let name = MetricName::from(["http", "requests", "simple_key"]);
        registry.counter(name.clone()).unwrap();

        b.iter(|| registry.counter(name.clone()).unwrap())
    });
    group.bench_function("uncached lookup", |b| {
        b.iter_batched_ref(
            || Registry::builder().build().unwrap(),
            |registry| registry.get_or_create("simple_key", Counter::new).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("snapshot all (1000 metrics)", |b| {
        let registry = Registry::builder().build().unwrap();
        for i in 0..1000 {
            registry.counter(format!("counter{}", i)).unwrap();
        }

        b.iter(|| registry.all_metrics())
    });
    group.bench_function("name overhead", |b| {
        b.iter(|| MetricName::new(["http", "requests", "simple_key"]))
    });
    group.finish();
}

criterion_group!(benches, registry_benchmark);
criterion_main!(benches);
