use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use meters::{MeterId, MeterRegistry, Tag};

fn registry_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("cached counter (basic)", |b| {
        let registry = MeterRegistry::new();
        registry.counter("simple_key", ()).unwrap();

        b.iter(|| registry.counter("simple_key", ()).unwrap())
    });
    group.bench_function("cached counter (tags)", |b| {
        let registry = MeterRegistry::new();
        static TAGS: [Tag; 1] = [Tag::from_static_parts("type", "http")];
        registry.counter("simple_key", &TAGS).unwrap();

        b.iter(|| registry.counter("simple_key", &TAGS).unwrap())
    });
    group.bench_function("uncached counter (basic)", |b| {
        b.iter_batched_ref(
            MeterRegistry::new,
            |registry| registry.counter("simple_key", ()).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("uncached counter (tags)", |b| {
        b.iter_batched_ref(
            MeterRegistry::new,
            |registry| registry.counter("simple_key", &[("type", "http")]).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("held counter increment", |b| {
        let registry = MeterRegistry::new();
        let counter = registry.counter("simple_key", ()).unwrap();

        b.iter(|| counter.increment())
    });
    group.bench_function("held timer record", |b| {
        let registry = MeterRegistry::new();
        let timer = registry.timer("simple_key", ()).unwrap();

        b.iter(|| timer.record(Duration::from_micros(250)))
    });
    group.bench_function("search (tags)", |b| {
        let registry = MeterRegistry::new();
        for route in ["/", "/users", "/orders", "/health"] {
            registry.counter("requests", &[("route", route)]).unwrap();
        }

        b.iter(|| registry.find("requests").tag("route", "/users").counter().unwrap())
    });
    group.bench_function("registry overhead", |b| {
        b.iter_batched(|| (), |_| MeterRegistry::new(), BatchSize::NumIterations(1))
    });
    group.bench_function("id overhead (basic)", |b| b.iter(|| MeterId::from_name("simple_key")));
    group.bench_function("id overhead (tags)", |b| {
        b.iter(|| {
            let tags = vec![Tag::new("type", "http"), Tag::new("route", "/users")];
            MeterId::new("simple_key", tags)
        })
    });

    group.finish();
}

criterion_group!(benches, registry_benchmark);
criterion_main!(benches);
