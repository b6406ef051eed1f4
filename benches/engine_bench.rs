//! Benchmarks for NestKV engine and queue operations

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nestkv::queue::TaskQueue;
use nestkv::{Config, Engine};

fn engine_benchmarks(c: &mut Criterion) {
    let engine: Engine<String, u64> = Engine::new(
        Config::builder()
            .initial_capacity(1 << 16)
            .build(),
    );
    for i in 0..10_000u64 {
        engine.set(format!("key-{i}"), i).unwrap();
    }

    c.bench_function("engine_get_hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 10_000;
            black_box(engine.get(&format!("key-{i}")))
        })
    });

    c.bench_function("engine_get_miss", |b| {
        b.iter(|| black_box(engine.get(&"absent-key".to_string())))
    });

    c.bench_function("engine_set_update", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 10_000;
            engine.set(format!("key-{i}"), i).unwrap()
        })
    });
}

fn queue_benchmarks(c: &mut Criterion) {
    c.bench_function("queue_push_pop", |b| {
        let queue: TaskQueue<u64> = TaskQueue::with_capacity(1024);
        b.iter(|| {
            queue.try_push(black_box(1), 16).unwrap();
            black_box(queue.try_pop(16).unwrap())
        })
    });
}

criterion_group!(benches, engine_benchmarks, queue_benchmarks);
criterion_main!(benches);
