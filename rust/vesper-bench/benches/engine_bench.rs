//! Criterion benchmarks for the futures engine.
//!
//! Measures the cost of the hot construction paths: ready futures (which
//! must not allocate shared state), eager launches on the pool, deferred
//! chains, and the composition proxies.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use vesper_core::{
    launch, make_ready_future, schedule, when_all, ExecutorHandle, ThreadPool,
};

fn bench_make_ready(c: &mut Criterion) {
    c.bench_function("make_ready_future_get", |b| {
        b.iter(|| {
            let future = make_ready_future(black_box(42));
            black_box(future.get().unwrap())
        })
    });
}

fn bench_launch_get(c: &mut Criterion) {
    let pool = ExecutorHandle::new(ThreadPool::new(0));
    c.bench_function("launch_get", |b| {
        b.iter(|| {
            let future = launch(&pool, || black_box(2) + 2);
            black_box(future.get().unwrap())
        })
    });
}

fn bench_deferred_chain(c: &mut Criterion) {
    let pool = ExecutorHandle::new(ThreadPool::new(0));
    c.bench_function("deferred_chain_three_links", |b| {
        b.iter(|| {
            let chain = schedule(&pool, || black_box(1))
                .then(|v: i32| v + 1)
                .unwrap()
                .then(|v: i32| v * 2)
                .unwrap();
            black_box(chain.get().unwrap())
        })
    });
}

fn bench_when_all(c: &mut Criterion) {
    let pool = ExecutorHandle::new(ThreadPool::new(0));
    let mut group = c.benchmark_group("when_all");
    group.throughput(Throughput::Elements(3));
    group.bench_function("three_eager_children", |b| {
        let pool = pool.clone();
        b.iter(|| {
            let sum = when_all((
                launch(&pool, || 1),
                launch(&pool, || 2),
                launch(&pool, || 3),
            ))
            .then(|a: i32, b: i32, c: i32| a + b + c)
            .unwrap();
            black_box(sum.get().unwrap())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_make_ready,
    bench_launch_get,
    bench_deferred_chain,
    bench_when_all
);
criterion_main!(benches);
