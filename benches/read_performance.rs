//! Read-path benchmarks for namespace caches.
//!
//! Reads go to a local store and should stay in the tens of nanoseconds,
//! uncontended and while the sync loop applies snapshots.

use apollo_client::prelude::*;
use apollo_client::store::MemoryStoreFactory;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn snapshot(size: usize, generation: u64) -> HashMap<String, Value> {
    (0..size)
        .map(|i| (format!("key.{}", i), json!(format!("{}-{}", generation, i))))
        .collect()
}

fn warm_namespace(size: usize) -> NamespaceConfig {
    let namespace = NamespaceConfig::new("application", &MemoryStoreFactory);
    namespace.update(&snapshot(size, 0));
    namespace
}

/// Single-threaded read latency
fn benchmark_read_latency(c: &mut Criterion) {
    let namespace = warm_namespace(100);

    let mut group = c.benchmark_group("read_latency");
    group.bench_function("get_value", |b| {
        b.iter(|| black_box(namespace.get("key.42", ReadMode::Immediate)));
    });
    group.bench_function("get_int_default", |b| {
        b.iter(|| black_box(namespace.get_int("missing", 7, ReadMode::Immediate)));
    });
    group.bench_function("get_wait_for_init", |b| {
        b.iter(|| black_box(namespace.get("key.42", ReadMode::WaitForInit)));
    });
    group.finish();
}

/// Concurrent reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let namespace = Arc::new(warm_namespace(100));
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let mut handles = vec![];

                    for _ in 0..num_threads {
                        let namespace = Arc::clone(&namespace);
                        let barrier = Arc::clone(&barrier);

                        handles.push(thread::spawn(move || {
                            barrier.wait();
                            let start = std::time::Instant::now();
                            for _ in 0..iters {
                                black_box(namespace.get("key.42", ReadMode::Immediate));
                            }
                            start.elapsed()
                        }));
                    }

                    barrier.wait();
                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Snapshot application while 8 threads keep reading
fn benchmark_update_under_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_under_load");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("update_with_8_readers", |b| {
        b.iter_custom(|iters| {
            let namespace = Arc::new(warm_namespace(100));
            let running = Arc::new(AtomicBool::new(true));
            let reads = Arc::new(AtomicUsize::new(0));

            let readers: Vec<_> = (0..8)
                .map(|_| {
                    let namespace = Arc::clone(&namespace);
                    let running = Arc::clone(&running);
                    let reads = Arc::clone(&reads);
                    thread::spawn(move || {
                        while running.load(Ordering::Relaxed) {
                            black_box(namespace.get("key.42", ReadMode::Immediate));
                            reads.fetch_add(1, Ordering::Relaxed);
                        }
                    })
                })
                .collect();

            let start = std::time::Instant::now();
            for generation in 1..=iters {
                black_box(namespace.update(&snapshot(100, generation)));
            }
            let duration = start.elapsed();

            running.store(false, Ordering::Relaxed);
            for reader in readers {
                reader.join().unwrap();
            }
            println!(
                "  Completed {} reads during {} updates",
                reads.load(Ordering::Relaxed),
                iters
            );
            duration
        });
    });

    group.finish();
}

/// Diff and apply cost by namespace size
fn benchmark_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let namespace = warm_namespace(size);
            let mut generation = 0;
            b.iter(|| {
                generation += 1;
                black_box(namespace.update(&snapshot(size, generation)));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_read_latency,
    benchmark_concurrent_reads,
    benchmark_update_under_load,
    benchmark_update,
);

criterion_main!(benches);
