/*!
 * Token Hand-off Benchmarks
 *
 * Cost of moving tokens through the single-slot monitor, uncontended and
 * across a network-style producer thread
 */

use actor_teleport::core::sync::TokenMonitor;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

const TOKEN_SIZES: [usize; 3] = [4, 64, 1024];

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_fill_drain");

    for size in TOKEN_SIZES {
        let monitor = TokenMonitor::new(size);
        let token = vec![0xa5u8; size];
        let mut out = vec![0u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                monitor.try_fill(black_box(&token));
                monitor.try_drain(black_box(&mut out));
            });
        });
    }

    group.finish();
}

fn bench_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_thread_handoff");
    const BATCH: u64 = 1_000;

    for size in TOKEN_SIZES {
        group.throughput(Throughput::Elements(BATCH));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let monitor = Arc::new(TokenMonitor::new(size));
                let producer = {
                    let monitor = Arc::clone(&monitor);
                    thread::spawn(move || {
                        let token = vec![1u8; size];
                        for _ in 0..BATCH {
                            monitor.wait_until_empty_then_fill(&token).unwrap();
                        }
                    })
                };

                // Scheduler side polls without blocking
                let mut out = vec![0u8; size];
                let mut drained = 0;
                while drained < BATCH {
                    if monitor.try_drain(&mut out) {
                        drained += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
                producer.join().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_cross_thread);
criterion_main!(benches);
