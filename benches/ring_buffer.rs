use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ring_intake::core::{BoundedQueue, Item};
use std::sync::Arc;
use std::thread;

fn benchmark_enqueue_dequeue(c: &mut Criterion) {
    let queue = BoundedQueue::new(1024).unwrap();

    c.bench_function("ring_enqueue_dequeue", |bench| {
        bench.iter(|| {
            queue.enqueue(black_box(42u64)).unwrap();
            black_box(queue.dequeue().unwrap())
        })
    });
}

fn benchmark_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_fill_drain");

    for capacity in [16usize, 256, 1000] {
        let queue = BoundedQueue::new(capacity).unwrap();
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |bench, &n| {
            bench.iter(|| {
                for i in 0..n as u64 {
                    queue.enqueue(i).unwrap();
                }
                // One past capacity is rejected
                black_box(queue.enqueue(u64::MAX).is_err());
                while let Ok(v) = queue.dequeue() {
                    black_box(v);
                }
            })
        });
    }

    group.finish();
}

fn benchmark_item_enqueue(c: &mut Criterion) {
    let queue = BoundedQueue::new(1000).unwrap();
    let mut seq = 0u64;

    c.bench_function("ring_item_enqueue_dequeue", |bench| {
        bench.iter(|| {
            seq += 1;
            queue
                .enqueue(Item::new(seq, format!("Hello, world! {seq}")))
                .unwrap();
            black_box(queue.dequeue().unwrap())
        })
    });
}

fn benchmark_contended(c: &mut Criterion) {
    const PER_THREAD: u64 = 1_000;

    let mut group = c.benchmark_group("ring_contended");
    group.throughput(Throughput::Elements(PER_THREAD * 4));

    group.bench_function("2p2c", |bench| {
        bench.iter(|| {
            let queue = Arc::new(BoundedQueue::new(256).unwrap());

            let producers: Vec<_> = (0..2)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut sent = 0;
                        while sent < PER_THREAD * 2 {
                            if queue.enqueue(sent).is_ok() {
                                sent += 1;
                            }
                        }
                    })
                })
                .collect();

            let consumers: Vec<_> = (0..2)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut taken = 0;
                        while taken < PER_THREAD * 2 {
                            if queue.dequeue().is_ok() {
                                taken += 1;
                            }
                        }
                    })
                })
                .collect();

            for handle in producers.into_iter().chain(consumers) {
                handle.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_enqueue_dequeue,
    benchmark_fill_drain,
    benchmark_item_enqueue,
    benchmark_contended
);
criterion_main!(benches);
