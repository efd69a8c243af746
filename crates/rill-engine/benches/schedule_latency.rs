use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam::channel;
use rill_engine::{EventLoop, Scheduler, Subscription, WorkerPool};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn bench_event_loop(c: &mut Criterion) {
    let event_loop = EventLoop::start().unwrap();
    let worker = event_loop.scheduler().create_worker(Subscription::new());
    let (tx, rx) = channel::unbounded();

    c.bench_function("event_loop_schedule_roundtrip", |b| {
        b.iter(|| {
            let tx = tx.clone();
            worker.schedule(move || {
                let _ = tx.send(black_box(1u32));
            });
            rx.recv_timeout(WAIT).unwrap()
        });
    });
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_schedule");

    for workers in [1usize, 4] {
        let pool = WorkerPool::with_workers(workers).unwrap();
        let worker = pool.scheduler().create_worker(Subscription::new());
        let (tx, rx) = channel::unbounded();

        group.bench_with_input(BenchmarkId::new("roundtrip", workers), &workers, |b, _| {
            b.iter(|| {
                let tx = tx.clone();
                worker.schedule(move || {
                    let _ = tx.send(black_box(1u32));
                });
                rx.recv_timeout(WAIT).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("burst_64", workers), &workers, |b, _| {
            b.iter(|| {
                for i in 0..64u32 {
                    let tx = tx.clone();
                    worker.schedule(move || {
                        let _ = tx.send(i);
                    });
                }
                for _ in 0..64 {
                    rx.recv_timeout(WAIT).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_recursion(c: &mut Criterion) {
    let pool = WorkerPool::with_workers(2).unwrap();
    let worker = pool.scheduler().create_worker(Subscription::new());

    c.bench_function("pool_recursive_100", |b| {
        b.iter(|| {
            let (tx, rx) = channel::bounded(1);
            let mut remaining = 100u32;
            worker.schedule_recursive(move |recurse| {
                remaining -= 1;
                if remaining == 0 {
                    let _ = tx.send(());
                } else {
                    recurse.again();
                }
            });
            rx.recv_timeout(WAIT).unwrap()
        });
    });
}

criterion_group!(benches, bench_event_loop, bench_pool, bench_recursion);
criterion_main!(benches);
