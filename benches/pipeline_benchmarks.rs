use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use queueweld::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_basic_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_queue");
    let rt = runtime();

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("collect", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let queue = Queue::from_vec((0..size).collect::<Vec<i64>>());
                    black_box(queue.collect().await.unwrap());
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("pipe", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let queue = Queue::from_vec((0..size).collect::<Vec<i64>>());
                    let doubled = queue.pipe(|x| Ok(Some(black_box(x * 2)))).unwrap();
                    black_box(doubled.collect().await.unwrap());
                })
            });
        });
    }

    group.finish();
}

fn bench_push_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_batches");
    let rt = runtime();

    for batch_size in [1i64, 10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("push_all", batch_size),
            batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    rt.block_on(async {
                        let queue = Queue::new();
                        let mut pushed = 0i64;
                        while pushed < 10000 {
                            queue
                                .push_all((pushed..pushed + batch_size).map(black_box))
                                .unwrap();
                            pushed += batch_size;
                        }
                        queue.end().unwrap();
                        black_box(queue.collect().await.unwrap());
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("combinators");
    let rt = runtime();

    group.bench_function("pipe_batch_flat", |b| {
        b.iter(|| {
            rt.block_on(async {
                let output = Queue::from_vec((0..10000).collect::<Vec<i64>>())
                    .pipe(|x| Ok((x % 2 == 0).then(|| black_box(x * 3))))
                    .unwrap()
                    .batch(100)
                    .unwrap()
                    .flat()
                    .unwrap();
                black_box(output.collect().await.unwrap());
            })
        });
    });

    group.bench_function("fork_umerge", |b| {
        b.iter(|| {
            rt.block_on(async {
                let forks = Queue::from_vec((0..10000).collect::<Vec<i64>>())
                    .fork(2)
                    .unwrap();
                let merged = forks[0].umerge(&forks[1]).unwrap();
                black_box(merged.collect().await.unwrap());
            })
        });
    });

    group.finish();
}

fn bench_parallel_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_window");
    let rt = runtime();

    for concurrency in [1usize, 8, 64].iter() {
        group.bench_with_input(
            BenchmarkId::new("upipe", concurrency),
            concurrency,
            |b, &concurrency| {
                b.iter(|| {
                    rt.block_on(async {
                        let output = Queue::from_vec((0..2000).collect::<Vec<i64>>())
                            .upipe(|x| async move { Ok(Some(black_box(x + 1))) }, concurrency)
                            .unwrap();
                        black_box(output.collect().await.unwrap());
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_basic_queue,
    bench_push_batches,
    bench_combinators,
    bench_parallel_window
);
criterion_main!(benches);
