//! Benchmarks for the kernel cache and end-to-end training.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use smorch::cache::{CacheQuery, KernelCache};
use smorch::{DenseDataset, Heuristics, Kernel, SmoConfig, TrainingSession};

/// Two overlapping Gaussian-ish blobs
fn blobs(n: usize, dim: usize, seed: u64) -> DenseDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = DenseDataset::default();
    for i in 0..n {
        let label = if i % 2 == 0 { 1.0 } else { -1.0 };
        let x = (0..dim)
            .map(|_| label * 0.75 + rng.gen_range(-1.0..1.0))
            .collect();
        data.push(x, vec![label]).unwrap();
    }
    data
}

/// Random pair lookups against caches of varying capacity
fn bench_cache_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel_cache");
    let n = 2000;
    let mut rng = StdRng::seed_from_u64(7);
    let pairs: Vec<(usize, usize)> = (0..10_000)
        .map(|_| (rng.gen_range(0..n / 4), rng.gen_range(0..n)))
        .collect();

    for size in [50, 200, 800] {
        group.throughput(Throughput::Elements(pairs.len() as u64));
        group.bench_with_input(BenchmarkId::new("query_insert", size), &size, |b, &size| {
            b.iter(|| {
                let mut cache = KernelCache::new(n, size);
                for &(i, j) in &pairs {
                    match cache.query(i, j) {
                        CacheQuery::Hit => {
                            black_box(cache.access(i, j));
                        }
                        CacheQuery::Miss => {
                            cache.insert(i, j, (i ^ j) as f64);
                        }
                        CacheQuery::NotCacheable => {}
                    }
                }
                cache.stats()
            })
        });
    }

    group.finish();
}

/// Full training runs with and without decomposition
fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n in [100, 300] {
        let data = blobs(n, 4, 42);
        group.bench_with_input(BenchmarkId::new("gaussian", n), &data, |b, data| {
            b.iter(|| {
                let config = SmoConfig {
                    kernel: Kernel::Gaussian,
                    ..SmoConfig::default()
                };
                let mut session = TrainingSession::new(data, config).ok()?;
                Some(session.train())
            })
        });
        group.bench_with_input(BenchmarkId::new("decomposed", n), &data, |b, data| {
            b.iter(|| {
                let config = SmoConfig {
                    kernel: Kernel::Gaussian,
                    cache_size: n / 4,
                    ..SmoConfig::default()
                };
                let mut session = TrainingSession::new(data, config).ok()?;
                Some(session.train())
            })
        });
    }

    let data = blobs(200, 4, 42);
    for (name, heuristics) in [
        ("default", Heuristics::default()),
        (
            "best_step",
            Heuristics {
                best_step: true,
                ..Heuristics::default()
            },
        ),
        (
            "no_ultra_clever",
            Heuristics {
                ultra_clever: false,
                ..Heuristics::default()
            },
        ),
    ] {
        group.bench_with_input(BenchmarkId::new("heuristics", name), &data, |b, data| {
            b.iter(|| {
                let config = SmoConfig {
                    kernel: Kernel::Gaussian,
                    heuristics,
                    ..SmoConfig::default()
                };
                let mut session = TrainingSession::new(data, config).ok()?;
                Some(session.train())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_access, bench_training);
criterion_main!(benches);
