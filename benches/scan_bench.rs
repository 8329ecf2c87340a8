use criterion::{black_box, criterion_group, criterion_main, Criterion};
use coldb_core::config::Config;
use coldb_core::pool::WorkerPool;
use coldb_core::scan::{shared_scan, shared_scan_parallel, AggFlags, SelectSpec};

fn data(n: usize) -> Vec<i32> {
    (0..n as i32).map(|x| x % 10_000).collect()
}

fn bench_sequential_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_scan_sequential");
    let agg = AggFlags { min: true, max: true, sum: true };
    let selects = vec![SelectSpec { lo: 100, hi: 5_000 }];
    for &n in &[100_000usize, 1_000_000, 10_000_000] {
        let d = data(n);
        group.bench_function(format!("n={n}"), |b| b.iter(|| shared_scan(black_box(&d), None, &selects, agg)));
    }
    group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_scan_parallel");
    let cfg = Config::default();
    let pool = WorkerPool::with_default_size(&cfg);
    let agg = AggFlags { min: true, max: true, sum: true };
    let selects = vec![SelectSpec { lo: 100, hi: 5_000 }];
    for &n in &[100_000usize, 1_000_000, 10_000_000] {
        let d = data(n);
        group.bench_function(format!("n={n}"), |b| b.iter(|| shared_scan_parallel(&pool, black_box(&d), None, &selects, agg, &cfg)));
    }
    group.finish();
}

criterion_group!(benches, bench_sequential_scan, bench_parallel_scan);
criterion_main!(benches);
