use criterion::{black_box, criterion_group, criterion_main, Criterion};
use coldb_core::config::Config;
use coldb_core::join::{join_naive_hash, join_radix_hash};
use coldb_core::pool::WorkerPool;

fn keyed(n: usize, cardinality: i32) -> Vec<i32> {
    (0..n as i32).map(|x| x % cardinality).collect()
}

fn bench_naive_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_naive_hash");
    for &n in &[10_000usize, 100_000] {
        let a = keyed(n, 1_000);
        let b = keyed(n, 1_000);
        let pa: Vec<usize> = (0..n).collect();
        let pb: Vec<usize> = (0..n).collect();
        group.bench_function(format!("n={n}"), |bench| bench.iter(|| join_naive_hash(black_box(&a), &pa, black_box(&b), &pb)));
    }
    group.finish();
}

fn bench_radix_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_radix_hash");
    let cfg = Config::default();
    let pool = WorkerPool::with_default_size(&cfg);
    for &n in &[100_000usize, 1_000_000] {
        let a = keyed(n, 10_000);
        let b = keyed(n, 10_000);
        let pa: Vec<usize> = (0..n).collect();
        let pb: Vec<usize> = (0..n).collect();
        group.bench_function(format!("n={n}"), |bench| bench.iter(|| join_radix_hash(&cfg, &pool, black_box(&a), &pa, black_box(&b), &pb)));
    }
    group.finish();
}

criterion_group!(benches, bench_naive_hash, bench_radix_hash);
criterion_main!(benches);
