use criterion::{black_box, criterion_group, criterion_main, Criterion};
use coldb_core::sort::{argsort, quicksort};

fn random_data(n: usize, seed: u64) -> Vec<i32> {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..1_000_000)).collect()
}

fn bench_quicksort(c: &mut Criterion) {
    let mut group = c.benchmark_group("quicksort");
    for &n in &[1_000usize, 100_000, 1_000_000] {
        let data = random_data(n, 42);
        group.bench_function(format!("n={n}"), |b| {
            b.iter_batched(
                || data.clone(),
                |mut v| quicksort(black_box(&mut v)),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_argsort(c: &mut Criterion) {
    let mut group = c.benchmark_group("argsort");
    for &n in &[1_000usize, 100_000, 1_000_000] {
        let data = random_data(n, 7);
        let mut perm = vec![0usize; n];
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| argsort(black_box(&data), black_box(&mut perm)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_quicksort, bench_argsort);
criterion_main!(benches);
