//! Search benchmarks for the flat lifecycle index and the IVF index,
//! fresh and after a deletion wave.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vecbench::dataset::RandomVectorGenerator;
use vecbench::index::FlatBackend;
use vecbench::lifecycle::LifecycleConfig;
use vecbench::{IvfIndex, LifecycleIndex, Metric, Vector};

const DIMENSION: usize = 64;
const N_BASE: usize = 10_000;
const K: usize = 10;

fn dataset() -> (Vec<Vector>, Vec<Vec<f32>>) {
    vecbench::init_tracing();
    let mut generator = RandomVectorGenerator::new(42);
    let base = generator.generate(N_BASE, DIMENSION);
    let queries = (0..32).map(|_| generator.embedding(DIMENSION)).collect();
    (base, queries)
}

fn flat_lifecycle(base: &[Vector]) -> LifecycleIndex<FlatBackend> {
    let index = LifecycleIndex::new(
        FlatBackend::new(DIMENSION, Metric::Euclidean),
        LifecycleConfig {
            dimension: DIMENSION,
            compaction_threshold: 100_000,
            search_budget: 100,
        },
    );
    for v in base {
        index.insert(v.clone()).unwrap();
    }
    index
}

fn bench_flat_search(c: &mut Criterion) {
    let (base, queries) = dataset();
    let index = flat_lifecycle(&base);

    let mut cursor = 0;
    c.bench_function("flat_lifecycle_search_10k", |b| {
        b.iter(|| {
            let query = &queries[cursor % queries.len()];
            cursor += 1;
            black_box(index.search(black_box(query), K).unwrap())
        })
    });
}

fn bench_flat_search_with_tombstones(c: &mut Criterion) {
    let (base, queries) = dataset();
    let index = flat_lifecycle(&base);
    for v in &base[..N_BASE / 2] {
        index.delete(&v.id).unwrap();
    }

    let mut cursor = 0;
    c.bench_function("flat_lifecycle_search_50pct_tombstoned", |b| {
        b.iter(|| {
            let query = &queries[cursor % queries.len()];
            cursor += 1;
            black_box(index.search(black_box(query), K).unwrap())
        })
    });
}

fn bench_ivf_search(c: &mut Criterion) {
    let (base, queries) = dataset();
    let mut index = IvfIndex::new(100, 10, Metric::Euclidean);
    index.build(&base).unwrap();

    let mut cursor = 0;
    c.bench_function("ivf_search_10k_nlist100_nprobe10", |b| {
        b.iter(|| {
            let query = &queries[cursor % queries.len()];
            cursor += 1;
            black_box(index.search(black_box(query), K).unwrap())
        })
    });
}

fn bench_ivf_build(c: &mut Criterion) {
    let (base, _) = dataset();
    let small: Vec<Vector> = base[..2_000].to_vec();

    c.bench_function("ivf_build_2k_nlist50", |b| {
        b.iter(|| {
            let mut index = IvfIndex::new(50, 5, Metric::Euclidean);
            index.build(black_box(&small)).unwrap();
            black_box(index)
        })
    });
}

criterion_group!(
    benches,
    bench_flat_search,
    bench_flat_search_with_tombstones,
    bench_ivf_search,
    bench_ivf_build
);
criterion_main!(benches);
