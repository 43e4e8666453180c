//! Criterion benchmarks for the hot paths: fill, merge, and the JSON codec.
//!
//! Discover benches:
//!   cargo bench --bench fill_merge -- --list
//!
//! Save a baseline:
//!   cargo bench --bench fill_merge -- --save-baseline core_base
//!
//! Compare later:
//!   cargo bench --bench fill_merge -- --baseline core_base "fill/histogram"

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use histogrammar::primitives::{AdaptivelyBinning, Aggregating, Binning, SparselyBinning};
use histogrammar::{histogram, Factory, Quantity};

fn gen_dataset(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-5.0..5.0)).collect()
}

fn dense_histogram() -> Aggregating<f64> {
    histogram(
        100,
        -5.0,
        5.0,
        Quantity::new(|x: &f64| *x),
        histogrammar::unweighted(),
    )
    .expect("build histogram")
}

fn filled_tree(kind: &str, data: &[f64]) -> Aggregating<f64> {
    let mut tree: Aggregating<f64> = match kind {
        "histogram" => dense_histogram(),
        "sparse" => SparselyBinning::new(0.1, Quantity::new(|x: &f64| *x), Aggregating::count())
            .expect("build sparse")
            .into(),
        "adaptive" => AdaptivelyBinning::new(
            Quantity::new(|x: &f64| *x),
            100,
            0.2,
            Aggregating::count(),
        )
        .expect("build adaptive")
        .into(),
        other => panic!("unknown tree kind {other:?}"),
    };
    for x in data {
        tree.fill(x, 1.0).expect("fill");
    }
    tree
}

/* ------------------------ BENCH: FILL ------------------------ */

fn bench_fill(c: &mut Criterion) {
    let n = 100_000;
    let data = gen_dataset(n, 42);

    let mut g = c.benchmark_group("fill");
    g.throughput(Throughput::Elements(n as u64));
    for kind in ["histogram", "sparse", "adaptive"] {
        g.bench_function(BenchmarkId::from_parameter(kind), |b| {
            b.iter(|| black_box(filled_tree(kind, &data)));
        });
    }
    g.finish();
}

/* ------------------------ BENCH: MERGE ------------------------ */

fn bench_merge(c: &mut Criterion) {
    let data = gen_dataset(200_000, 7);
    let (left, right) = data.split_at(100_000);

    let mut g = c.benchmark_group("merge");
    for kind in ["histogram", "sparse", "adaptive"] {
        let a = filled_tree(kind, left);
        let b = filled_tree(kind, right);
        g.bench_function(BenchmarkId::from_parameter(kind), |bench| {
            bench.iter(|| black_box(a.merge(&b).expect("merge")));
        });
    }
    g.finish();
}

/* ------------------------ BENCH: JSON CODEC ------------------------ */

fn bench_codec(c: &mut Criterion) {
    let data = gen_dataset(100_000, 99);
    let tree = filled_tree("histogram", &data);
    let text = tree.to_json();

    let mut g = c.benchmark_group("codec");
    g.bench_function("to_json", |b| {
        b.iter(|| black_box(tree.to_json()));
    });
    g.bench_function("from_json", |b| {
        b.iter(|| black_box(Factory::from_json(black_box(&text)).expect("decode")));
    });
    g.finish();
}

/* ------------------------ BENCH: BIN SIZE SWEEP ------------------------ */

fn bench_bin_sizes(c: &mut Criterion) {
    let data = gen_dataset(100_000, 4242);

    let mut g = c.benchmark_group("fill/bin_sizes");
    g.throughput(Throughput::Elements(data.len() as u64));
    for num in [10usize, 100, 1_000, 10_000] {
        g.bench_with_input(BenchmarkId::from_parameter(num), &num, |b, &num| {
            b.iter(|| {
                let mut bin: Aggregating<f64> = Binning::new(
                    num,
                    -5.0,
                    5.0,
                    Quantity::new(|x: &f64| *x),
                    Aggregating::count(),
                )
                .expect("build")
                .into();
                for x in &data {
                    bin.fill(x, 1.0).expect("fill");
                }
                black_box(bin)
            });
        });
    }
    g.finish();
}

/* ------------------------ CONFIG ------------------------ */

fn configure() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(2))
        .sample_size(30)
        .without_plots()
}

criterion_group!(
    name = core_benches;
    config = configure();
    targets = bench_fill, bench_merge, bench_codec, bench_bin_sizes
);

criterion_main!(core_benches);
