//! Criterion benchmarks for the signal pipeline.
//!
//! 1. Structure analysis of a single window, at several window lengths
//! 2. Full signal generation for a single window
//! 3. Sliding the engine over a long synthetic series

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use venom_core::synthetic::{generate_bars, SyntheticSpec};
use venom_core::{analyze, generate_signal, Bar, EngineConfig};

fn series(n: usize) -> Vec<Bar> {
    let spec = SyntheticSpec { bars: n, ..Default::default() };
    generate_bars(&mut StdRng::seed_from_u64(42), &spec)
}

fn bench_analyze(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let mut group = c.benchmark_group("analyze");
    for len in [30usize, 100, 250] {
        let bars = series(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &bars, |b, bars| {
            b.iter(|| analyze(black_box(bars), &cfg))
        });
    }
    group.finish();
}

fn bench_generate_signal(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let bars = series(100);
    c.bench_function("generate_signal/100", |b| {
        b.iter(|| generate_signal("EURUSD", black_box(&bars), None, &cfg))
    });
}

fn bench_sliding(c: &mut Criterion) {
    let cfg = EngineConfig::default();
    let bars = series(2_000);
    let window = 100;
    c.bench_function("sliding/2000x100", |b| {
        b.iter(|| {
            let mut produced = 0usize;
            for end in window..=bars.len() {
                if generate_signal("EURUSD", &bars[end - window..end], None, &cfg).is_some() {
                    produced += 1;
                }
            }
            black_box(produced)
        })
    });
}

criterion_group!(benches, bench_analyze, bench_generate_signal, bench_sliding);
criterion_main!(benches);
