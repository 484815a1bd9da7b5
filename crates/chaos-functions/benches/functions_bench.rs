// ─────────────────────────────────────────────────────────────────────
// Chaos Intelligence — Function Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for per-call cost of the chaotic functions and
//! the one-off conformance check.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chaos_functions::conformance::{self, Probe};
use chaos_functions::{
    CommonPiecewiseFunction, DeterministicFunction, HasseAlgorithm, LorenzAttractor,
    LorenzSampler,
};

fn bench_lorenz_step(c: &mut Criterion) {
    let mut lorenz = LorenzAttractor::default();
    c.bench_function("lorenz_rk4_step", |b| {
        b.iter(|| {
            if lorenz.step(black_box(0.01)).is_err() {
                lorenz.reset();
            }
        })
    });
}

fn bench_lorenz_sampler(c: &mut Criterion) {
    let mut sampler = LorenzSampler::new(7, [10.0, 10.0, 10.0]).unwrap();
    let input: [f64; 0] = [];
    c.bench_function("lorenz_sampler", |b| {
        b.iter(|| sampler.evaluate(black_box(&input)))
    });
}

fn bench_hasse_stopping_time(c: &mut Criterion) {
    c.bench_function("hasse_stopping_time_27", |b| {
        b.iter(|| HasseAlgorithm::stopping_time(black_box(27)))
    });
}

fn bench_piecewise(c: &mut Criterion) {
    let f = CommonPiecewiseFunction::new("bands")
        .branch(|x| x < -1.0, |x| -x)
        .branch(|x| x < 0.0, |x| x * x)
        .branch(|x| x < 1.0, |x| x.sin())
        .otherwise(|x| x.ln());
    c.bench_function("piecewise_4_branches", |b| {
        b.iter(|| f.evaluate(black_box(0.5)))
    });
}

fn bench_conformance(c: &mut Criterion) {
    let lorenz = LorenzAttractor::default();
    c.bench_function("conformance_lorenz", |b| {
        b.iter(|| conformance::check(black_box(&lorenz), &Probe::default()))
    });
}

criterion_group!(
    benches,
    bench_lorenz_step,
    bench_lorenz_sampler,
    bench_hasse_stopping_time,
    bench_piecewise,
    bench_conformance,
);
criterion_main!(benches);
