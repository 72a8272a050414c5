use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use rewp::{artifact::detect, erp::trimmed_mean, ArtifactThresholds};

/// 200 trials × 32 channels × 201 samples (0.8 s at 250 Hz).
fn trials() -> Array3<f64> {
    Array3::from_shape_fn((200, 32, 201), |(e, c, t)| {
        20e-6 * ((e * 31 + c * 7) as f64 * 0.01 + t as f64 * 0.05).sin()
    })
}

fn bench_detect(c: &mut Criterion) {
    let x = trials();
    let th = ArtifactThresholds::erp();
    c.bench_function("artifact::detect [200×32×201]", |b| {
        b.iter(|| {
            let mask = detect(black_box(x.view()), &th);
            black_box(mask[[0, 0]])
        })
    });
}

fn bench_trimmed_mean(c: &mut Criterion) {
    let x = trials();
    c.bench_function("trimmed_mean 5% [200×32×201]", |b| {
        b.iter(|| {
            let ev = trimmed_mean(black_box(x.view()), 0.05).unwrap();
            black_box(ev[[0, 0]])
        })
    });
    c.bench_function("trimmed_mean 0% [200×32×201]", |b| {
        b.iter(|| {
            let ev = trimmed_mean(black_box(x.view()), 0.0).unwrap();
            black_box(ev[[0, 0]])
        })
    });
}

criterion_group!(benches, bench_detect, bench_trimmed_mean);
criterion_main!(benches);
