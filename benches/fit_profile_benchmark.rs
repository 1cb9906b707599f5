use criterion::{black_box, criterion_group, criterion_main, Criterion};
use criterion::BenchmarkId;
use membranequant::{
    self,
    data::reference::ReferenceCurves,
    ProfileFitter,
    QuantConfig,
};
use ndarray::prelude::*;

fn cell(size : usize, radius : f64, sigma : f64) -> (Array2<f64>, Array2<f64>) {
    let centre = size as f64 / 2.0;
    let img = Array2::from_shape_fn((size, size), |(row, col)| {
        let d = (col as f64 - centre).hypot(row as f64 - centre);
        4.0 * (1.0 + libm::erf((radius - d) / sigma)) / 2.0
            + 10.0 * (-(d - radius).powi(2) / (2.0 * sigma * sigma)).exp()
    });
    let n = (2.0 * std::f64::consts::PI * radius) as usize;
    let roi = Array2::from_shape_fn((n, 2), |(i, c)| {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
        if c == 0 { centre + radius * theta.cos() } else { centre + radius * theta.sin() }
    });
    (img, roi)
}

/// One profile at the default geometry (thickness 50, itp 10), with and
/// without the least-squares polish.
fn criterion_benchmark_single_profile(c: &mut Criterion) {
    let curves = ReferenceCurves::new(50, 2.0, 10);
    let profile = curves.model(240, 4.0, 10.0);
    let mut group = c.benchmark_group("Single profile fits");

    for polish in [false, true] {
        let fitter = ProfileFitter::new(&curves, 0.5, true, polish);
        group.bench_with_input(
            BenchmarkId::new("Fit 500-sample profile, polish", polish),
            &profile,
            |bench, profile| {
                bench.iter(|| black_box(fitter.fit_profile(&profile.view(), 0).unwrap()))
            },
        );
    }
    group.finish();
}

/// A whole single-pass run on a synthetic cell, serial and parallel.
fn criterion_benchmark_full_run(c: &mut Criterion) {
    let (img, roi) = cell(120, 40.0, 2.0);
    let mut group = c.benchmark_group("Full quantification");
    group.sample_size(10);

    for parallel in [false, true] {
        let config = QuantConfig {
            thickness : 20,
            iterations : 1,
            parallel,
            ..QuantConfig::with_sigma(2.0)
        };
        group.bench_with_input(
            BenchmarkId::new("One pass, 251 positions, parallel", parallel),
            &config,
            |bench, config| {
                bench.iter(|| black_box(
                    membranequant::quantify(img.clone(), roi.clone(), config.clone()).unwrap()
                ))
            },
        );
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark_single_profile, criterion_benchmark_full_run);
criterion_main!(benches);
