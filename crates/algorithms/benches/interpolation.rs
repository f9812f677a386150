//! Benchmarks for the baseline and quick resamplers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use escarp_algorithms::interpolation::{bicubic_upsample, threshold_resample};
use escarp_algorithms::terrain::gaussian_smooth;
use escarp_core::{GeoTransform, Raster};

fn create_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));

    for row in 0..size {
        for col in 0..size {
            let base = (row + col) as f64;
            let variation = ((row * 7 + col * 13) % 100) as f64 / 10.0;
            dem.set(row, col, base + variation).unwrap();
        }
    }
    dem
}

fn bench_bicubic(c: &mut Criterion) {
    let mut group = c.benchmark_group("bicubic_upsample");

    for size in [64, 128, 256].iter() {
        let dem = create_dem(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| bicubic_upsample(black_box(&dem), 8).unwrap())
        });
    }

    group.finish();
}

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold_resample");

    for size in [64, 128, 256].iter() {
        let dem = create_dem(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| threshold_resample(black_box(&dem), 8, 50.0).unwrap())
        });
    }

    group.finish();
}

fn bench_gaussian(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_smooth");

    for size in [256, 512, 1024].iter() {
        let dem = create_dem(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| gaussian_smooth(black_box(&dem), 1.0).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bicubic, bench_threshold, bench_gaussian);
criterion_main!(benches);
