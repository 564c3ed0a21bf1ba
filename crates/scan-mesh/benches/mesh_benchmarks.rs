//! Benchmarks for scan-mesh processing stages.
//!
//! Run with: cargo bench -p scan-mesh
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p scan-mesh -- --save-baseline main
//! 2. After changes: cargo bench -p scan-mesh -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Point3;
use scan_mesh::{
    DecimateParams, HoleFillParams, Mesh, NoiseFilterParams, PipelineConfig, SmoothParams,
};
use std::f32::consts::PI;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Latitude/longitude sphere of radius 5 cm, Y up.
fn create_sphere(segments: u32, rings: u32) -> Mesh {
    let radius = 0.05;
    let mut vertices = vec![Point3::new(0.0, radius, 0.0)];
    for i in 1..rings {
        let theta = PI * i as f32 / rings as f32;
        let (y, rho) = (radius * theta.cos(), radius * theta.sin());
        for j in 0..segments {
            let phi = 2.0 * PI * j as f32 / segments as f32;
            vertices.push(Point3::new(rho * phi.cos(), y, rho * phi.sin()));
        }
    }
    let bottom = vertices.len() as u32;
    vertices.push(Point3::new(0.0, -radius, 0.0));

    let ring = |i: u32, j: u32| 1 + (i - 1) * segments + (j % segments);
    let mut faces = Vec::new();
    for j in 0..segments {
        faces.push([0, ring(1, j + 1), ring(1, j)]);
    }
    for i in 1..rings - 1 {
        for j in 0..segments {
            let (a, b) = (ring(i, j), ring(i, j + 1));
            let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
            faces.push([a, b, d]);
            faces.push([a, d, c]);
        }
    }
    for j in 0..segments {
        faces.push([ring(rings - 1, j), ring(rings - 1, j + 1), bottom]);
    }

    Mesh::from_parts(vertices, faces)
}

/// Sphere with every 25th face removed.
fn create_holey_sphere(segments: u32, rings: u32) -> Mesh {
    let mut mesh = create_sphere(segments, rings);
    let mut index = 0;
    mesh.faces.retain(|_| {
        index += 1;
        index % 25 != 0
    });
    mesh
}

fn test_cases() -> [(&'static str, Mesh); 3] {
    [
        ("sphere_1k", create_sphere(32, 16)),
        ("sphere_8k", create_sphere(96, 48)),
        ("sphere_60k", create_sphere(256, 128)),
    ]
}

// =============================================================================
// Stage Benchmarks
// =============================================================================

fn bench_noise_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("NoiseFilter");
    let params = NoiseFilterParams::default();

    for (name, mesh) in &test_cases() {
        group.throughput(Throughput::Elements(mesh.vertices.len() as u64));
        group.bench_with_input(BenchmarkId::new("remove_noise", name), mesh, |b, mesh| {
            b.iter(|| scan_mesh::remove_noise(black_box(mesh), &params))
        });
    }

    group.finish();
}

fn bench_hole_filling(c: &mut Criterion) {
    let mut group = c.benchmark_group("HoleFilling");
    let params = HoleFillParams::default();

    for (name, mesh) in [
        ("sphere_1k", create_holey_sphere(32, 16)),
        ("sphere_8k", create_holey_sphere(96, 48)),
    ] {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("fill_holes", name), &mesh, |b, mesh| {
            b.iter(|| scan_mesh::fill_holes(black_box(mesh), &params))
        });
    }

    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Smoothing");
    let params = SmoothParams::default();

    for (name, mesh) in &test_cases() {
        group.throughput(Throughput::Elements(mesh.vertices.len() as u64));
        group.bench_with_input(BenchmarkId::new("smooth", name), mesh, |b, mesh| {
            b.iter(|| scan_mesh::smooth(black_box(mesh), &params))
        });
    }

    group.finish();
}

fn bench_normals(c: &mut Criterion) {
    let mut group = c.benchmark_group("Normals");

    for (name, mesh) in &test_cases() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("vertex_normals", name), mesh, |b, mesh| {
            b.iter(|| scan_mesh::compute_vertex_normals(black_box(mesh)))
        });
    }

    group.finish();
}

fn bench_decimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Decimation");
    group.sample_size(20);

    for (name, mesh) in &test_cases() {
        for ratio in [0.5f32, 0.1] {
            let id = BenchmarkId::new(format!("ratio_{}", ratio), name);
            group.bench_with_input(id, mesh, |b, mesh| {
                b.iter(|| scan_mesh::decimate(black_box(mesh), &DecimateParams::with_ratio(ratio)))
            });
        }
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("Analysis");

    for (name, mesh) in &test_cases() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        group.bench_with_input(BenchmarkId::new("print_readiness", name), mesh, |b, mesh| {
            b.iter(|| scan_mesh::analyze_print_readiness(black_box(mesh)))
        });
    }

    group.finish();
}

// =============================================================================
// Pipeline and I/O Benchmarks
// =============================================================================

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    group.sample_size(10);
    let config = PipelineConfig::default();

    let mesh = create_holey_sphere(96, 48);
    group.throughput(Throughput::Elements(mesh.faces.len() as u64));
    group.bench_function("process_scan_8k", |b| {
        b.iter(|| scan_mesh::process_scan(black_box(mesh.clone()), &config))
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("Snapshot");

    let mut mesh = create_sphere(256, 128);
    mesh.recompute_normals();
    mesh.ensure_texture_coordinates();
    let bytes = scan_mesh::encode_snapshot(&mesh);

    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("encode_60k", |b| {
        b.iter(|| scan_mesh::encode_snapshot(black_box(&mesh)))
    });
    group.bench_function("decode_60k", |b| {
        b.iter(|| scan_mesh::decode_snapshot(black_box(&bytes)))
    });

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(
    benches,
    bench_noise_filter,
    bench_hole_filling,
    bench_smoothing,
    bench_normals,
    bench_decimation,
    bench_analysis,
    bench_pipeline,
    bench_snapshot,
);

criterion_main!(benches);
