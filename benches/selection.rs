//! Benchmarks for the per-call dispatch path: problem construction and
//! solution selection against a catalog of realistic size.

use std::fmt::Write;

use contractr::dtype::{DType, GemmTypes};
use contractr::engine::EngineBuilder;
use contractr::hardware::{Capabilities, HardwareDescriptor};
use contractr::launch::RecordingAdapter;
use contractr::library::{SolutionLibrary, StaticLocator};
use contractr::problem::{ContractionProblem, GemmRequest, Operation};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Catalog with `per_type` tuned variants for each transpose combination.
fn catalog(per_type: usize) -> String {
    let mut yaml = String::from("version: 1\nsolutions:\n");
    for (ta, tb) in [(false, false), (false, true), (true, false), (true, true)] {
        for i in 0..per_type {
            let tile = 32 << (i % 3);
            let size = 64 * (i + 1);
            let _ = writeln!(
                yaml,
                "  - name: sgemm_{ta}_{tb}_{i}\n    kernel: k_{ta}_{tb}_{i}\n    \
                 problem: {{ input: Float, output: Float, scalar: Float, \
                 transpose_a: {ta}, transpose_b: {tb} }}\n    \
                 macro_tile: [{tile}, {tile}]\n    workgroup: [16, 16, 1]\n    \
                 tuned_sizes: [[{size}, {size}, 1, {size}]]"
            );
        }
    }
    yaml
}

fn request(m: usize) -> GemmRequest {
    GemmRequest::new(GemmTypes::uniform(DType::F32).unwrap(), m, m, m)
        .transpose(Operation::None, Operation::Transpose)
}

fn bench_problem_build(c: &mut Criterion) {
    let req = request(1024);
    c.bench_function("problem_from_request", |b| {
        b.iter(|| ContractionProblem::from_request(black_box(&req)).unwrap())
    });
}

fn bench_select_best(c: &mut Criterion) {
    let hw = HardwareDescriptor::new("gfx90a", Capabilities::MATRIX_CORES);
    let mut group = c.benchmark_group("select_best");
    for per_type in [8usize, 64, 512] {
        let library = SolutionLibrary::from_yaml_str(&catalog(per_type), "bench").unwrap();
        let problem = ContractionProblem::from_request(&request(1000)).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(per_type * 4),
            &problem,
            |b, p| b.iter(|| library.select_best(black_box(p), &hw).map(|s| s.index())),
        );
    }
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let engine = EngineBuilder::new(RecordingAdapter::new().discard_history())
        .hardware(HardwareDescriptor::new("gfx90a", Capabilities::NONE))
        .locator(StaticLocator::new(catalog(64)).with_module("k_gfx90a.co"))
        .build()
        .unwrap();
    let req = request(512);
    c.bench_function("run_contraction", |b| {
        b.iter(|| engine.run_contraction(black_box(&req)))
    });
}

criterion_group!(benches, bench_problem_build, bench_select_best, bench_dispatch);
criterion_main!(benches);
