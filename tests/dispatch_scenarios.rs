//! End-to-end dispatch through an engine with a recording adapter

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::test_engine;
use contractr::dtype::{Complex128, DType, GemmTypes};
use contractr::launch::{EventId, KernelArg, StreamId, TimingEvents};
use contractr::problem::{ContractionProblem, DevicePtr, GemmRequest, Operation, TensorOp};
use contractr::scalar::ScalarArg;
use contractr::Status;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

fn operands() -> (DevicePtr, DevicePtr, DevicePtr, DevicePtr) {
    (
        DevicePtr(0xa000),
        DevicePtr(0xb000),
        DevicePtr(0xc000),
        DevicePtr(0xd000),
    )
}

fn sgemm(m: usize, n: usize, k: usize) -> GemmRequest {
    let (a, b, c, d) = operands();
    GemmRequest::new(GemmTypes::uniform(DType::F32).unwrap(), m, n, k).operands(a, b, c, d)
}

#[test]
fn scenario_a_zero_k_scales_c_only() {
    let engine = test_engine();
    let req = sgemm(64, 64, 0).scalars(ScalarArg::host(5.0f32), ScalarArg::host(2.0f32));

    assert_eq!(engine.run_contraction(&req), Status::Success);

    let launches = engine.adapter().launches();
    assert_eq!(launches.len(), 1);
    let args = &launches[0].args;
    match (&args[4], &args[5]) {
        (KernelArg::Scalar(alpha), KernelArg::Scalar(beta)) => {
            assert_eq!(alpha.get::<f32>(), Some(0.0));
            assert!(alpha.is_zero_bytes());
            assert_eq!(beta.get::<f32>(), Some(2.0));
        }
        other => panic!("unexpected scalar args {other:?}"),
    }
    // Sizes close the argument list: free0, free1, batch, bound.
    assert_eq!(
        &args[args.len() - 4..],
        &[
            KernelArg::Size(64),
            KernelArg::Size(64),
            KernelArg::Size(1),
            KernelArg::Size(1)
        ]
    );
}

#[test]
fn scenario_a_device_alpha_is_also_zeroed() {
    let engine = test_engine();
    let req = sgemm(64, 64, 0).scalars(
        ScalarArg::device(DevicePtr(0xf000)),
        ScalarArg::device(DevicePtr(0xf004)),
    );
    assert_eq!(engine.run_contraction(&req), Status::Success);

    let args = &engine.adapter().launches()[0].args;
    assert!(matches!(args[4], KernelArg::Scalar(alpha) if alpha.is_zero_bytes()));
    assert_eq!(args[5], KernelArg::ScalarPointer(DevicePtr(0xf004)));
}

#[test]
fn scenario_b_conjugate_on_a_only() {
    let types = GemmTypes::uniform(DType::Complex128).unwrap();
    let (a, b, c, d) = operands();
    let req = GemmRequest::new(types, 32, 32, 16)
        .transpose(Operation::ConjugateTranspose, Operation::None)
        .operands(a, b, c, d)
        .scalars(
            ScalarArg::host(Complex128::new(1.0, 0.5)),
            ScalarArg::host(Complex128::ZERO),
        );

    let problem = ContractionProblem::from_request(&req).unwrap();
    assert_eq!(problem.a_ops(), &[TensorOp::ComplexConjugate]);
    assert!(problem.b_ops().is_empty());

    let engine = test_engine();
    assert_eq!(engine.run_contraction(&req), Status::Success);
    assert_eq!(engine.adapter().launches()[0].solution, "zgemm_cn");
}

#[test]
fn scenario_c_half_storage_float_accumulate() {
    let types = GemmTypes::new(DType::F16, DType::F16, DType::F32).unwrap();
    let req = GemmRequest::new(types, 256, 256, 64)
        .scalars(ScalarArg::host(0.5f32), ScalarArg::host(0.0f32));

    let problem = ContractionProblem::from_request(&req).unwrap();
    assert!(problem.high_precision_accumulate());

    let engine = test_engine();
    assert_eq!(engine.run_contraction(&req), Status::Success);
    let launch = &engine.adapter().launches()[0];
    assert_eq!(launch.solution, "hgemm_hpa_nn");
    match launch.args[4] {
        KernelArg::Scalar(alpha) => {
            assert_eq!(alpha.get::<half::f16>(), Some(half::f16::from_f32(0.5)))
        }
        ref other => panic!("unexpected alpha {other:?}"),
    }
}

/// Counts WARN events from the diagnostics target
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() == Level::WARN && meta.target() == "contractr::diagnostics" {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn scenario_d_missing_solution_logged_once() {
    let engine = test_engine();
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));

    // f64 has no solution in the catalog.
    let req = GemmRequest::new(GemmTypes::uniform(DType::F64).unwrap(), 48, 48, 48);
    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..1000 {
            assert_eq!(engine.run_contraction(&req), Status::NotImplemented);
        }
    });

    assert_eq!(warnings.load(Ordering::SeqCst), 1);
    assert_eq!(engine.diagnostics().len(), 1);
    assert_eq!(engine.adapter().launch_count(), 0);
}

#[test]
fn size_predicate_miss_is_not_implemented() {
    let engine = test_engine();
    let types = GemmTypes::new(DType::F16, DType::F16, DType::F32).unwrap();
    // k not a multiple of the depth unroll
    let req = GemmRequest::new(types, 256, 256, 48)
        .scalars(ScalarArg::host(1.0f32), ScalarArg::host(0.0f32));
    assert_eq!(engine.run_contraction(&req), Status::NotImplemented);
}

#[test]
fn timed_launch_takes_event_path() {
    let engine = test_engine();
    let events = TimingEvents {
        start: EventId(1),
        stop: EventId(2),
    };
    let req = sgemm(128, 128, 128).on_stream(StreamId(3)).timed(events);
    assert_eq!(engine.run_contraction(&req), Status::Success);

    let launch = &engine.adapter().launches()[0];
    assert!(launch.timed);
    assert_eq!(launch.stream, StreamId(3));
    assert_eq!(launch.config.grid, (2, 2, 1));
}

#[test]
fn transposed_request_selects_transposed_solution() {
    let engine = test_engine();
    let req = sgemm(64, 32, 16).transpose(Operation::Transpose, Operation::ConjugateTranspose);
    assert_eq!(engine.run_contraction(&req), Status::Success);
    assert_eq!(engine.adapter().launches()[0].solution, "sgemm_tt");
}

#[test]
fn concurrent_dispatch_is_isolated() {
    let engine = Arc::new(test_engine());
    let handles: Vec<_> = (1..=16usize)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let req = sgemm(64 * i, 32, 8).on_stream(StreamId(i as u64));
                (i, engine.run_contraction(&req))
            })
        })
        .collect();
    for handle in handles {
        let (_, status) = handle.join().unwrap();
        assert_eq!(status, Status::Success);
    }

    let launches = engine.adapter().launches();
    assert_eq!(launches.len(), 16);
    for launch in launches {
        let i = launch.stream.0 as usize;
        assert_eq!(launch.config.grid, (i as u32, 1, 1));
        assert_eq!(launch.args[launch.args.len() - 4], KernelArg::Size(64 * i as u64));
    }
    assert_eq!(engine.library().len(), 4);
}
