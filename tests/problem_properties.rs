//! Property tests for request → contraction problem conversion

use contractr::dtype::{DType, GemmTypes};
use contractr::problem::{ContractionProblem, GemmRequest, Operation, TensorOp};
use contractr::scalar::{ContractionInputs, KernelScalar, ScalarArg};
use proptest::prelude::*;

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::None),
        Just(Operation::Transpose),
        Just(Operation::ConjugateTranspose),
    ]
}

fn types() -> impl Strategy<Value = GemmTypes> {
    let all: Vec<GemmTypes> = GemmTypes::all().collect();
    proptest::sample::select(all)
}

proptest! {
    #[test]
    fn zero_k_forces_unit_extent_and_zero_alpha(
        m in 1usize..512,
        n in 1usize..512,
        batch in 1usize..8,
        alpha in -1.0e6f32..1.0e6,
        beta in -1.0e6f32..1.0e6,
    ) {
        let types = GemmTypes::uniform(DType::F32).unwrap();
        let req = GemmRequest::new(types, m, n, 0)
            .strided_batch(batch, m, n, m * n, m * n)
            .scalars(ScalarArg::host(alpha), ScalarArg::host(beta));

        let problem = ContractionProblem::from_request(&req).unwrap();
        prop_assert_eq!(problem.bound_size(), 1);
        prop_assert_eq!(problem.size_point(), [m, n, batch, 1]);

        let inputs = ContractionInputs::marshal(&req).unwrap();
        let alpha_native = inputs.alpha.value().and_then(|v| v.get::<f32>());
        prop_assert_eq!(alpha_native, Some(0.0));
        let beta_native = inputs.beta.value().and_then(|v| v.get::<f32>());
        prop_assert_eq!(beta_native, Some(beta));
    }

    #[test]
    fn transpose_swaps_roles(
        m in 1usize..256,
        n in 1usize..256,
        k in 1usize..256,
        trans_a in operation(),
        trans_b in operation(),
        types in types(),
    ) {
        let req = GemmRequest::new(types, m, n, k).transpose(trans_a, trans_b);
        let problem = ContractionProblem::from_request(&req).unwrap();
        let [free_a, free_b] = *problem.free_indices();
        let bound = problem.bound_index();

        if trans_a.is_transposed() {
            prop_assert_eq!(problem.a().sizes(), &[k, m, 1]);
            prop_assert_eq!((free_a.i, bound.a), (1, 0));
        } else {
            prop_assert_eq!(problem.a().sizes(), &[m, k, 1]);
            prop_assert_eq!((free_a.i, bound.a), (0, 1));
        }
        if trans_b.is_transposed() {
            prop_assert_eq!(problem.b().sizes(), &[n, k, 1]);
            prop_assert_eq!((free_b.i, bound.b), (0, 1));
        } else {
            prop_assert_eq!(problem.b().sizes(), &[k, n, 1]);
            prop_assert_eq!((free_b.i, bound.b), (1, 0));
        }
        // The leading dimension is always the second stride.
        prop_assert_eq!(problem.a().strides()[1], req.ld_a);
        prop_assert_eq!(problem.b().strides()[1], req.ld_b);
        prop_assert_eq!(problem.size_point(), [m, n, 1, k]);
    }

    #[test]
    fn conjugate_iff_complex(
        trans_a in operation(),
        trans_b in operation(),
        types in types(),
    ) {
        let req = GemmRequest::new(types, 8, 8, 8).transpose(trans_a, trans_b);
        let problem = ContractionProblem::from_request(&req).unwrap();
        let complex = types.input().is_complex();

        let expect = |op: Operation| complex && op == Operation::ConjugateTranspose;
        prop_assert_eq!(problem.a_ops().contains(&TensorOp::ComplexConjugate), expect(trans_a));
        prop_assert_eq!(problem.b_ops().contains(&TensorOp::ComplexConjugate), expect(trans_b));
    }
}

#[test]
fn high_precision_accumulate_iff_wider_compute() {
    for types in GemmTypes::all() {
        let req = GemmRequest::new(types, 16, 16, 16);
        let problem = ContractionProblem::from_request(&req).unwrap();
        let wider = types.compute().size_in_bytes() > types.input().size_in_bytes();
        assert_eq!(problem.high_precision_accumulate(), wider, "{types}");
    }
}

#[test]
fn device_scalars_pass_through() {
    let types = GemmTypes::uniform(DType::F64).unwrap();
    let alpha = contractr::problem::DevicePtr(0x1000);
    let beta = contractr::problem::DevicePtr(0x2000);
    let req = GemmRequest::new(types, 4, 4, 4)
        .scalars(ScalarArg::device(alpha), ScalarArg::device(beta));
    let inputs = ContractionInputs::marshal(&req).unwrap();
    assert_eq!(inputs.alpha, KernelScalar::Device(alpha));
    assert_eq!(inputs.beta, KernelScalar::Device(beta));
}
