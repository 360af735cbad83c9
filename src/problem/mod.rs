//! GEMM requests and their canonical contraction form
//!
//! [`GemmRequest`] is what routine wrappers hand over; [`ContractionProblem`]
//! is what solution selection and kernel launch consume.

mod contraction;
mod request;

pub use contraction::{
    BatchIndex, BoundIndex, ContractionProblem, FreeIndex, ProblemType, RANK, TensorDescriptor,
    TensorOp,
};
pub use request::{DevicePtr, GemmRequest, Operation};

pub use crate::scalar::ScalarCategory;
