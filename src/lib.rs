//! # contractr
//!
//! **Contraction-problem dispatch and kernel selection for GPU GEMM.**
//!
//! contractr sits between BLAS-style routine wrappers and a library of
//! precompiled GPU kernels. Each matrix-multiply request (plain, batched,
//! strided-batched, mixed precision) is rewritten as a canonical rank-3 tensor
//! contraction, matched against a catalog of kernel variants for the current
//! device, and launched asynchronously.
//!
//! ## Pipeline
//!
//! - [`problem`]: [`GemmRequest`](problem::GemmRequest) →
//!   [`ContractionProblem`](problem::ContractionProblem) (free/bound/batch
//!   indices, transpose and conjugate handling, the zero-`k` workaround)
//! - [`scalar`]: alpha/beta in kernel-native form
//! - [`library`]: the solution catalog and best-match selection
//! - [`launch`]: launch geometry, kernel arguments, module adapters
//! - [`engine`]: one-time initialization and the status-returning dispatcher
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contractr::prelude::*;
//!
//! let types = GemmTypes::uniform(DType::F32)?;
//! let request = GemmRequest::new(types, 1024, 1024, 512)
//!     .operands(a, b, c, d)
//!     .on_stream(stream);
//!
//! match contractr::run_contraction(&request) {
//!     Status::Success => {}
//!     Status::NotImplemented => { /* no kernel for this shape/device */ }
//!     Status::InternalError => { /* see logs */ }
//! }
//! ```
//!
//! ## Environment
//!
//! - `CONTRACTR_LIBRARY_PATH`: library directory override
//! - `CONTRACTR_DEVICE_ARCH`: target architecture when built without a GPU
//!   runtime feature
//!
//! ## Feature Flags
//!
//! - `cuda`: cudarc-backed device probe and kernel module adapter

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dtype;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod launch;
pub mod library;
pub mod problem;
pub mod scalar;

pub use engine::{Status, engine, initialize, run_contraction};
pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::LibraryConfig;
    pub use crate::dtype::{Complex64, Complex128, DType, GemmTypes};
    pub use crate::engine::{Engine, EngineBuilder, Status};
    pub use crate::error::{Error, Result};
    pub use crate::hardware::HardwareDescriptor;
    pub use crate::launch::{StreamId, TimingEvents};
    pub use crate::problem::{DevicePtr, GemmRequest, Operation};
    pub use crate::scalar::ScalarArg;
}
