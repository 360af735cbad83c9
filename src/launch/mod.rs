//! Kernel launch requests and the module adapter seam
//!
//! A [`KernelLaunchRequest`] is the concrete, hardware-ready form of one
//! dispatch: the chosen solution's kernel symbol, a launch geometry derived
//! from its macro tile, the ordered kernel arguments, the target stream and
//! optional timing events. It is handed to a [`KernelModuleAdapter`], which
//! owns the loaded module files and submits the kernel.
//!
//! Launches are enqueue-only. Nothing here waits for completion.

mod recording;

#[cfg(feature = "cuda")]
mod cuda;

#[cfg(feature = "cuda")]
pub use cuda::CudaModuleAdapter;
pub use recording::{RecordedLaunch, RecordingAdapter};

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::library::Solution;
use crate::problem::{ContractionProblem, DevicePtr};
use crate::scalar::{ContractionInputs, KernelScalar, NativeScalar};

// ============================================================================
// Streams and events
// ============================================================================

/// Handle of a compute stream
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

impl StreamId {
    /// The device's default stream
    pub const DEFAULT: Self = Self(0);
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Handle of a device event
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

/// Events recorded immediately before and after a kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimingEvents {
    /// Recorded before the kernel
    pub start: EventId,
    /// Recorded after the kernel
    pub stop: EventId,
}

// ============================================================================
// Launch request
// ============================================================================

/// Grid and workgroup geometry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Workgroups per dimension
    pub grid: (u32, u32, u32),
    /// Threads per workgroup
    pub block: (u32, u32, u32),
    /// Dynamic shared memory
    pub shared_mem_bytes: u32,
}

impl LaunchConfig {
    /// One workgroup per macro tile of D, one grid layer per batch instance.
    pub fn for_solution(solution: &Solution, problem: &ContractionProblem) -> Result<Self> {
        let [tile_m, tile_n] = solution.macro_tile();
        let [wg_x, wg_y, wg_z] = solution.workgroup();
        let tiles = |extent: usize, tile: u32| extent.div_ceil(tile as usize).max(1);
        let grid_dim = |n: usize| {
            u32::try_from(n).map_err(|_| Error::Launch(format!("grid dimension {n} exceeds u32")))
        };
        Ok(Self {
            grid: (
                grid_dim(tiles(problem.free_size(0), tile_m))?,
                grid_dim(tiles(problem.free_size(1), tile_n))?,
                grid_dim(problem.batch_size().max(1))?,
            ),
            block: (wg_x, wg_y, wg_z),
            shared_mem_bytes: 0,
        })
    }
}

/// A single kernel argument
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelArg {
    /// Tensor address
    Pointer(DevicePtr),
    /// Scalar passed by value
    Scalar(NativeScalar),
    /// Scalar read by the kernel from device memory
    ScalarPointer(DevicePtr),
    /// Extent or stride
    Size(u64),
}

/// Everything needed to submit one kernel
#[derive(Debug, Clone, PartialEq)]
pub struct KernelLaunchRequest<'a> {
    /// The solution being run
    pub solution: &'a Solution,
    /// Launch geometry
    pub config: LaunchConfig,
    /// Arguments in kernel signature order
    pub args: Vec<KernelArg>,
    /// Target stream
    pub stream: StreamId,
    /// Events recorded around the kernel
    pub timing: Option<TimingEvents>,
}

impl<'a> KernelLaunchRequest<'a> {
    /// Combine a solution with a problem and its marshaled inputs.
    ///
    /// Argument order: D, C, A, B, alpha, beta, then the D/C/A/B strides
    /// (leading and batch, innermost omitted) and the sizes
    /// (free0, free1, batch, bound).
    pub fn new(
        solution: &'a Solution,
        problem: &ContractionProblem,
        inputs: &ContractionInputs,
        stream: StreamId,
        timing: Option<TimingEvents>,
    ) -> Result<Self> {
        let config = LaunchConfig::for_solution(solution, problem)?;

        let scalar = |s: &KernelScalar| match s {
            KernelScalar::Value(v) => KernelArg::Scalar(*v),
            KernelScalar::Device(ptr) => KernelArg::ScalarPointer(*ptr),
        };
        let mut args = vec![
            KernelArg::Pointer(inputs.d),
            KernelArg::Pointer(inputs.c),
            KernelArg::Pointer(inputs.a),
            KernelArg::Pointer(inputs.b),
            scalar(&inputs.alpha),
            scalar(&inputs.beta),
        ];
        for tensor in [problem.d(), problem.c(), problem.a(), problem.b()] {
            args.extend(tensor.strides()[1..].iter().map(|&s| KernelArg::Size(s as u64)));
        }
        args.extend(
            problem
                .size_point()
                .into_iter()
                .map(|s| KernelArg::Size(s as u64)),
        );

        Ok(Self {
            solution,
            config,
            args,
            stream,
            timing,
        })
    }

    /// Kernel function symbol
    pub fn kernel(&self) -> &str {
        self.solution.kernel()
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Owner of loaded kernel modules; submits launches
///
/// Module loading happens once during engine initialization (`&mut self`);
/// launches may come from any number of threads afterwards.
pub trait KernelModuleAdapter: Send + Sync {
    /// Load one compiled module file.
    fn load_module_file(&mut self, path: &Path) -> Result<()>;

    /// Number of modules loaded so far
    fn module_count(&self) -> usize;

    /// Whether a loaded module defines `kernel`.
    fn contains_kernel(&self, kernel: &str) -> bool;

    /// Enqueue the kernel; records timing events around it when requested.
    fn launch(&self, request: &KernelLaunchRequest<'_>) -> Result<()>;
}

/// Adapter used by default for this build
#[cfg(feature = "cuda")]
pub type DefaultAdapter = CudaModuleAdapter;

/// Adapter used by default for this build
#[cfg(not(feature = "cuda"))]
pub type DefaultAdapter = RecordingAdapter;
