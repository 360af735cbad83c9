//! Logical GEMM request as handed over by the routine wrapper layer

use std::fmt;

use crate::dtype::GemmTypes;
use crate::launch::{StreamId, TimingEvents};
use crate::scalar::ScalarArg;

/// Raw device address of an operand
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    /// Null device address
    pub const NULL: Self = Self(0);
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Operation applied to an input matrix before multiplication
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Use the matrix as stored
    #[default]
    None,
    /// Transpose
    Transpose,
    /// Conjugate transpose (plain transpose for real types)
    ConjugateTranspose,
}

impl Operation {
    /// True for both transpose flavours
    pub fn is_transposed(self) -> bool {
        self != Self::None
    }

    /// BLAS letter for this operation
    pub fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Transpose => 'T',
            Self::ConjugateTranspose => 'C',
        }
    }
}

/// A fully-formed GEMM-family request
///
/// Computes `D = alpha * op(A) * op(B) + beta * C` over `batch_count`
/// independent problems. Column-major storage: `ld_*` is the distance between
/// columns and `stride_*` the distance between batch instances, both in
/// elements.
///
/// Shapes, strides, and pointers are assumed validated by the caller; the
/// engine does not re-check argument ranges.
///
/// Leading dimensions and batch strides default to tight packing for the
/// current transpose operations. Values set through
/// [`leading_dims`](Self::leading_dims) or
/// [`strided_batch`](Self::strided_batch) are kept regardless of builder order.
#[derive(Clone, Debug, PartialEq)]
pub struct GemmRequest {
    /// Element and accumulation types
    pub types: GemmTypes,
    /// Rows of op(A), C, and D
    pub m: usize,
    /// Columns of op(B), C, and D
    pub n: usize,
    /// Contraction extent
    pub k: usize,
    /// Number of independent problems
    pub batch_count: usize,
    /// Operation on A
    pub trans_a: Operation,
    /// Operation on B
    pub trans_b: Operation,
    /// Operand A
    pub a: DevicePtr,
    /// Operand B
    pub b: DevicePtr,
    /// Input C
    pub c: DevicePtr,
    /// Output D
    pub d: DevicePtr,
    /// Leading dimension of A
    pub ld_a: usize,
    /// Leading dimension of B
    pub ld_b: usize,
    /// Leading dimension of C
    pub ld_c: usize,
    /// Leading dimension of D
    pub ld_d: usize,
    /// Batch stride of A
    pub stride_a: usize,
    /// Batch stride of B
    pub stride_b: usize,
    /// Batch stride of C
    pub stride_c: usize,
    /// Batch stride of D
    pub stride_d: usize,
    /// Scale on op(A) * op(B)
    pub alpha: ScalarArg,
    /// Scale on C
    pub beta: ScalarArg,
    /// Stream the kernel is enqueued on
    pub stream: StreamId,
    /// Optional start/stop events around the launch
    pub timing: Option<TimingEvents>,
    explicit_ld: bool,
    explicit_strides: bool,
}

impl GemmRequest {
    /// A single, non-transposed, tightly packed GEMM.
    ///
    /// Alpha defaults to one and beta to zero in the compute dtype.
    pub fn new(types: GemmTypes, m: usize, n: usize, k: usize) -> Self {
        let mut req = Self {
            types,
            m,
            n,
            k,
            batch_count: 1,
            trans_a: Operation::None,
            trans_b: Operation::None,
            a: DevicePtr::NULL,
            b: DevicePtr::NULL,
            c: DevicePtr::NULL,
            d: DevicePtr::NULL,
            ld_a: 0,
            ld_b: 0,
            ld_c: 0,
            ld_d: 0,
            stride_a: 0,
            stride_b: 0,
            stride_c: 0,
            stride_d: 0,
            alpha: ScalarArg::one(types.compute()),
            beta: ScalarArg::zero(types.compute()),
            stream: StreamId::DEFAULT,
            timing: None,
            explicit_ld: false,
            explicit_strides: false,
        };
        req.pack_tight();
        req
    }

    /// Set transpose operations, re-deriving any layout not set explicitly.
    pub fn transpose(mut self, trans_a: Operation, trans_b: Operation) -> Self {
        self.trans_a = trans_a;
        self.trans_b = trans_b;
        self.pack_tight();
        self
    }

    /// Override leading dimensions.
    pub fn leading_dims(mut self, ld_a: usize, ld_b: usize, ld_c: usize, ld_d: usize) -> Self {
        self.ld_a = ld_a;
        self.ld_b = ld_b;
        self.ld_c = ld_c;
        self.ld_d = ld_d;
        self.explicit_ld = true;
        self.pack_tight();
        self
    }

    /// Strided-batched layout with explicit batch strides.
    pub fn strided_batch(
        mut self,
        batch_count: usize,
        stride_a: usize,
        stride_b: usize,
        stride_c: usize,
        stride_d: usize,
    ) -> Self {
        self.batch_count = batch_count;
        self.stride_a = stride_a;
        self.stride_b = stride_b;
        self.stride_c = stride_c;
        self.stride_d = stride_d;
        self.explicit_strides = true;
        self
    }

    /// Set operand addresses.
    pub fn operands(mut self, a: DevicePtr, b: DevicePtr, c: DevicePtr, d: DevicePtr) -> Self {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self
    }

    /// Set alpha and beta.
    pub fn scalars(mut self, alpha: ScalarArg, beta: ScalarArg) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Enqueue on the given stream.
    pub fn on_stream(mut self, stream: StreamId) -> Self {
        self.stream = stream;
        self
    }

    /// Capture start/stop events around the launch.
    pub fn timed(mut self, events: TimingEvents) -> Self {
        self.timing = Some(events);
        self
    }

    /// Rows and columns of A as stored
    pub fn a_extents(&self) -> (usize, usize) {
        if self.trans_a.is_transposed() {
            (self.k, self.m)
        } else {
            (self.m, self.k)
        }
    }

    /// Rows and columns of B as stored
    pub fn b_extents(&self) -> (usize, usize) {
        if self.trans_b.is_transposed() {
            (self.n, self.k)
        } else {
            (self.k, self.n)
        }
    }

    /// Fill in tight leading dimensions and batch strides where the caller
    /// has not set them.
    fn pack_tight(&mut self) {
        let (a_rows, a_cols) = self.a_extents();
        let (b_rows, b_cols) = self.b_extents();
        if !self.explicit_ld {
            self.ld_a = a_rows.max(1);
            self.ld_b = b_rows.max(1);
            self.ld_c = self.m.max(1);
            self.ld_d = self.m.max(1);
        }
        if self.explicit_strides {
            return;
        }
        self.stride_a = self.ld_a * a_cols;
        self.stride_b = self.ld_b * b_cols;
        self.stride_c = self.ld_c * self.n;
        self.stride_d = self.ld_d * self.n;
    }
}

impl fmt::Display for GemmRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gemm {} transA={} transB={} M={} N={} K={} alpha={} lda={} ldb={} beta={} \
             ldc={} ldd={} stride_a={} stride_b={} stride_c={} stride_d={} batch_count={}",
            self.types,
            self.trans_a.letter(),
            self.trans_b.letter(),
            self.m,
            self.n,
            self.k,
            self.alpha,
            self.ld_a,
            self.ld_b,
            self.beta,
            self.ld_c,
            self.ld_d,
            self.stride_a,
            self.stride_b,
            self.stride_c,
            self.stride_d,
            self.batch_count,
        )
    }
}
