//! Canonical tensor-contraction description of a GEMM
//!
//! A batched GEMM is the contraction `D[i,j,l] = alpha * sum_k A[i,k,l] * B[k,j,l]
//! + beta * C[i,j,l]` over rank-3 tensors:
//!
//! ```text
//!            dim 0   dim 1   dim 2
//! A (N)      i       k       l        A (T/C)    k  i  l
//! B (N)      k       j       l        B (T/C)    j  k  l
//! C, D       i       j       l
//! ```
//!
//! `i` and `j` are free indices (each contributed by one operand), `k` is the
//! bound index, `l` the batch index. Every descriptor has strides
//! `{1, ld, batch_stride}`; transposition only changes which geometric
//! dimension plays which role.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::request::{GemmRequest, Operation};
use crate::dtype::{ComputeType, compute_type};
use crate::error::{Error, Result};
use crate::scalar::ScalarCategory;

/// Rank of every descriptor: {dim0, dim1, batch}
pub const RANK: usize = 3;

/// Extents and strides of one operand
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorDescriptor {
    data_type: ComputeType,
    sizes: [usize; RANK],
    strides: [usize; RANK],
}

impl TensorDescriptor {
    /// Create a descriptor
    pub fn new(data_type: ComputeType, sizes: [usize; RANK], strides: [usize; RANK]) -> Self {
        Self {
            data_type,
            sizes,
            strides,
        }
    }

    /// Element type tag
    pub fn data_type(&self) -> ComputeType {
        self.data_type
    }

    /// Per-dimension extents
    pub fn sizes(&self) -> &[usize; RANK] {
        &self.sizes
    }

    /// Per-dimension strides, in elements
    pub fn strides(&self) -> &[usize; RANK] {
        &self.strides
    }
}

impl fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?}/{:?}",
            self.data_type, self.sizes, self.strides
        )
    }
}

/// Per-operand transformation applied before contraction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TensorOp {
    /// Complex conjugation
    ComplexConjugate,
}

/// An output dimension contributed by exactly one input
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FreeIndex {
    /// Contributed by A (otherwise B)
    pub is_a: bool,
    /// Dimension in the contributing operand
    pub i: usize,
    /// Dimension in C
    pub c: usize,
    /// Dimension in D
    pub d: usize,
}

/// The summed dimension, located in A and in B
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundIndex {
    /// Dimension in A
    pub a: usize,
    /// Dimension in B
    pub b: usize,
}

/// A dimension shared by all four tensors and never summed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BatchIndex {
    /// Dimension in A
    pub a: usize,
    /// Dimension in B
    pub b: usize,
    /// Dimension in C
    pub c: usize,
    /// Dimension in D
    pub d: usize,
}

/// Lookup key a solution must match exactly
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemType {
    /// Element type of A and B
    pub input: ComputeType,
    /// Element type of C and D
    pub output: ComputeType,
    /// Kernel alpha/beta type
    pub scalar: ComputeType,
    /// Accumulate wider than input
    #[serde(default)]
    pub high_precision_accumulate: bool,
    /// A is stored transposed
    #[serde(default)]
    pub transpose_a: bool,
    /// B is stored transposed
    #[serde(default)]
    pub transpose_b: bool,
    /// A is conjugated
    #[serde(default)]
    pub conjugate_a: bool,
    /// B is conjugated
    #[serde(default)]
    pub conjugate_b: bool,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = |trans: bool, conj: bool| match (trans, conj) {
            (false, _) => 'N',
            (true, false) => 'T',
            (true, true) => 'C',
        };
        write!(
            f,
            "{}{}{}_{}{}",
            self.input,
            self.output,
            self.scalar,
            op(self.transpose_a, self.conjugate_a),
            op(self.transpose_b, self.conjugate_b),
        )?;
        if self.high_precision_accumulate {
            f.write_str("_HPA")?;
        }
        Ok(())
    }
}

/// A fully populated, immutable contraction problem
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractionProblem {
    a: TensorDescriptor,
    b: TensorDescriptor,
    c: TensorDescriptor,
    d: TensorDescriptor,
    a_ops: Vec<TensorOp>,
    b_ops: Vec<TensorOp>,
    c_ops: Vec<TensorOp>,
    d_ops: Vec<TensorOp>,
    free: [FreeIndex; 2],
    bound: BoundIndex,
    batch: BatchIndex,
    beta: ScalarCategory,
    scalar_type: ComputeType,
    high_precision_accumulate: bool,
}

impl ContractionProblem {
    /// Build the contraction for a GEMM request.
    ///
    /// Performs no I/O. A zero contraction extent is given to the kernel as
    /// extent 1; alpha is zeroed separately when inputs are marshaled.
    pub fn from_request(req: &GemmRequest) -> Result<Self> {
        let types = req.types;
        let input = compute_type(types.input())?;
        let output = compute_type(types.output())?;
        let complex = types.input().is_complex();

        // Kernels do not support empty bound dimensions; k = 1 with alpha = 0
        // leaves D = beta * C.
        let k = req.k.max(1);
        let batch = req.batch_count;
        let a_strides = [1, req.ld_a, req.stride_a];
        let b_strides = [1, req.ld_b, req.stride_b];

        let (a, free_a, bound_a) = if req.trans_a.is_transposed() {
            (
                TensorDescriptor::new(input, [k, req.m, batch], a_strides),
                1,
                0,
            )
        } else {
            (
                TensorDescriptor::new(input, [req.m, k, batch], a_strides),
                0,
                1,
            )
        };

        let (b, free_b, bound_b) = if req.trans_b.is_transposed() {
            (
                TensorDescriptor::new(input, [req.n, k, batch], b_strides),
                0,
                1,
            )
        } else {
            (
                TensorDescriptor::new(input, [k, req.n, batch], b_strides),
                1,
                0,
            )
        };

        let conjugate = |op: Operation| {
            if complex && op == Operation::ConjugateTranspose {
                vec![TensorOp::ComplexConjugate]
            } else {
                Vec::new()
            }
        };

        let c = TensorDescriptor::new(
            output,
            [req.m, req.n, req.batch_count],
            [1, req.ld_c, req.stride_c],
        );
        let d = TensorDescriptor::new(
            output,
            [req.m, req.n, req.batch_count],
            [1, req.ld_d, req.stride_d],
        );

        let problem = Self {
            a,
            b,
            c,
            d,
            a_ops: conjugate(req.trans_a),
            b_ops: conjugate(req.trans_b),
            c_ops: Vec::new(),
            d_ops: Vec::new(),
            free: [
                FreeIndex {
                    is_a: true,
                    i: free_a,
                    c: 0,
                    d: 0,
                },
                FreeIndex {
                    is_a: false,
                    i: free_b,
                    c: 1,
                    d: 1,
                },
            ],
            bound: BoundIndex {
                a: bound_a,
                b: bound_b,
            },
            batch: BatchIndex {
                a: 2,
                b: 2,
                c: 2,
                d: 2,
            },
            beta: req.beta.category(),
            scalar_type: types.scalar_type(),
            high_precision_accumulate: types.high_precision_accumulate(),
        };
        problem.validate()?;
        Ok(problem)
    }

    /// Check that index roles agree with the descriptors.
    pub fn validate(&self) -> Result<()> {
        let [f0, f1] = self.free;
        if !f0.is_a || f1.is_a {
            return Err(Error::invalid_problem(
                "free index 0 must come from A and free index 1 from B",
            ));
        }
        if (f0.c, f0.d, f1.c, f1.d) != (0, 0, 1, 1) {
            return Err(Error::invalid_problem(
                "free indices must map to output dimensions 0 and 1",
            ));
        }
        if (self.batch.c, self.batch.d) != (2, 2) {
            return Err(Error::invalid_problem("batch index must be output dimension 2"));
        }
        if !is_permutation([f0.i, self.bound.a, self.batch.a]) {
            return Err(Error::invalid_problem(
                "A's free, bound, and batch dimensions must be distinct",
            ));
        }
        if !is_permutation([f1.i, self.bound.b, self.batch.b]) {
            return Err(Error::invalid_problem(
                "B's free, bound, and batch dimensions must be distinct",
            ));
        }
        if self.a.sizes[self.bound.a] != self.b.sizes[self.bound.b] {
            return Err(Error::invalid_problem(format!(
                "bound extent differs between A ({}) and B ({})",
                self.a.sizes[self.bound.a], self.b.sizes[self.bound.b]
            )));
        }

        let expected = [self.free_size(0), self.free_size(1), self.batch_size()];
        if self.c.sizes != expected || self.d.sizes != expected {
            return Err(Error::invalid_problem(format!(
                "output extents {:?}/{:?} disagree with free/batch extents {:?}",
                self.c.sizes, self.d.sizes, expected
            )));
        }
        if self.b.sizes[self.batch.b] != self.batch_size() {
            return Err(Error::invalid_problem("batch extent differs between A and B"));
        }
        if [&self.a, &self.b, &self.c, &self.d]
            .iter()
            .any(|t| t.strides[0] != 1)
        {
            return Err(Error::invalid_problem("innermost stride must be 1"));
        }
        Ok(())
    }

    /// Operand A
    pub fn a(&self) -> &TensorDescriptor {
        &self.a
    }

    /// Operand B
    pub fn b(&self) -> &TensorDescriptor {
        &self.b
    }

    /// Input C
    pub fn c(&self) -> &TensorDescriptor {
        &self.c
    }

    /// Output D
    pub fn d(&self) -> &TensorDescriptor {
        &self.d
    }

    /// Tensor ops on A
    pub fn a_ops(&self) -> &[TensorOp] {
        &self.a_ops
    }

    /// Tensor ops on B
    pub fn b_ops(&self) -> &[TensorOp] {
        &self.b_ops
    }

    /// Tensor ops on C
    pub fn c_ops(&self) -> &[TensorOp] {
        &self.c_ops
    }

    /// Tensor ops on D
    pub fn d_ops(&self) -> &[TensorOp] {
        &self.d_ops
    }

    /// The two free indices
    pub fn free_indices(&self) -> &[FreeIndex; 2] {
        &self.free
    }

    /// The bound index
    pub fn bound_index(&self) -> BoundIndex {
        self.bound
    }

    /// The batch index
    pub fn batch_index(&self) -> BatchIndex {
        self.batch
    }

    /// Extent of free index `which` (0 = rows of D, 1 = columns of D)
    pub fn free_size(&self, which: usize) -> usize {
        let idx = self.free[which];
        if idx.is_a {
            self.a.sizes[idx.i]
        } else {
            self.b.sizes[idx.i]
        }
    }

    /// Contraction extent given to the kernel
    pub fn bound_size(&self) -> usize {
        self.a.sizes[self.bound.a]
    }

    /// Number of batch instances
    pub fn batch_size(&self) -> usize {
        self.a.sizes[self.batch.a]
    }

    /// (free0, free1, batch, bound), the point used for size matching
    pub fn size_point(&self) -> [usize; 4] {
        [
            self.free_size(0),
            self.free_size(1),
            self.batch_size(),
            self.bound_size(),
        ]
    }

    /// Category of beta
    pub fn beta_category(&self) -> ScalarCategory {
        self.beta
    }

    /// Accumulation happens wider than the input type
    pub fn high_precision_accumulate(&self) -> bool {
        self.high_precision_accumulate
    }

    /// A's free index lives in dimension 1
    pub fn transpose_a(&self) -> bool {
        self.free[0].i == 1
    }

    /// B's free index lives in dimension 0
    pub fn transpose_b(&self) -> bool {
        self.free[1].i == 0
    }

    /// The key used for catalog lookup
    pub fn problem_type(&self) -> ProblemType {
        ProblemType {
            input: self.a.data_type,
            output: self.d.data_type,
            scalar: self.scalar_type,
            high_precision_accumulate: self.high_precision_accumulate,
            transpose_a: self.transpose_a(),
            transpose_b: self.transpose_b(),
            conjugate_a: self.a_ops.contains(&TensorOp::ComplexConjugate),
            conjugate_b: self.b_ops.contains(&TensorOp::ComplexConjugate),
        }
    }
}

impl fmt::Display for ContractionProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [m, n, batch, k] = self.size_point();
        write!(
            f,
            "{} m={} n={} k={} batch={} beta={:?} a={} b={} c={} d={}",
            self.problem_type(),
            m,
            n,
            k,
            batch,
            self.beta,
            self.a,
            self.b,
            self.c,
            self.d
        )
    }
}

fn is_permutation(dims: [usize; RANK]) -> bool {
    let mut seen = [false; RANK];
    for d in dims {
        if d >= RANK || seen[d] {
            return false;
        }
        seen[d] = true;
    }
    true
}
