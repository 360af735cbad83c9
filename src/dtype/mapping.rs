//! Closed mapping from logical dtypes to kernel compute types
//!
//! Every logical [`DType`] maps to exactly one [`ComputeType`], the tag kernels
//! and the solution catalog use. The table is static and validated at compile
//! time: a compute type must have the same storage size as its logical type,
//! except for packed sub-word integers where the compute type holds a whole
//! number of logical elements (`I8` → `Int8x4`).
//!
//! The second table lists the GEMM type pairings the engine dispatches, each
//! with the representation alpha and beta take in kernel arguments.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::DType;
use crate::error::{Error, Result};

/// Canonical element tags understood by compiled kernels
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComputeType {
    /// IEEE half
    Half,
    /// bfloat16
    BFloat16,
    /// f32
    Float,
    /// f64
    Double,
    /// Interleaved f32 pair
    ComplexFloat,
    /// Interleaved f64 pair
    ComplexDouble,
    /// Four packed i8 values
    Int8x4,
    /// i32
    Int32,
}

impl ComputeType {
    /// Storage size of one compute element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::ComplexDouble => 16,
            Self::Double | Self::ComplexFloat => 8,
            Self::Float | Self::Int32 | Self::Int8x4 => 4,
            Self::Half | Self::BFloat16 => 2,
        }
    }

    /// Returns true for complex compute types
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::ComplexFloat | Self::ComplexDouble)
    }

    /// Short tag used in kernel names and diagnostics
    pub const fn abbrev(self) -> &'static str {
        match self {
            Self::Half => "H",
            Self::BFloat16 => "B",
            Self::Float => "S",
            Self::Double => "D",
            Self::ComplexFloat => "C",
            Self::ComplexDouble => "Z",
            Self::Int8x4 => "4xi8",
            Self::Int32 => "I",
        }
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

// ============================================================================
// Logical -> compute table
// ============================================================================

/// One row of the logical-to-compute table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeMapping {
    /// Logical element type
    pub logical: DType,
    /// Kernel-side tag
    pub compute: ComputeType,
    /// Compute type packs several logical elements
    pub packed: bool,
}

const fn row(logical: DType, compute: ComputeType, packed: bool) -> TypeMapping {
    TypeMapping {
        logical,
        compute,
        packed,
    }
}

/// The closed logical-to-compute table.
pub const TYPE_TABLE: [TypeMapping; 8] = [
    row(DType::F16, ComputeType::Half, false),
    row(DType::BF16, ComputeType::BFloat16, false),
    row(DType::F32, ComputeType::Float, false),
    row(DType::F64, ComputeType::Double, false),
    row(DType::Complex64, ComputeType::ComplexFloat, false),
    row(DType::Complex128, ComputeType::ComplexDouble, false),
    row(DType::I8, ComputeType::Int8x4, true),
    row(DType::I32, ComputeType::Int32, false),
];

const fn validate_type_table(table: &[TypeMapping]) {
    let mut i = 0;
    while i < table.len() {
        let entry = table[i];
        let logical = entry.logical.size_in_bytes();
        let compute = entry.compute.size_in_bytes();
        if entry.packed {
            assert!(
                compute > logical && compute % logical == 0,
                "packed compute type must hold a whole number of logical elements"
            );
        } else {
            assert!(
                compute == logical,
                "compute type size differs from logical type size"
            );
        }

        let mut j = i + 1;
        while j < table.len() {
            assert!(
                table[j].logical as u8 != entry.logical as u8,
                "logical dtype mapped twice"
            );
            assert!(
                table[j].compute as u8 != entry.compute as u8,
                "compute type mapped twice"
            );
            j += 1;
        }
        i += 1;
    }
    assert!(
        table.len() == DType::ALL.len(),
        "every logical dtype needs a compute type"
    );
}

const _: () = validate_type_table(&TYPE_TABLE);

/// Look up the compute type for a logical dtype.
pub fn compute_type(dtype: DType) -> Result<ComputeType> {
    TYPE_TABLE
        .iter()
        .find(|entry| entry.logical == dtype)
        .map(|entry| entry.compute)
        .ok_or_else(|| Error::unsupported_dtype(dtype, "compute_type"))
}

// ============================================================================
// GEMM type pairings
// ============================================================================

/// A validated (input, output, compute) dtype triple
///
/// Input is the element type of A and B, output that of C and D, compute the
/// accumulation type. Only pairings present in the static pairing table can be
/// constructed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GemmTypes {
    input: DType,
    output: DType,
    compute: DType,
    scalar: ComputeType,
}

struct Pairing {
    input: DType,
    output: DType,
    compute: DType,
    scalar: ComputeType,
}

const PAIRINGS: [Pairing; 8] = [
    Pairing {
        input: DType::F16,
        output: DType::F16,
        compute: DType::F16,
        scalar: ComputeType::Half,
    },
    Pairing {
        input: DType::F32,
        output: DType::F32,
        compute: DType::F32,
        scalar: ComputeType::Float,
    },
    Pairing {
        input: DType::F64,
        output: DType::F64,
        compute: DType::F64,
        scalar: ComputeType::Double,
    },
    Pairing {
        input: DType::Complex64,
        output: DType::Complex64,
        compute: DType::Complex64,
        scalar: ComputeType::ComplexFloat,
    },
    Pairing {
        input: DType::Complex128,
        output: DType::Complex128,
        compute: DType::Complex128,
        scalar: ComputeType::ComplexDouble,
    },
    // Kernels for half storage with f32 accumulation take half alpha/beta.
    Pairing {
        input: DType::F16,
        output: DType::F16,
        compute: DType::F32,
        scalar: ComputeType::Half,
    },
    Pairing {
        input: DType::BF16,
        output: DType::BF16,
        compute: DType::F32,
        scalar: ComputeType::Float,
    },
    Pairing {
        input: DType::I8,
        output: DType::I32,
        compute: DType::I32,
        scalar: ComputeType::Int32,
    },
];

impl GemmTypes {
    /// Validate a type triple against the pairing table.
    pub fn new(input: DType, output: DType, compute: DType) -> Result<Self> {
        PAIRINGS
            .iter()
            .find(|p| p.input == input && p.output == output && p.compute == compute)
            .map(|p| Self {
                input,
                output,
                compute,
                scalar: p.scalar,
            })
            .ok_or(Error::UnsupportedTypes {
                input,
                output,
                compute,
            })
    }

    /// Same type for input, output, and compute
    pub fn uniform(dtype: DType) -> Result<Self> {
        Self::new(dtype, dtype, dtype)
    }

    /// Every supported pairing
    pub fn all() -> impl Iterator<Item = GemmTypes> {
        PAIRINGS.iter().map(|p| Self {
            input: p.input,
            output: p.output,
            compute: p.compute,
            scalar: p.scalar,
        })
    }

    /// Element type of A and B
    pub fn input(&self) -> DType {
        self.input
    }

    /// Element type of C and D
    pub fn output(&self) -> DType {
        self.output
    }

    /// Accumulation type; also the dtype callers supply alpha/beta in
    pub fn compute(&self) -> DType {
        self.compute
    }

    /// Representation of alpha/beta inside kernel arguments
    pub fn scalar_type(&self) -> ComputeType {
        self.scalar
    }

    /// Accumulation is wider than the input storage type
    pub fn high_precision_accumulate(&self) -> bool {
        self.compute.size_in_bytes() > self.input.size_in_bytes()
    }

    /// Caller scalars are wider than the kernel scalar and must be narrowed.
    pub fn narrows_scalars(&self) -> bool {
        self.compute.size_in_bytes() > self.scalar.size_in_bytes()
    }
}

impl fmt::Display for GemmTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.input, self.output, self.compute)
    }
}
