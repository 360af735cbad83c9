//! Data type system for contraction requests
//!
//! This module provides the `DType` enum naming every logical element type a
//! GEMM request may carry, the `Element` trait connecting Rust types to it, and
//! the closed mapping onto kernel compute types (see [`mapping`]).

pub mod complex;
mod element;
pub mod mapping;

pub use complex::{Complex64, Complex128};
pub use element::Element;
pub use mapping::{ComputeType, GemmTypes, TypeMapping, compute_type};

use std::fmt;

// ============================================================================
// DType Enum
// ============================================================================

/// Logical element types accepted by the dispatch engine
///
/// # Discriminant Values (Serialization Stability)
///
/// The discriminant values are **stable**:
/// - Floats: 0-9 (F64=0, F32=1, F16=2, BF16=3)
/// - Signed ints: 10-19 (I32=11, I8=13)
/// - Complex: 40-49 (Complex64=40, Complex128=41)
///
/// Gaps are reserved; existing values are never changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 16-bit floating point (IEEE 754)
    F16 = 2,
    /// 16-bit brain floating point
    BF16 = 3,
    /// 32-bit signed integer
    I32 = 11,
    /// 8-bit signed integer
    I8 = 13,
    /// 64-bit complex (two f32: re, im)
    Complex64 = 40,
    /// 128-bit complex (two f64: re, im)
    Complex128 = 41,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Complex128 => 16,
            Self::F64 | Self::Complex64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 => 2,
            Self::I8 => 1,
        }
    }

    /// Returns true if this is a complex number type
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Short name for display (e.g., "f32", "c64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I32 => "i32",
            Self::I8 => "i8",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }

    /// All logical dtypes, in discriminant order
    pub const ALL: [DType; 8] = [
        Self::F64,
        Self::F32,
        Self::F16,
        Self::BF16,
        Self::I32,
        Self::I8,
        Self::Complex64,
        Self::Complex128,
    ];
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}
