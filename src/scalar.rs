//! Alpha/beta marshalling into kernel-native scalars
//!
//! Callers hand alpha and beta over either as host values in the request's
//! compute dtype or as device pointers. Host values are copied byte-for-byte
//! into the kernel scalar representation named by the type pairing; the only
//! conversion is the f32 → f16 narrowing for half-storage kernels that
//! accumulate in f32. Device pointers are passed through to the kernel's own
//! argument binding untouched.
//!
//! When the contraction extent is zero the kernel runs with k = 1, so alpha is
//! replaced by zero here whatever the caller supplied.

use std::fmt;

use half::{bf16, f16};

use crate::dtype::{Complex64, Complex128, ComputeType, DType, Element, GemmTypes, compute_type};
use crate::error::{Error, Result};
use crate::problem::{DevicePtr, GemmRequest};

/// Largest scalar representation in bytes (complex f64)
const SCALAR_BYTES: usize = 16;

// Scalar-capable compute types must have the layout of their Rust type.
const _: () = {
    assert!(std::mem::size_of::<f16>() == ComputeType::Half.size_in_bytes());
    assert!(std::mem::size_of::<bf16>() == ComputeType::BFloat16.size_in_bytes());
    assert!(std::mem::size_of::<f32>() == ComputeType::Float.size_in_bytes());
    assert!(std::mem::size_of::<f64>() == ComputeType::Double.size_in_bytes());
    assert!(std::mem::size_of::<Complex64>() == ComputeType::ComplexFloat.size_in_bytes());
    assert!(std::mem::size_of::<Complex128>() == ComputeType::ComplexDouble.size_in_bytes());
    assert!(std::mem::size_of::<i32>() == ComputeType::Int32.size_in_bytes());
    assert!(std::mem::size_of::<Complex128>() == SCALAR_BYTES);
};

// ============================================================================
// Value categories
// ============================================================================

/// Coarse classification of a scalar value
///
/// Some kernels are only valid for `beta == 0` (they never read C); the
/// category lets the catalog express that.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarCategory {
    /// Exactly zero
    Zero,
    /// Exactly one
    One,
    /// Exactly minus one
    NegativeOne,
    /// Anything else, or unknown (device-resident)
    Any,
}

impl ScalarCategory {
    fn from_parts((re, im): (f64, f64)) -> Self {
        if im != 0.0 {
            Self::Any
        } else if re == 0.0 {
            Self::Zero
        } else if re == 1.0 {
            Self::One
        } else if re == -1.0 {
            Self::NegativeOne
        } else {
            Self::Any
        }
    }
}

// ============================================================================
// Host scalars
// ============================================================================

/// A host-resident scalar in a logical dtype
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HostScalar {
    dtype: DType,
    bytes: [u8; SCALAR_BYTES],
}

impl HostScalar {
    /// Wrap a typed value
    pub fn new<T: Element>(value: T) -> Self {
        let mut bytes = [0u8; SCALAR_BYTES];
        let src = bytemuck::bytes_of(&value);
        bytes[..src.len()].copy_from_slice(src);
        Self {
            dtype: T::DTYPE,
            bytes,
        }
    }

    /// Additive identity of `dtype`
    pub fn zero(dtype: DType) -> Self {
        // All-zero bytes are +0 for IEEE floats, complex pairs, and integers.
        Self {
            dtype,
            bytes: [0u8; SCALAR_BYTES],
        }
    }

    /// Multiplicative identity of `dtype`
    pub fn one(dtype: DType) -> Self {
        match dtype {
            DType::F64 => Self::new(1.0f64),
            DType::F32 => Self::new(1.0f32),
            DType::F16 => Self::new(f16::ONE),
            DType::BF16 => Self::new(bf16::ONE),
            DType::I32 => Self::new(1i32),
            DType::I8 => Self::new(1i8),
            DType::Complex64 => Self::new(Complex64::ONE),
            DType::Complex128 => Self::new(Complex128::ONE),
        }
    }

    /// Logical dtype of the value
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The value's bytes (exactly `dtype.size_in_bytes()` long)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.dtype.size_in_bytes()]
    }

    /// Read back as `T` if the dtype matches
    pub fn get<T: Element>(&self) -> Option<T> {
        (T::DTYPE == self.dtype).then(|| self.read::<T>())
    }

    /// Real and imaginary parts as f64
    pub fn parts(&self) -> (f64, f64) {
        match self.dtype {
            DType::F64 => self.read::<f64>().parts(),
            DType::F32 => self.read::<f32>().parts(),
            DType::F16 => self.read::<f16>().parts(),
            DType::BF16 => self.read::<bf16>().parts(),
            DType::I32 => self.read::<i32>().parts(),
            DType::I8 => self.read::<i8>().parts(),
            DType::Complex64 => self.read::<Complex64>().parts(),
            DType::Complex128 => self.read::<Complex128>().parts(),
        }
    }

    /// Value category
    pub fn category(&self) -> ScalarCategory {
        ScalarCategory::from_parts(self.parts())
    }

    fn read<T: Element>(&self) -> T {
        bytemuck::pod_read_unaligned(&self.bytes[..std::mem::size_of::<T>()])
    }
}

impl fmt::Display for HostScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (re, im) = self.parts();
        if self.dtype.is_complex() {
            write!(f, "({re},{im})")
        } else {
            write!(f, "{re}")
        }
    }
}

/// Alpha or beta as supplied by the caller
///
/// Which variant is used follows the caller's pointer mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarArg {
    /// Host-resident literal value
    Host(HostScalar),
    /// Device-resident pointer to the value
    Device(DevicePtr),
}

impl ScalarArg {
    /// Host-resident typed value
    pub fn host<T: Element>(value: T) -> Self {
        Self::Host(HostScalar::new(value))
    }

    /// Host-resident zero
    pub fn zero(dtype: DType) -> Self {
        Self::Host(HostScalar::zero(dtype))
    }

    /// Host-resident one
    pub fn one(dtype: DType) -> Self {
        Self::Host(HostScalar::one(dtype))
    }

    /// Device-resident pointer
    pub fn device(ptr: DevicePtr) -> Self {
        Self::Device(ptr)
    }

    /// Value category; device-resident values are never inspected
    pub fn category(&self) -> ScalarCategory {
        match self {
            Self::Host(value) => value.category(),
            Self::Device(_) => ScalarCategory::Any,
        }
    }
}

impl fmt::Display for ScalarArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(value) => write!(f, "{value}"),
            Self::Device(ptr) => write!(f, "*{ptr}"),
        }
    }
}

// ============================================================================
// Kernel-native scalars
// ============================================================================

/// A scalar in the representation a kernel argument expects
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NativeScalar {
    ty: ComputeType,
    bytes: [u8; SCALAR_BYTES],
}

impl NativeScalar {
    /// Additive identity in `ty`
    pub fn zero(ty: ComputeType) -> Self {
        Self {
            ty,
            bytes: [0u8; SCALAR_BYTES],
        }
    }

    /// Copy a host value whose representation already is `ty`.
    pub fn from_host(value: &HostScalar, ty: ComputeType) -> Result<Self> {
        if compute_type(value.dtype())? != ty {
            return Err(Error::Internal(format!(
                "no scalar conversion from {} to {}",
                value.dtype(),
                ty
            )));
        }
        let src = value.as_bytes();
        let mut bytes = [0u8; SCALAR_BYTES];
        bytes[..src.len()].copy_from_slice(src);
        Ok(Self { ty, bytes })
    }

    /// Narrow a wider host value into `ty`. Only f32 into `Half` exists.
    pub fn narrowed(value: &HostScalar, ty: ComputeType) -> Result<Self> {
        if value.dtype() != DType::F32 || ty != ComputeType::Half {
            return Err(Error::Internal(format!(
                "no scalar narrowing from {} to {}",
                value.dtype(),
                ty
            )));
        }
        let narrowed = f16::from_f32(value.read::<f32>());
        let mut bytes = [0u8; SCALAR_BYTES];
        bytes[..2].copy_from_slice(bytemuck::bytes_of(&narrowed));
        Ok(Self { ty, bytes })
    }

    /// Kernel-side type
    pub fn ty(&self) -> ComputeType {
        self.ty
    }

    /// Argument bytes (exactly `ty.size_in_bytes()` long)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.ty.size_in_bytes()]
    }

    /// Read back as `T` if `T`'s compute type matches
    pub fn get<T: Element>(&self) -> Option<T> {
        match compute_type(T::DTYPE) {
            Ok(ty) if ty == self.ty => Some(bytemuck::pod_read_unaligned(
                &self.bytes[..std::mem::size_of::<T>()],
            )),
            _ => None,
        }
    }

    /// True if every byte is zero
    pub fn is_zero_bytes(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }
}

/// Alpha or beta as bound into kernel arguments
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelScalar {
    /// Held by value
    Value(NativeScalar),
    /// Left on the device for the kernel to dereference
    Device(DevicePtr),
}

impl KernelScalar {
    /// The by-value scalar, if any
    pub fn value(&self) -> Option<&NativeScalar> {
        match self {
            Self::Value(v) => Some(v),
            Self::Device(_) => None,
        }
    }
}

// ============================================================================
// ContractionInputs
// ============================================================================

/// Kernel-native view of the operands of one contraction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContractionInputs {
    /// Operand A
    pub a: DevicePtr,
    /// Operand B
    pub b: DevicePtr,
    /// Input C
    pub c: DevicePtr,
    /// Output D
    pub d: DevicePtr,
    /// Scale on A·B
    pub alpha: KernelScalar,
    /// Scale on C
    pub beta: KernelScalar,
}

impl ContractionInputs {
    /// Marshal the operands of `request`.
    ///
    /// A zero contraction extent forces alpha to zero in both pointer modes.
    pub fn marshal(request: &GemmRequest) -> Result<Self> {
        let types = request.types;
        let alpha = if request.k == 0 {
            KernelScalar::Value(NativeScalar::zero(types.scalar_type()))
        } else {
            marshal_scalar("alpha", &request.alpha, types)?
        };
        let beta = marshal_scalar("beta", &request.beta, types)?;

        Ok(Self {
            a: request.a,
            b: request.b,
            c: request.c,
            d: request.d,
            alpha,
            beta,
        })
    }
}

fn marshal_scalar(arg: &'static str, scalar: &ScalarArg, types: GemmTypes) -> Result<KernelScalar> {
    match scalar {
        ScalarArg::Device(ptr) => Ok(KernelScalar::Device(*ptr)),
        ScalarArg::Host(value) => {
            if value.dtype() != types.compute() {
                return Err(Error::ScalarTypeMismatch {
                    arg,
                    expected: types.compute(),
                    got: value.dtype(),
                });
            }
            let native = if types.narrows_scalars() {
                NativeScalar::narrowed(value, types.scalar_type())?
            } else {
                NativeScalar::from_host(value, types.scalar_type())?
            };
            Ok(KernelScalar::Value(native))
        }
    }
}
