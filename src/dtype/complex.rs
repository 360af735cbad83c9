//! Complex element types for complex GEMM variants
//!
//! Complex numbers are stored interleaved (re, im), matching the layout GPU
//! kernels expect for `float2` / `double2` operands and scalars. Both types are
//! bytemuck `Pod`, so alpha/beta values move into kernel arguments as plain
//! bytes.

use bytemuck::{Pod, Zeroable};

#[cfg(feature = "cuda")]
use cudarc::driver::DeviceRepr;

/// Macro to implement a complex number type
///
/// This avoids code duplication between Complex64 and Complex128.
macro_rules! impl_complex {
    (
        $name:ident,
        $float:ty,
        $doc_bits:literal,
        $doc_float_bits:literal,
        $doc_gpu_type:literal
    ) => {
        #[doc = concat!(
            $doc_bits, "-bit complex number with ", $doc_float_bits, " real and imaginary parts"
        )]
        ///
        #[doc = concat!(
            "Memory layout: ", stringify!($name), " is ", stringify!($float), " × 2, interleaved."
        )]
        #[doc = concat!("This matches the layout expected by ", $doc_gpu_type, ".")]
        #[repr(C)]
        #[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
        pub struct $name {
            /// Real part
            pub re: $float,
            /// Imaginary part
            pub im: $float,
        }

        impl $name {
            /// Zero complex number
            pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

            /// One (real unit)
            pub const ONE: Self = Self { re: 1.0, im: 0.0 };

            /// Create a new complex number
            #[inline]
            pub const fn new(re: $float, im: $float) -> Self {
                Self { re, im }
            }
        }
    };
}

impl_complex!(Complex64, f32, "64", "f32", "CUDA float2 / HIP hipFloatComplex");
impl_complex!(Complex128, f64, "128", "f64", "CUDA double2 / HIP hipDoubleComplex");

// SAFETY: both types are #[repr(C)] pairs of floats with no padding, identical
// to the device-side float2/double2 layout.
#[cfg(feature = "cuda")]
unsafe impl DeviceRepr for Complex64 {}
#[cfg(feature = "cuda")]
unsafe impl DeviceRepr for Complex128 {}
