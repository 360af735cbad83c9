//! Element trait for mapping Rust types to DType

use super::{Complex64, Complex128, DType};
use bytemuck::Pod;
use half::{bf16, f16};

/// Trait for Rust types that can serve as GEMM elements or scalars
///
/// This trait connects Rust's type system to the runtime dtype system.
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - Basic trait requirements
/// - `Pod` - trivially copyable, standard layout; scalars move into kernel
///   arguments as raw bytes
pub trait Element: Copy + Send + Sync + Pod + PartialEq + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Real and imaginary parts as f64 (imaginary is 0 for real types)
    fn parts(self) -> (f64, f64);
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, |$v:ident| $parts:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn parts(self) -> (f64, f64) {
                let $v = self;
                $parts
            }
        }

        paste::paste! {
            const [<_ $dtype:upper _SIZE_MATCHES_DTYPE>]: () = assert!(
                std::mem::size_of::<$ty>() == DType::$dtype.size_in_bytes(),
                concat!(stringify!($ty), " size differs from DType::", stringify!($dtype))
            );
        }
    };
}

impl_element!(f64, F64, |v| (v, 0.0));
impl_element!(f32, F32, |v| (v as f64, 0.0));
impl_element!(f16, F16, |v| (v.to_f64(), 0.0));
impl_element!(bf16, BF16, |v| (v.to_f64(), 0.0));
impl_element!(i32, I32, |v| (v as f64, 0.0));
impl_element!(i8, I8, |v| (v as f64, 0.0));
impl_element!(Complex64, Complex64, |v| (v.re as f64, v.im as f64));
impl_element!(Complex128, Complex128, |v| (v.re, v.im));
