//! CUDA device probe using cudarc

use cudarc::driver::sys::CUdevice_attribute;

use super::{HardwareDescriptor, HardwareProbe};
use crate::error::{Error, Result};

/// Probe a CUDA device's compute capability
///
/// The architecture identifier is `sm_<major><minor>`, matching the naming
/// used for compiled module files (e.g. `SolutionLibrary_sm_86.cubin`).
#[derive(Clone, Debug, Default)]
pub struct CudaProbe {
    /// Index of the GPU device (0, 1, 2, ...)
    pub device_index: usize,
}

impl CudaProbe {
    /// Probe the given device ordinal
    pub fn new(device_index: usize) -> Self {
        Self { device_index }
    }

    /// Returns (major, minor) compute capability (e.g., (8, 6) for sm_86)
    pub fn compute_capability(&self) -> Result<(u32, u32)> {
        cudarc::driver::result::init()?;
        let device = cudarc::driver::result::device::get(self.device_index as i32).map_err(|e| {
            Error::Device(format!(
                "Failed to get CUDA device {}: {:?}",
                self.device_index, e
            ))
        })?;

        // SAFETY: `device` is a valid handle returned by cuDeviceGet above.
        let major = unsafe {
            cudarc::driver::result::device::get_attribute(
                device,
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR,
            )
        }
        .map_err(|e| Error::Device(format!("Failed to get compute capability major: {:?}", e)))?
            as u32;

        // SAFETY: as above.
        let minor = unsafe {
            cudarc::driver::result::device::get_attribute(
                device,
                CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR,
            )
        }
        .map_err(|e| Error::Device(format!("Failed to get compute capability minor: {:?}", e)))?
            as u32;

        Ok((major, minor))
    }
}

impl HardwareProbe for CudaProbe {
    fn probe(&self) -> Result<HardwareDescriptor> {
        let (major, minor) = self.compute_capability()?;
        HardwareDescriptor::from_arch(&format!("sm_{major}{minor}"))
    }
}
