//! Target hardware detection
//!
//! The engine identifies its device by a tagged descriptor: an architecture
//! identifier string (`gfx90a`, `sm_86`, ...) plus a capability bitset. Kernel
//! modules on disk and solution predicates in the catalog are both keyed on
//! these two values.
//!
//! Detection sits behind [`HardwareProbe`] so the engine can be built against a
//! fixed descriptor in tests and on machines without a GPU runtime.

#[cfg(feature = "cuda")]
mod cuda;

#[cfg(feature = "cuda")]
pub use cuda::CudaProbe;

use std::fmt;

use crate::error::{Error, Result};

/// Environment variable read by [`EnvProbe`]
pub const DEVICE_ARCH_ENV: &str = "CONTRACTR_DEVICE_ARCH";

// ============================================================================
// Capabilities
// ============================================================================

/// Set of hardware capability flags
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    bits: u32,
}

impl Capabilities {
    /// No capabilities
    pub const NONE: Self = Self { bits: 0 };
    /// Packed half-precision math
    pub const PACKED_MATH: Self = Self { bits: 1 << 0 };
    /// Int8 dot-product instructions
    pub const INT8_DOT: Self = Self { bits: 1 << 1 };
    /// Matrix-multiply units (MFMA / tensor cores / WMMA)
    pub const MATRIX_CORES: Self = Self { bits: 1 << 2 };
    /// XNACK (retryable page faults) enabled
    pub const XNACK: Self = Self { bits: 1 << 3 };

    const NAMED: [(&'static str, Capabilities); 4] = [
        ("packed_math", Self::PACKED_MATH),
        ("int8_dot", Self::INT8_DOT),
        ("matrix_cores", Self::MATRIX_CORES),
        ("xnack", Self::XNACK),
    ];

    /// Union of two sets
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// True if every flag in `other` is also in `self`
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Check if set is empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Look up a flag by its catalog name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
    }

    /// Names of the flags in this set
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(_, flag)| self.contains(*flag))
            .map(|(n, _)| n)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.names().collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

// ============================================================================
// HardwareDescriptor
// ============================================================================

/// Identity of the device the process targets
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HardwareDescriptor {
    arch: String,
    capabilities: Capabilities,
}

impl HardwareDescriptor {
    /// Create a descriptor from explicit parts
    pub fn new(arch: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            arch: arch.into(),
            capabilities,
        }
    }

    /// Build a descriptor from an architecture string, inferring capabilities.
    ///
    /// Accepts AMD targets (`gfx906`, `gfx90a:xnack+`) and NVIDIA targets
    /// (`sm_86`). Target feature suffixes after `:` are stripped from the
    /// architecture identifier; `xnack+` sets [`Capabilities::XNACK`].
    /// Unknown architectures are accepted with no capabilities.
    pub fn from_arch(target: &str) -> Result<Self> {
        let target = target.trim();
        let mut parts = target.split(':');
        let arch = parts.next().unwrap_or_default();
        if arch.is_empty() || arch.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(Error::Device(format!(
                "invalid architecture identifier '{target}'"
            )));
        }

        let mut capabilities = infer_capabilities(arch);
        if parts.any(|feature| feature == "xnack+") {
            capabilities = capabilities.union(Capabilities::XNACK);
        }
        Ok(Self::new(arch, capabilities))
    }

    /// Architecture identifier used in module file names
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Capability flags
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

impl fmt::Display for HardwareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.arch, self.capabilities)
    }
}

fn infer_capabilities(arch: &str) -> Capabilities {
    if let Some(sm) = arch.strip_prefix("sm_") {
        let Ok(version) = sm.trim_end_matches(|c: char| c.is_ascii_alphabetic()).parse::<u32>()
        else {
            return Capabilities::NONE;
        };
        let mut caps = Capabilities::NONE;
        if version >= 60 {
            caps = caps.union(Capabilities::PACKED_MATH);
        }
        if version >= 61 {
            caps = caps.union(Capabilities::INT8_DOT);
        }
        if version >= 70 {
            caps = caps.union(Capabilities::MATRIX_CORES);
        }
        return caps;
    }

    let Some(gfx) = arch.strip_prefix("gfx") else {
        return Capabilities::NONE;
    };
    match gfx {
        "906" => Capabilities::PACKED_MATH.union(Capabilities::INT8_DOT),
        "908" | "90a" | "940" | "941" | "942" => Capabilities::PACKED_MATH
            .union(Capabilities::INT8_DOT)
            .union(Capabilities::MATRIX_CORES),
        g if g.starts_with("11") || g.starts_with("12") => Capabilities::PACKED_MATH
            .union(Capabilities::INT8_DOT)
            .union(Capabilities::MATRIX_CORES),
        g if g.starts_with('9') || g.starts_with("10") => Capabilities::PACKED_MATH,
        _ => Capabilities::NONE,
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Device-capability query consumed by engine initialization
pub trait HardwareProbe: Send + Sync {
    /// Detect the current device.
    fn probe(&self) -> Result<HardwareDescriptor>;
}

/// Probe that always reports the same descriptor
#[derive(Clone, Debug)]
pub struct FixedProbe(pub HardwareDescriptor);

impl HardwareProbe for FixedProbe {
    fn probe(&self) -> Result<HardwareDescriptor> {
        Ok(self.0.clone())
    }
}

/// Probe reading the architecture from `CONTRACTR_DEVICE_ARCH`
///
/// This is the default probe when no GPU runtime feature is compiled in.
#[derive(Clone, Debug, Default)]
pub struct EnvProbe;

impl HardwareProbe for EnvProbe {
    fn probe(&self) -> Result<HardwareDescriptor> {
        match std::env::var(DEVICE_ARCH_ENV) {
            Ok(arch) => HardwareDescriptor::from_arch(&arch),
            Err(_) => Err(Error::Device(format!(
                "no device detected; set {DEVICE_ARCH_ENV} to the target architecture"
            ))),
        }
    }
}

/// Default probe for this build
#[cfg(feature = "cuda")]
pub type DefaultProbe = CudaProbe;

/// Default probe for this build
#[cfg(not(feature = "cuda"))]
pub type DefaultProbe = EnvProbe;
