//! Common test utilities
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use contractr::engine::{Engine, EngineBuilder};
use contractr::error::Result;
use contractr::hardware::{Capabilities, HardwareDescriptor};
use contractr::launch::RecordingAdapter;
use contractr::library::{MetadataSource, ResourceLocator, StaticLocator};

/// Catalog with one solution per type pairing exercised by the tests
pub const CATALOG: &str = r#"
version: 1
solutions:
  - name: sgemm_nn
    kernel: Cijk_Ailk_Bljk_S_MT64x64x16
    hardware: { architectures: [gfx90a] }
    problem: { input: Float, output: Float, scalar: Float }
    macro_tile: [64, 64]
    workgroup: [16, 16, 1]
    tuned_sizes: [[1024, 1024, 1, 1024]]
  - name: sgemm_tt
    kernel: Cijk_Alik_Bjlk_S_MT64x64x16
    hardware: { architectures: [gfx90a] }
    problem: { input: Float, output: Float, scalar: Float, transpose_a: true, transpose_b: true }
    macro_tile: [64, 64]
    workgroup: [16, 16, 1]
  - name: zgemm_cn
    kernel: Cijk_AlikC_Bljk_Z_MT32x32x8
    hardware: { architectures: [gfx90a] }
    problem:
      input: ComplexDouble
      output: ComplexDouble
      scalar: ComplexDouble
      transpose_a: true
      conjugate_a: true
    macro_tile: [32, 32]
    workgroup: [8, 8, 1]
  - name: hgemm_hpa_nn
    kernel: Cijk_Ailk_Bljk_HHS_BH_MT128x128x32
    hardware: { architectures: [gfx90a], capabilities: [matrix_cores] }
    problem: { input: Half, output: Half, scalar: Half, high_precision_accumulate: true }
    predicates: { k_multiple: 32 }
    macro_tile: [128, 128]
    workgroup: [16, 16, 1]
"#;

/// Architecture the fixtures are built for
pub const ARCH: &str = "gfx90a";

/// Hardware descriptor matching [`CATALOG`]
pub fn gfx90a() -> HardwareDescriptor {
    HardwareDescriptor::new(
        ARCH,
        Capabilities::PACKED_MATH
            .union(Capabilities::INT8_DOT)
            .union(Capabilities::MATRIX_CORES),
    )
}

/// Engine over [`CATALOG`] with one virtual module loaded
pub fn test_engine() -> Engine<RecordingAdapter> {
    EngineBuilder::new(RecordingAdapter::new())
        .hardware(gfx90a())
        .locator(StaticLocator::new(CATALOG).with_module("SolutionLibrary_gfx90a.co"))
        .build()
        .expect("test engine builds")
}

/// Write a library directory: metadata plus empty module files
pub fn write_library(dir: &Path, metadata: Option<&str>, modules: &[&str]) -> Vec<PathBuf> {
    if let Some(text) = metadata {
        std::fs::write(dir.join("SolutionLibrary.yaml"), text).unwrap();
    }
    modules
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"\x7fELF").unwrap();
            path
        })
        .collect()
}

/// Locator wrapper counting how often each resource is read
pub struct CountingLocator {
    inner: StaticLocator,
    pub module_reads: Arc<AtomicUsize>,
    pub metadata_reads: Arc<AtomicUsize>,
}

impl CountingLocator {
    pub fn new(inner: StaticLocator) -> Self {
        Self {
            inner,
            module_reads: Arc::new(AtomicUsize::new(0)),
            metadata_reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ResourceLocator for CountingLocator {
    fn kernel_modules(&self, hardware: &HardwareDescriptor) -> Result<Vec<PathBuf>> {
        self.module_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.kernel_modules(hardware)
    }

    fn read_metadata(&self, hardware: &HardwareDescriptor) -> Result<MetadataSource> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent initializers could race.
        std::thread::sleep(std::time::Duration::from_millis(20));
        self.inner.read_metadata(hardware)
    }
}
