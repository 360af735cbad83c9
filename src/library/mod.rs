//! Solution library: the catalog of compiled kernels for one device
//!
//! Loading reads the module files for the device's architecture into the
//! kernel adapter, then the metadata file describing every solution. A
//! library with no modules is usable (every selection misses); a library
//! without metadata is an error the caller must not paper over.
//!
//! After loading the library is immutable and selection is a pure lookup.

pub mod locator;
pub mod metadata;
mod solution;

pub use locator::{FsLocator, MetadataSource, ResourceLocator, StaticLocator};
pub use metadata::{Catalog, parse_catalog};
pub use solution::Solution;

use tracing::{debug, info, warn};

use crate::config::LIBRARY_PATH_ENV;
use crate::error::Result;
use crate::hardware::HardwareDescriptor;
use crate::launch::KernelModuleAdapter;
use crate::problem::ContractionProblem;

/// Immutable collection of solutions with kernel availability
#[derive(Debug)]
pub struct SolutionLibrary {
    origin: String,
    solutions: Vec<Solution>,
    available: Vec<bool>,
}

impl SolutionLibrary {
    /// Load modules into `adapter`, then read and parse the metadata.
    ///
    /// Zero matching modules only warns, as does a module listing that fails.
    /// Module files that fail to load are skipped with a warning. Metadata
    /// that cannot be read or parsed is returned as an error
    /// ([`Error::is_fatal_init`](crate::Error::is_fatal_init)).
    pub fn load<A>(
        locator: &dyn ResourceLocator,
        hardware: &HardwareDescriptor,
        adapter: &mut A,
    ) -> Result<Self>
    where
        A: KernelModuleAdapter + ?Sized,
    {
        let modules = locator.kernel_modules(hardware).unwrap_or_else(|e| {
            warn!(error = %e, "Cannot list kernel modules");
            Vec::new()
        });
        if modules.is_empty() {
            warn!(
                arch = %hardware.arch(),
                pattern = %locator.module_search(hardware),
                "No kernel modules match; set {LIBRARY_PATH_ENV} to the library directory. \
                 GEMM dispatch will report not implemented"
            );
        }
        for path in &modules {
            if let Err(e) = adapter.load_module_file(path) {
                warn!(path = %path.display(), error = %e, "Skipping kernel module");
            }
        }

        let metadata = locator.read_metadata(hardware)?;
        let catalog = parse_catalog(&metadata.text, &metadata.origin)?;
        let library = Self::from_catalog(catalog, metadata.origin, |kernel| {
            adapter.contains_kernel(kernel)
        });

        info!(
            origin = %library.origin,
            arch = %hardware.arch(),
            modules = adapter.module_count(),
            solutions = library.len(),
            available = library.available_count(),
            "Solution library loaded"
        );
        Ok(library)
    }

    /// Parse a catalog with every kernel considered available.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self> {
        let catalog = parse_catalog(yaml, origin)?;
        Ok(Self::from_catalog(catalog, origin.to_string(), |_| true))
    }

    /// Build from a parsed catalog and a kernel availability check.
    pub fn from_catalog(
        catalog: Catalog,
        origin: String,
        is_available: impl Fn(&str) -> bool,
    ) -> Self {
        let solutions: Vec<Solution> = catalog
            .solutions
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Solution::from_entry(index, entry))
            .collect();
        let available = solutions.iter().map(|s| is_available(s.kernel())).collect();
        Self {
            origin,
            solutions,
            available,
        }
    }

    /// Where the metadata came from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// All solutions in catalog order
    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    /// Number of solutions
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether the catalog lists no solutions
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Number of solutions whose kernel is loaded
    pub fn available_count(&self) -> usize {
        self.available.iter().filter(|a| **a).count()
    }

    /// Best solution for `problem` on `hardware`, if any.
    ///
    /// Candidates must support the hardware and the problem and have their
    /// kernel loaded. The closest tuned size wins; ties go to the earlier
    /// catalog entry.
    pub fn select_best(
        &self,
        problem: &ContractionProblem,
        hardware: &HardwareDescriptor,
    ) -> Option<&Solution> {
        let best = self
            .solutions
            .iter()
            .zip(&self.available)
            .filter(|(s, available)| {
                **available && s.supports_hardware(hardware) && s.supports_problem(problem)
            })
            .map(|(s, _)| s)
            .min_by_key(|s| (s.distance(problem), s.index()));
        if let Some(s) = best {
            debug!(solution = %s, problem = %problem, "Selected solution");
        }
        best
    }
}
