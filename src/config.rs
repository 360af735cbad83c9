//! Solution library configuration
//!
//! Where to look for the kernel library, and what its files are called.

use std::path::PathBuf;

/// Environment variable overriding the library directory
pub const LIBRARY_PATH_ENV: &str = "CONTRACTR_LIBRARY_PATH";

/// Default metadata file name
pub const DEFAULT_METADATA_FILE: &str = "SolutionLibrary.yaml";

/// Environment variable overriding the kernel module file suffix
pub const MODULE_SUFFIX_ENV: &str = "CONTRACTR_MODULE_SUFFIX";

/// Default kernel module file suffix
///
/// `co` matches both `.co` and `.hsaco` code objects.
#[cfg(not(feature = "cuda"))]
pub const DEFAULT_MODULE_SUFFIX: &str = "co";

/// Default kernel module file suffix
#[cfg(feature = "cuda")]
pub const DEFAULT_MODULE_SUFFIX: &str = "cubin";

/// Fallback chain used when no override is configured
///
/// The base directory is the running executable's directory, or
/// `fallback_base` when that cannot be determined. From there the first of
/// `subdirs` that exists is taken, then the architecture-named subdirectory
/// if one exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPolicy {
    /// Base used when the executable location is unknown
    pub fallback_base: PathBuf,
    /// Candidate subdirectories, tried in order; the last is used unconditionally
    pub subdirs: Vec<PathBuf>,
    /// Descend into `<dir>/<arch>` when present
    pub arch_subdir: bool,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            fallback_base: PathBuf::from("/opt/contractr/lib"),
            subdirs: vec![PathBuf::from("../../kernels/library"), PathBuf::from("library")],
            arch_subdir: true,
        }
    }
}

/// Configuration for locating and reading the solution library
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Directory used verbatim (before arch narrowing) when set
    pub path_override: Option<PathBuf>,
    /// Fallback chain when there is no override
    pub search: SearchPolicy,
    /// Metadata file name inside the library directory
    pub metadata_file: String,
    /// Module file name suffix, matched after the architecture name
    pub module_suffix: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path_override: None,
            search: SearchPolicy::default(),
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            module_suffix: DEFAULT_MODULE_SUFFIX.to_string(),
        }
    }
}

impl LibraryConfig {
    /// Defaults plus the `CONTRACTR_LIBRARY_PATH` and `CONTRACTR_MODULE_SUFFIX`
    /// overrides from the environment.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            path_override: non_blank(LIBRARY_PATH_ENV).map(PathBuf::from),
            module_suffix: non_blank(MODULE_SUFFIX_ENV)
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .unwrap_or(defaults.module_suffix.clone()),
            ..defaults
        }
    }

    /// Use `dir` as the library directory.
    pub fn with_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_override = Some(dir.into());
        self
    }
}
