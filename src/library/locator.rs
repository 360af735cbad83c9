//! Discovery of kernel modules and solution metadata
//!
//! [`FsLocator`] resolves the library directory from [`LibraryConfig`] and
//! lists module files named for the architecture; [`StaticLocator`] serves an in-memory catalog for
//! deterministic setups.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::hardware::HardwareDescriptor;

/// Solution metadata text and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSource {
    /// Path or label used in diagnostics
    pub origin: String,
    /// YAML document
    pub text: String,
}

/// Source of kernel module paths and catalog metadata
pub trait ResourceLocator: Send + Sync {
    /// Module files to load for `hardware`, possibly none.
    fn kernel_modules(&self, hardware: &HardwareDescriptor) -> Result<Vec<PathBuf>>;

    /// Where [`kernel_modules`](Self::kernel_modules) looks, for diagnostics.
    fn module_search(&self, hardware: &HardwareDescriptor) -> String {
        format!("<modules for {}>", hardware.arch())
    }

    /// The catalog document for `hardware`.
    ///
    /// Failure here is fatal to initialization.
    fn read_metadata(&self, hardware: &HardwareDescriptor) -> Result<MetadataSource>;
}

// ============================================================================
// Filesystem
// ============================================================================

/// Locator backed by the real filesystem
#[derive(Debug, Clone)]
pub struct FsLocator {
    config: LibraryConfig,
    base: Option<PathBuf>,
}

impl FsLocator {
    /// Locator using `config`; the base directory is the running executable's.
    pub fn new(config: LibraryConfig) -> Self {
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self { config, base }
    }

    /// Replace the directory the fallback chain starts from.
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Resolve the library directory for `hardware`.
    pub fn library_dir(&self, hardware: &HardwareDescriptor) -> PathBuf {
        let dir = match &self.config.path_override {
            Some(path) => path.clone(),
            None => {
                let policy = &self.config.search;
                let base = self
                    .base
                    .clone()
                    .unwrap_or_else(|| policy.fallback_base.clone());
                let candidates: Vec<PathBuf> =
                    policy.subdirs.iter().map(|sub| base.join(sub)).collect();
                candidates
                    .iter()
                    .find(|c| c.is_dir())
                    .or(candidates.last())
                    .cloned()
                    .unwrap_or(base)
            }
        };

        let arch_dir = dir.join(hardware.arch());
        if self.config.search.arch_subdir && arch_dir.is_dir() {
            arch_dir
        } else {
            dir
        }
    }

    /// Whether `path` matches `*<arch>*<suffix>`.
    fn is_module_for(&self, path: &Path, arch: &str) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        name.strip_suffix(self.config.module_suffix.as_str())
            .is_some_and(|head| head.contains(arch))
    }

    /// Path of the metadata file for `hardware`.
    pub fn metadata_path(&self, hardware: &HardwareDescriptor) -> PathBuf {
        self.library_dir(hardware).join(&self.config.metadata_file)
    }
}

impl ResourceLocator for FsLocator {
    fn kernel_modules(&self, hardware: &HardwareDescriptor) -> Result<Vec<PathBuf>> {
        let dir = self.library_dir(hardware);
        debug!(pattern = %self.module_search(hardware), "Searching for kernel modules");

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::LibraryDir { path: dir, source }),
        };

        let mut modules: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.is_module_for(path, hardware.arch()))
            .collect();
        modules.sort();
        Ok(modules)
    }

    fn module_search(&self, hardware: &HardwareDescriptor) -> String {
        format!(
            "{}/*{}*{}",
            self.library_dir(hardware).display(),
            hardware.arch(),
            self.config.module_suffix
        )
    }

    fn read_metadata(&self, hardware: &HardwareDescriptor) -> Result<MetadataSource> {
        let path = self.metadata_path(hardware);
        let text =
            std::fs::read_to_string(&path).map_err(|e| Error::metadata_unreadable(&path, e))?;
        Ok(MetadataSource {
            origin: path.display().to_string(),
            text,
        })
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Locator serving a fixed catalog and module list
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    metadata: Option<String>,
    modules: Vec<PathBuf>,
}

impl StaticLocator {
    /// Locator with the given catalog YAML and no modules.
    pub fn new(metadata: impl Into<String>) -> Self {
        Self {
            metadata: Some(metadata.into()),
            modules: Vec::new(),
        }
    }

    /// Locator whose metadata read fails.
    pub fn without_metadata() -> Self {
        Self::default()
    }

    /// Report `path` as a module file for every architecture.
    pub fn with_module(mut self, path: impl Into<PathBuf>) -> Self {
        self.modules.push(path.into());
        self
    }
}

impl ResourceLocator for StaticLocator {
    fn kernel_modules(&self, _hardware: &HardwareDescriptor) -> Result<Vec<PathBuf>> {
        Ok(self.modules.clone())
    }

    fn module_search(&self, _hardware: &HardwareDescriptor) -> String {
        "<static>".to_string()
    }

    fn read_metadata(&self, _hardware: &HardwareDescriptor) -> Result<MetadataSource> {
        match &self.metadata {
            Some(text) => Ok(MetadataSource {
                origin: "<static>".to_string(),
                text: text.clone(),
            }),
            None => Err(Error::metadata_unreadable(
                "<static>",
                std::io::Error::new(std::io::ErrorKind::NotFound, "no catalog configured"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Capabilities;

    fn gfx90a() -> HardwareDescriptor {
        HardwareDescriptor::new("gfx90a", Capabilities::NONE)
    }

    #[test]
    fn test_override_and_arch_subdir() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = FsLocator::new(LibraryConfig::default().with_path(tmp.path()));
        assert_eq!(locator.library_dir(&gfx90a()), tmp.path());

        std::fs::create_dir(tmp.path().join("gfx90a")).unwrap();
        assert_eq!(locator.library_dir(&gfx90a()), tmp.path().join("gfx90a"));
    }

    #[test]
    fn test_fallback_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join("a/b");
        std::fs::create_dir_all(&bin).unwrap();
        let locator = FsLocator::new(LibraryConfig::default()).with_base(&bin);

        // Neither candidate exists: the last one is used.
        assert_eq!(locator.library_dir(&gfx90a()), bin.join("library"));

        let secondary = bin.join("../../kernels/library");
        std::fs::create_dir_all(&secondary).unwrap();
        assert_eq!(locator.library_dir(&gfx90a()), secondary);
    }

    #[test]
    fn test_module_listing_matches_arch() {
        let tmp = tempfile::tempdir().unwrap();
        let names = [
            "Kernels.so-000-gfx90a.hsaco",
            "Kernels_gfx942.co",
            "TensileLibrary_gfx90a.co",
            "gfx90a_notes.txt",
            "co_without_arch.co",
        ];
        for name in names {
            std::fs::write(tmp.path().join(name), b"").unwrap();
        }
        let config = LibraryConfig {
            module_suffix: "co".into(),
            ..LibraryConfig::default().with_path(tmp.path())
        };
        let locator = FsLocator::new(config);
        let modules = locator.kernel_modules(&gfx90a()).unwrap();
        assert_eq!(
            modules,
            vec![
                tmp.path().join("Kernels.so-000-gfx90a.hsaco"),
                tmp.path().join("TensileLibrary_gfx90a.co"),
            ]
        );
        assert_eq!(
            locator.module_search(&gfx90a()),
            format!("{}/*gfx90a*co", tmp.path().display())
        );
    }

    #[test]
    fn test_unlistable_library_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not_a_dir");
        std::fs::write(&file, b"").unwrap();
        let locator = FsLocator::new(LibraryConfig::default().with_path(&file));
        let err = locator.kernel_modules(&gfx90a()).unwrap_err();
        assert!(matches!(err, Error::LibraryDir { .. }), "{err}");
    }

    #[test]
    fn test_missing_library_dir_has_no_modules() {
        let tmp = tempfile::tempdir().unwrap();
        let config = LibraryConfig::default().with_path(tmp.path().join("absent"));
        let locator = FsLocator::new(config);
        assert!(locator.kernel_modules(&gfx90a()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_metadata_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = FsLocator::new(LibraryConfig::default().with_path(tmp.path()));
        let err = locator.read_metadata(&gfx90a()).unwrap_err();
        assert!(err.is_fatal_init());
        assert!(err.to_string().contains("SolutionLibrary.yaml"), "{err}");
    }

    #[test]
    fn test_static_locator() {
        let locator = StaticLocator::new("version: 1").with_module("virtual.co");
        assert_eq!(locator.kernel_modules(&gfx90a()).unwrap().len(), 1);
        assert_eq!(locator.read_metadata(&gfx90a()).unwrap().text, "version: 1");
        assert!(StaticLocator::without_metadata().read_metadata(&gfx90a()).is_err());
    }
}
