//! Dry-run adapter that records launches instead of submitting them

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use super::{KernelArg, KernelLaunchRequest, KernelModuleAdapter, LaunchConfig, StreamId};
use crate::error::{Error, Result};

/// A launch as seen by [`RecordingAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    /// Solution name
    pub solution: String,
    /// Kernel symbol
    pub kernel: String,
    /// Launch geometry
    pub config: LaunchConfig,
    /// Kernel arguments
    pub args: Vec<KernelArg>,
    /// Target stream
    pub stream: StreamId,
    /// Taken through the event-capturing path
    pub timed: bool,
}

/// Adapter for machines without a GPU runtime
///
/// Module files are remembered but not read. Every kernel counts as defined
/// once at least one module is loaded, unless a kernel set is given with
/// [`with_kernels`](Self::with_kernels).
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    modules: Vec<PathBuf>,
    kernels: Option<HashSet<String>>,
    fail_launches: bool,
    discard_history: bool,
    launch_count: AtomicUsize,
    launches: Mutex<Vec<RecordedLaunch>>,
}

impl RecordingAdapter {
    /// Empty adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the kernels loaded modules are considered to define.
    pub fn with_kernels<I, S>(mut self, kernels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kernels = Some(kernels.into_iter().map(Into::into).collect());
        self
    }

    /// Make every launch fail, as a device error would.
    pub fn failing(mut self) -> Self {
        self.fail_launches = true;
        self
    }

    /// Count launches without keeping them.
    pub fn discard_history(mut self) -> Self {
        self.discard_history = true;
        self
    }

    /// Module files loaded so far
    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }

    /// Snapshot of recorded launches
    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().clone()
    }

    /// Number of recorded launches
    pub fn launch_count(&self) -> usize {
        self.launch_count.load(Ordering::Relaxed)
    }
}

impl KernelModuleAdapter for RecordingAdapter {
    fn load_module_file(&mut self, path: &Path) -> Result<()> {
        trace!(path = %path.display(), "Recording module load");
        self.modules.push(path.to_path_buf());
        Ok(())
    }

    fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn contains_kernel(&self, kernel: &str) -> bool {
        !self.modules.is_empty()
            && self
                .kernels
                .as_ref()
                .is_none_or(|kernels| kernels.contains(kernel))
    }

    fn launch(&self, request: &KernelLaunchRequest<'_>) -> Result<()> {
        if self.fail_launches {
            return Err(Error::Launch(format!(
                "kernel '{}' rejected by device",
                request.kernel()
            )));
        }
        self.launch_count.fetch_add(1, Ordering::Relaxed);
        if self.discard_history {
            return Ok(());
        }
        self.launches.lock().push(RecordedLaunch {
            solution: request.solution.name().to_string(),
            kernel: request.kernel().to_string(),
            config: request.config,
            args: request.args.clone(),
            stream: request.stream,
            timed: request.timing.is_some(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels_need_a_module() {
        let mut adapter = RecordingAdapter::new();
        assert!(!adapter.contains_kernel("any"));
        adapter.load_module_file(Path::new("lib_gfx90a.co")).unwrap();
        assert!(adapter.contains_kernel("any"));
        assert_eq!(adapter.module_count(), 1);
    }

    #[test]
    fn test_kernel_set_restricts() {
        let mut adapter = RecordingAdapter::new().with_kernels(["k1"]);
        adapter.load_module_file(Path::new("m.co")).unwrap();
        assert!(adapter.contains_kernel("k1"));
        assert!(!adapter.contains_kernel("k2"));
    }
}
