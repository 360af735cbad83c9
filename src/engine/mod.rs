//! Dispatch engine
//!
//! An [`Engine`] owns everything that is fixed for the life of a process: the
//! hardware descriptor, the loaded [`SolutionLibrary`] and the kernel module
//! adapter. [`Engine::run_contraction`] turns one [`GemmRequest`] into at most
//! one kernel launch:
//!
//! ```text
//! GemmRequest ──► ContractionProblem ──► select_best ──► ContractionInputs
//!                                                             │
//!                              Status ◄── adapter.launch ◄── KernelLaunchRequest
//! ```
//!
//! Every failure, including a panic inside the pipeline, is folded into a
//! [`Status`]; nothing escapes to the caller.
//!
//! The process-wide engine is created lazily by [`engine`] (or eagerly by
//! [`initialize`]). If its metadata cannot be read the process aborts with a
//! message naming the file. Explicit engines built with [`EngineBuilder`]
//! report the same condition as an `Err` instead.

pub mod diagnostics;
mod status;

pub use diagnostics::DiagnosticLatch;
pub use status::Status;

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Once, OnceLock};

use tracing::{debug, error, info};

use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::hardware::{DefaultProbe, HardwareDescriptor, HardwareProbe};
use crate::launch::{DefaultAdapter, KernelLaunchRequest, KernelModuleAdapter};
use crate::library::{FsLocator, ResourceLocator, SolutionLibrary};
use crate::problem::{ContractionProblem, GemmRequest};
use crate::scalar::ContractionInputs;

// ============================================================================
// Engine
// ============================================================================

/// Loaded hardware context, solution library and kernel adapter
#[derive(Debug)]
pub struct Engine<A = DefaultAdapter> {
    hardware: HardwareDescriptor,
    library: SolutionLibrary,
    adapter: A,
    diagnostics: DiagnosticLatch,
}

impl<A: KernelModuleAdapter> Engine<A> {
    /// Target device
    pub fn hardware(&self) -> &HardwareDescriptor {
        &self.hardware
    }

    /// Loaded catalog
    pub fn library(&self) -> &SolutionLibrary {
        &self.library
    }

    /// Kernel module adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Diagnostics emitted by this engine
    pub fn diagnostics(&self) -> &DiagnosticLatch {
        &self.diagnostics
    }

    /// Dispatch one request.
    ///
    /// Returns [`Status::NotImplemented`] when no loaded solution applies and
    /// [`Status::InternalError`] for every other failure. Safe to call from
    /// any number of threads at once.
    pub fn run_contraction(&self, request: &GemmRequest) -> Status {
        install_dispatch_panic_hook();
        let outcome = {
            let _scope = DispatchScope::enter();
            panic::catch_unwind(AssertUnwindSafe(|| self.try_run(request)))
        };
        match outcome {
            Ok(Ok(())) => Status::Success,
            Ok(Err(e)) => {
                let status = e.status();
                self.diagnostics.emit(&e.to_string());
                debug!(request = %request, %status, "Dispatch failed");
                status
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let location = LAST_PANIC_LOCATION.take().unwrap_or_default();
                self.diagnostics.emit(&format!(
                    "Panic during dispatch of {request}: {reason}{location}"
                ));
                Status::InternalError
            }
        }
    }

    /// The dispatch pipeline with errors surfaced.
    pub fn try_run(&self, request: &GemmRequest) -> Result<()> {
        let problem = ContractionProblem::from_request(request)?;
        let solution = self
            .library
            .select_best(&problem, &self.hardware)
            .ok_or_else(|| Error::NoSolution {
                problem: problem.to_string(),
            })?;
        let inputs = ContractionInputs::marshal(request)?;
        let launch =
            KernelLaunchRequest::new(solution, &problem, &inputs, request.stream, request.timing)?;

        debug!(
            kernel = launch.kernel(),
            grid = ?launch.config.grid,
            stream = %launch.stream,
            timed = launch.timing.is_some(),
            "Launching"
        );
        self.adapter.launch(&launch)
    }
}

// ============================================================================
// Panic reporting
// ============================================================================

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC_LOCATION: Cell<Option<String>> = const { Cell::new(None) };
}

static DISPATCH_PANIC_HOOK: Once = Once::new();

/// Keep panics caught by [`Engine::run_contraction`] off stderr; they are
/// reported through the diagnostic latch. Panics outside dispatch reach the
/// previously installed hook unchanged.
fn install_dispatch_panic_hook() {
    DISPATCH_PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_DISPATCH.get() {
                LAST_PANIC_LOCATION.set(info.location().map(|l| format!(" at {l}")));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as dispatching until dropped
struct DispatchScope {
    outer: bool,
}

impl DispatchScope {
    fn enter() -> Self {
        Self {
            outer: IN_DISPATCH.replace(true),
        }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        IN_DISPATCH.set(self.outer);
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Wires a probe, a resource locator and an adapter into an [`Engine`]
pub struct EngineBuilder<A = DefaultAdapter> {
    probe: Box<dyn HardwareProbe>,
    locator: Box<dyn ResourceLocator>,
    adapter: A,
}

impl<A: KernelModuleAdapter> EngineBuilder<A> {
    /// Builder with the default probe and a filesystem locator configured
    /// from the environment.
    pub fn new(adapter: A) -> Self {
        Self {
            probe: Box::new(DefaultProbe::default()),
            locator: Box::new(FsLocator::new(LibraryConfig::from_env())),
            adapter,
        }
    }

    /// Use `probe` for device detection.
    pub fn probe(mut self, probe: impl HardwareProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Use a fixed hardware descriptor.
    pub fn hardware(self, hardware: HardwareDescriptor) -> Self {
        self.probe(crate::hardware::FixedProbe(hardware))
    }

    /// Use `locator` for module and metadata discovery.
    pub fn locator(mut self, locator: impl ResourceLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    /// Use a filesystem locator with `config`.
    pub fn config(self, config: LibraryConfig) -> Self {
        self.locator(FsLocator::new(config))
    }

    /// Probe the device and load the library.
    pub fn build(mut self) -> Result<Engine<A>> {
        let hardware = self.probe.probe()?;
        debug!(%hardware, "Detected device");
        let library = SolutionLibrary::load(self.locator.as_ref(), &hardware, &mut self.adapter)?;
        Ok(Engine {
            hardware,
            library,
            adapter: self.adapter,
            diagnostics: DiagnosticLatch::new(),
        })
    }
}

impl EngineBuilder<DefaultAdapter> {
    /// Builder for the adapter this crate was compiled with.
    pub fn with_default_adapter() -> Result<Self> {
        #[cfg(feature = "cuda")]
        let adapter = crate::launch::CudaModuleAdapter::new(0)?;
        #[cfg(not(feature = "cuda"))]
        let adapter = crate::launch::RecordingAdapter::new();
        Ok(Self::new(adapter))
    }
}

// ============================================================================
// Initialize-once holder
// ============================================================================

/// Holds an engine that is built at most once
///
/// Concurrent first callers block until the single initialization finishes
/// and then observe the same engine, or the same error.
#[derive(Debug)]
pub struct EngineCell<A = DefaultAdapter> {
    cell: OnceLock<Result<Engine<A>>>,
}

impl<A> Default for EngineCell<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EngineCell<A> {
    /// Empty cell
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// The engine, running `init` if no attempt has been made yet.
    pub fn get_or_init(
        &self,
        init: impl FnOnce() -> Result<Engine<A>>,
    ) -> std::result::Result<&Engine<A>, &Error> {
        self.cell.get_or_init(init).as_ref()
    }

    /// The engine if initialization has completed successfully
    pub fn get(&self) -> Option<&Engine<A>> {
        self.cell.get().and_then(|r| r.as_ref().ok())
    }
}

// ============================================================================
// Process-wide engine
// ============================================================================

static ENGINE: EngineCell = EngineCell::new();
static INIT_FAILURE_REPORTED: Once = Once::new();

/// The process-wide engine, initialized on first use.
///
/// Aborts the process if the solution metadata is missing, unreadable or
/// malformed. Other initialization failures (no device, adapter errors) are
/// returned and logged once.
pub fn engine() -> std::result::Result<&'static Engine, &'static Error> {
    let result = ENGINE.get_or_init(|| {
        let engine = EngineBuilder::with_default_adapter()?.build()?;
        info!(hardware = %engine.hardware(), "Engine initialized");
        Ok(engine)
    });
    match result {
        Ok(engine) => Ok(engine),
        Err(e) if e.is_fatal_init() => abort_with(e),
        Err(e) => {
            INIT_FAILURE_REPORTED.call_once(|| {
                error!(error = %e, "Engine initialization failed");
            });
            Err(e)
        }
    }
}

/// Eagerly initialize the process-wide engine.
pub fn initialize() -> Status {
    match engine() {
        Ok(_) => Status::Success,
        Err(e) => e.status(),
    }
}

/// Dispatch `request` on the process-wide engine.
pub fn run_contraction(request: &GemmRequest) -> Status {
    match engine() {
        Ok(engine) => engine.run_contraction(request),
        Err(_) => Status::InternalError,
    }
}

fn abort_with(e: &Error) -> ! {
    error!(error = %e, "Cannot continue without solution metadata");
    eprintln!("contractr: fatal: {e}");
    std::process::abort()
}
