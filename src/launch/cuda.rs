//! CUDA kernel module adapter
//!
//! Loads compiled module files (cubin, fatbin or PTX) into one device context,
//! resolves kernel functions on demand and launches them on registered streams.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaEvent, CudaFunction, CudaModule, CudaStream};
use cudarc::driver::sys::CUevent_flags;
use cudarc::nvrtc::Ptx;
use half::{bf16, f16};
use parking_lot::RwLock;
use tracing::debug;

use super::{EventId, KernelArg, KernelLaunchRequest, KernelModuleAdapter, StreamId, TimingEvents};
use crate::dtype::{Complex64, Complex128, ComputeType};
use crate::error::{Error, Result};
use crate::scalar::NativeScalar;

/// Adapter over a single CUDA device context
pub struct CudaModuleAdapter {
    context: Arc<CudaContext>,
    modules: Vec<Arc<CudaModule>>,
    functions: RwLock<HashMap<String, CudaFunction>>,
    streams: RwLock<HashMap<StreamId, Arc<CudaStream>>>,
    events: RwLock<HashMap<EventId, CudaEvent>>,
    next_event: RwLock<u64>,
}

impl CudaModuleAdapter {
    /// Adapter for device `device_index`; [`StreamId::DEFAULT`] maps to the
    /// context's default stream.
    pub fn new(device_index: usize) -> Result<Self> {
        let context = CudaContext::new(device_index)?;
        let mut streams = HashMap::new();
        streams.insert(StreamId::DEFAULT, context.default_stream());
        Ok(Self {
            context,
            modules: Vec::new(),
            functions: RwLock::new(HashMap::new()),
            streams: RwLock::new(streams),
            events: RwLock::new(HashMap::new()),
            next_event: RwLock::new(1),
        })
    }

    /// Device context
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// Make `stream` addressable as `id`.
    pub fn register_stream(&self, id: StreamId, stream: Arc<CudaStream>) {
        self.streams.write().insert(id, stream);
    }

    /// Create a new stream and register it.
    pub fn create_stream(&self) -> Result<StreamId> {
        let stream = self.context.new_stream()?;
        let mut streams = self.streams.write();
        let id = StreamId(streams.keys().map(|s| s.0).max().unwrap_or(0) + 1);
        streams.insert(id, stream);
        Ok(id)
    }

    /// Create a start/stop event pair with timing enabled.
    pub fn create_timing_events(&self) -> Result<TimingEvents> {
        let start = self.context.new_event(Some(CUevent_flags::CU_EVENT_DEFAULT))?;
        let stop = self.context.new_event(Some(CUevent_flags::CU_EVENT_DEFAULT))?;

        let mut next = self.next_event.write();
        let ids = TimingEvents {
            start: EventId(*next),
            stop: EventId(*next + 1),
        };
        *next += 2;

        let mut events = self.events.write();
        events.insert(ids.start, start);
        events.insert(ids.stop, stop);
        Ok(ids)
    }

    /// Milliseconds between the two events once both have completed.
    pub fn elapsed_ms(&self, timing: TimingEvents) -> Result<f32> {
        let events = self.events.read();
        let (start, stop) = event_pair(&events, timing)?;
        start.synchronize()?;
        stop.synchronize()?;
        Ok(start.elapsed_ms(stop)?)
    }

    fn function(&self, kernel: &str) -> Option<CudaFunction> {
        if let Some(func) = self.functions.read().get(kernel) {
            return Some(func.clone());
        }
        let func = self
            .modules
            .iter()
            .find_map(|module| module.load_function(kernel).ok())?;
        self.functions
            .write()
            .insert(kernel.to_string(), func.clone());
        Some(func)
    }

    fn stream(&self, id: StreamId) -> Result<Arc<CudaStream>> {
        self.streams
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Launch(format!("{id} is not registered")))
    }
}

impl KernelModuleAdapter for CudaModuleAdapter {
    fn load_module_file(&mut self, path: &Path) -> Result<()> {
        let module = self
            .context
            .load_module(Ptx::from_file(path))
            .map_err(|e| Error::module_load(path, format!("{e:?}")))?;
        debug!(path = %path.display(), "Loaded kernel module");
        self.modules.push(module);
        Ok(())
    }

    fn module_count(&self) -> usize {
        self.modules.len()
    }

    fn contains_kernel(&self, kernel: &str) -> bool {
        self.function(kernel).is_some()
    }

    fn launch(&self, request: &KernelLaunchRequest<'_>) -> Result<()> {
        let func = self.function(request.kernel()).ok_or_else(|| Error::KernelNotFound {
            kernel: request.kernel().to_string(),
        })?;
        let stream = self.stream(request.stream)?;
        let values = request
            .args
            .iter()
            .map(ArgValue::from_arg)
            .collect::<Result<Vec<_>>>()?;

        let cfg = cudarc::driver::LaunchConfig {
            grid_dim: request.config.grid,
            block_dim: request.config.block,
            shared_mem_bytes: request.config.shared_mem_bytes,
        };

        let events = self.events.read();
        let timing = request
            .timing
            .map(|t| event_pair(&events, t))
            .transpose()?;

        if let Some((start, _)) = timing {
            start.record(&stream)?;
        }

        let mut builder = stream.launch_builder(&func);
        for value in &values {
            value.push(&mut builder);
        }
        // SAFETY: argument order and types follow the kernel signature the
        // catalog advertises; pointers were supplied by the caller as valid
        // device addresses.
        unsafe { builder.launch(cfg) }.map_err(|e| {
            Error::Launch(format!("kernel '{}' launch failed: {:?}", request.kernel(), e))
        })?;

        if let Some((_, stop)) = timing {
            stop.record(&stream)?;
        }
        Ok(())
    }
}

fn event_pair(
    events: &HashMap<EventId, CudaEvent>,
    timing: TimingEvents,
) -> Result<(&CudaEvent, &CudaEvent)> {
    let get = |id: EventId| {
        events
            .get(&id)
            .ok_or_else(|| Error::Launch(format!("event {} is not registered", id.0)))
    };
    Ok((get(timing.start)?, get(timing.stop)?))
}

/// Owned kernel argument values, kept alive for the launch builder
enum ArgValue {
    U64(u64),
    F16(f16),
    BF16(bf16),
    F32(f32),
    F64(f64),
    C64(Complex64),
    C128(Complex128),
    I32(i32),
}

impl ArgValue {
    fn from_arg(arg: &KernelArg) -> Result<Self> {
        Ok(match *arg {
            KernelArg::Pointer(ptr) | KernelArg::ScalarPointer(ptr) => Self::U64(ptr.0),
            KernelArg::Size(n) => Self::U64(n),
            KernelArg::Scalar(s) => Self::from_scalar(&s)?,
        })
    }

    fn from_scalar(s: &NativeScalar) -> Result<Self> {
        let missing = || Error::Internal(format!("scalar of type {} is malformed", s.ty()));
        Ok(match s.ty() {
            ComputeType::Half => Self::F16(s.get().ok_or_else(missing)?),
            ComputeType::BFloat16 => Self::BF16(s.get().ok_or_else(missing)?),
            ComputeType::Float => Self::F32(s.get().ok_or_else(missing)?),
            ComputeType::Double => Self::F64(s.get().ok_or_else(missing)?),
            ComputeType::ComplexFloat => Self::C64(s.get().ok_or_else(missing)?),
            ComputeType::ComplexDouble => Self::C128(s.get().ok_or_else(missing)?),
            ComputeType::Int32 => Self::I32(s.get().ok_or_else(missing)?),
            ComputeType::Int8x4 => {
                return Err(Error::Internal(
                    "Int8x4 is not a scalar argument type".to_string(),
                ));
            }
        })
    }

    fn push<'a>(&'a self, builder: &mut cudarc::driver::LaunchArgs<'a>) {
        match self {
            Self::U64(v) => builder.arg(v),
            Self::F16(v) => builder.arg(v),
            Self::BF16(v) => builder.arg(v),
            Self::F32(v) => builder.arg(v),
            Self::F64(v) => builder.arg(v),
            Self::C64(v) => builder.arg(v),
            Self::C128(v) => builder.arg(v),
            Self::I32(v) => builder.arg(v),
        };
    }
}
