//! Device layer: headless wgpu context and readback plumbing.

pub mod codegen;
pub mod lattice;
pub mod moments;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Error, Result};

/// Global flag indicating the GPU device was lost.
static GPU_DEVICE_LOST: AtomicBool = AtomicBool::new(false);

/// Check if the GPU device has been lost.
pub fn is_device_lost() -> bool {
    GPU_DEVICE_LOST.load(Ordering::SeqCst)
}

/// Reset the device lost flag (call after recreating the device).
pub fn reset_device_lost() {
    GPU_DEVICE_LOST.store(false, Ordering::SeqCst);
}

/// Wait for a buffer map operation to complete, returning `Err` instead of
/// panicking on a lost device.
pub(crate) fn await_buffer_map(
    rx: std::sync::mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>,
) -> Result<()> {
    if is_device_lost() {
        return Err(Error::DeviceLost);
    }
    match rx.recv() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::error!("Buffer map failed: {:?}", e);
            Err(Error::BufferMap(e))
        }
        Err(_) => {
            log::error!("Buffer map channel disconnected - possible device lost");
            GPU_DEVICE_LOST.store(true, Ordering::SeqCst);
            Err(Error::ChannelDisconnected)
        }
    }
}

/// Headless compute context holding device and queue.
///
/// There is no surface: this core only dispatches compute work. Rendering
/// consumers bring their own windowed context and read moments after
/// [`crate::Lattice::sync`].
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Request a high-performance adapter and a compute device, blocking
    /// until both are available.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(Error::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("LBM Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(Error::RequestDevice)?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("GPU uncaptured error: {:?}", error);
            if matches!(error, wgpu::Error::OutOfMemory { .. }) {
                GPU_DEVICE_LOST.store(true, Ordering::SeqCst);
            }
        }));

        reset_device_lost();

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Wrap an externally created device and queue (shared contexts, tests).
    pub fn from_raw(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        }
    }
}
