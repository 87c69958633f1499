use prism_cluster::{FrameError, GridError, LightError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("{label} needs {size} bytes but the device allows {limit}")]
    BufferTooLarge {
        label: &'static str,
        size: u64,
        limit: u64,
    },
    #[error("GPU failure while {context}: {source}")]
    Device {
        context: &'static str,
        #[source]
        source: wgpu::Error,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Light(#[from] LightError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl RenderError {
    /// Surface loss is the one failure a caller can recover from by
    /// reconfiguring and drawing the next frame.
    pub fn is_surface_lost(&self) -> bool {
        matches!(
            self,
            RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)
        )
    }
}

/// Runs `f` inside an error scope and turns an allocation or validation
/// failure into a terminal error.
pub fn scoped<T>(
    device: &wgpu::Device,
    context: &'static str,
    f: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match oom.or(validation) {
        Some(source) => {
            log::error!("GPU failure while {context}: {source}");
            Err(RenderError::Device { context, source })
        }
        None => Ok(value),
    }
}
