use std::sync::Arc;

use winit::window::Window;

use crate::error::RenderError;

/// Device, queue and the window surface. Created once, passed by reference
/// to everything that allocates GPU resources.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub limits: wgpu::Limits,
}

impl GpuContext {
    pub fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderError> {
        log::info!("Initializing GPU");

        // 1. Instance + surface. The surface keeps the window alive.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;

        // 2. Physical GPU
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        // 3. Logical device. The cluster index buffer is large, so ask for
        // everything the adapter offers on storage and buffer sizes.
        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::default().using_resolution(adapter_limits.clone())
        };
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Prism Device"),
            required_features: wgpu::Features::empty(),
            required_limits: required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))?;

        // 4. Configure the surface
        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(RenderError::UnsupportedSurface)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            limits: required_limits,
        })
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns false for a zero sized window, which keeps the old configuration.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    /// Rejects buffers the device cannot allocate or bind as storage.
    pub fn check_storage_size(&self, label: &'static str, size: u64) -> Result<(), RenderError> {
        check_storage_size(&self.limits, label, size)
    }
}

pub fn check_storage_size(limits: &wgpu::Limits, label: &'static str, size: u64) -> Result<(), RenderError> {
    let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if size > limit {
        return Err(RenderError::BufferTooLarge { label, size, limit });
    }
    Ok(())
}
