use wgpu::{Device, Extent3d, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages};

pub struct TextureHelper;

impl TextureHelper {
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float; // Standard depth format
    /// One float of linear view depth per pixel.
    pub const LINEAR_DEPTH_FORMAT: TextureFormat = TextureFormat::R32Float;

    pub fn create_depth_texture(device: &Device, width: u32, height: u32, label: &str) -> wgpu::TextureView {
        Self::create_target(
            device,
            width,
            height,
            Self::DEPTH_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            label,
        )
    }

    pub fn create_linear_depth_texture(
        device: &Device,
        width: u32,
        height: u32,
        label: &str,
    ) -> wgpu::TextureView {
        Self::create_target(
            device,
            width,
            height,
            Self::LINEAR_DEPTH_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            label,
        )
    }

    fn create_target(
        device: &Device,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsages,
        label: &str,
    ) -> wgpu::TextureView {
        let size = Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }
}
