use prism_core::DepthPrepass;

use crate::texture::TextureHelper;

/// Layouts the depth targets are bound through.
pub struct DepthLayouts<'a> {
    /// Depth texture + cluster params, read by the linear depth pass.
    pub resolve: &'a wgpu::BindGroupLayout,
    /// Linear depth surface, read by the Forward+ pass.
    pub read: &'a wgpu::BindGroupLayout,
}

struct LinearDepthTarget {
    view: wgpu::TextureView,
    resolve_group: wgpu::BindGroup,
    read_group: wgpu::BindGroup,
}

/// Window sized depth buffer, plus the linear depth surface when that
/// pre-pass mode is on. Recreated on every resize.
pub struct DepthTargets {
    pub depth: wgpu::TextureView,
    linear: Option<LinearDepthTarget>,
}

impl DepthTargets {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        prepass: DepthPrepass,
        layouts: &DepthLayouts,
        params: &wgpu::Buffer,
    ) -> Self {
        let depth = TextureHelper::create_depth_texture(device, width, height, "Depth Texture");
        let linear = (prepass == DepthPrepass::LinearDepth)
            .then(|| Self::create_linear(device, width, height, &depth, layouts, params));
        Self { depth, linear }
    }

    fn create_linear(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        depth: &wgpu::TextureView,
        layouts: &DepthLayouts,
        params: &wgpu::Buffer,
    ) -> LinearDepthTarget {
        let view = TextureHelper::create_linear_depth_texture(device, width, height, "Linear Depth Texture");
        let resolve_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Linear Depth Resolve Bind Group"),
            layout: layouts.resolve,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(depth),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params.as_entire_binding(),
                },
            ],
        });
        let read_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Linear Depth Read Bind Group"),
            layout: layouts.read,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
        });
        LinearDepthTarget {
            view,
            resolve_group,
            read_group,
        }
    }

    pub fn linear_view(&self) -> Option<&wgpu::TextureView> {
        self.linear.as_ref().map(|l| &l.view)
    }

    pub fn resolve_group(&self) -> Option<&wgpu::BindGroup> {
        self.linear.as_ref().map(|l| &l.resolve_group)
    }

    pub fn read_group(&self) -> Option<&wgpu::BindGroup> {
        self.linear.as_ref().map(|l| &l.read_group)
    }
}
