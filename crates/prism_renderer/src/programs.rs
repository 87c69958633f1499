pub mod depth_prepass_program;
pub mod forward_plus_program;
pub mod linear_depth_program;
pub mod naive_program;

pub use depth_prepass_program::{DepthPrepassInit, DepthPrepassProgram};
pub use forward_plus_program::{ForwardPlusProgram, ShadeDrawData};
pub use linear_depth_program::LinearDepthProgram;
pub use naive_program::NaiveProgram;

use prism_core::DepthPrepass;

use crate::{global_resources::uniform_entry, mesh::Vertex, texture::TextureHelper};

/// Holds common WGPU references to simplify function signatures.
pub struct GpuProgramRenderContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub format: wgpu::TextureFormat, // swapchain format
}

pub trait GpuProgram {
    /// Data required to build the pipelines (layouts, shader source).
    type InitData<'i>;

    /// Data required to draw a frame.
    type DrawData<'a>;

    fn new(ctx: &GpuProgramRenderContext, init_data: &Self::InitData<'_>) -> Self;

    fn record(&self, rpass: &mut wgpu::RenderPass<'_>, data: Self::DrawData<'_>);
}

/// Layouts shared by every program that draws the scene: group 0 is the
/// scene group, 1 the per node model uniform, 2 the material uniform.
#[derive(Clone)]
pub struct SceneLayouts {
    pub scene: wgpu::BindGroupLayout,
    pub model: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
}

impl SceneLayouts {
    pub fn new(device: &wgpu::Device, scene: wgpu::BindGroupLayout) -> Self {
        let model = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });
        Self {
            scene,
            model,
            material,
        }
    }

    pub fn groups(&self) -> [&wgpu::BindGroupLayout; 3] {
        [&self.scene, &self.model, &self.material]
    }
}

pub struct SceneProgramInit<'a> {
    pub layouts: &'a SceneLayouts,
    pub source: &'a str,
    pub depth_prepass: DepthPrepass,
}

/// Depth state of the shading pass. With a pre-pass the buffer already
/// holds the nearest surface, so shading only tests against it.
pub fn shading_depth_state(prepass: DepthPrepass) -> wgpu::DepthStencilState {
    let (depth_write_enabled, depth_compare) = match prepass {
        DepthPrepass::Off => (true, wgpu::CompareFunction::Less),
        DepthPrepass::Depth | DepthPrepass::LinearDepth => (false, wgpu::CompareFunction::LessEqual),
    };
    wgpu::DepthStencilState {
        format: TextureHelper::DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Pipeline over the scene vertex layout. No fragment entry means a depth only pass.
pub(crate) fn scene_pipeline(
    ctx: &GpuProgramRenderContext,
    label: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    module: &wgpu::ShaderModule,
    fragment_entry: Option<&str>,
    depth_stencil: wgpu::DepthStencilState,
) -> wgpu::RenderPipeline {
    let layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label} Layout")),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    let targets = [Some(wgpu::ColorTargetState {
        format: ctx.format,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    })];
    let fragment = fragment_entry.map(|entry_point| wgpu::FragmentState {
        module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        targets: &targets,
    });

    ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::desc()],
        },
        fragment,
        depth_stencil: Some(depth_stencil),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shading_writes_depth_only_without_prepass() {
        let off = shading_depth_state(DepthPrepass::Off);
        assert!(off.depth_write_enabled);
        assert_eq!(off.depth_compare, wgpu::CompareFunction::Less);

        for prepass in [DepthPrepass::Depth, DepthPrepass::LinearDepth] {
            let state = shading_depth_state(prepass);
            assert!(!state.depth_write_enabled);
            assert_eq!(state.depth_compare, wgpu::CompareFunction::LessEqual);
        }
    }
}
