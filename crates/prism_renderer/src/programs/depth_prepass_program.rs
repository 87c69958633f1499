use crate::{
    programs::{GpuProgram, GpuProgramRenderContext, SceneLayouts, scene_pipeline},
    scene::Scene,
    shaders::{BIND_GROUP_SCENE, create_module},
    texture::TextureHelper,
};

/// Vertex only pass that fills the depth buffer ahead of shading.
pub struct DepthPrepassProgram {
    pipeline: wgpu::RenderPipeline,
}

pub struct DepthPrepassInit<'a> {
    pub layouts: &'a SceneLayouts,
    pub source: &'a str,
}

impl GpuProgram for DepthPrepassProgram {
    type InitData<'i> = DepthPrepassInit<'i>;
    type DrawData<'a> = (&'a wgpu::BindGroup, &'a Scene);

    fn new(ctx: &GpuProgramRenderContext, init: &Self::InitData<'_>) -> Self {
        let shader = create_module(ctx.device, "Depth Prepass Shader", init.source);
        let pipeline = scene_pipeline(
            ctx,
            "Depth Prepass Pipeline",
            &init.layouts.groups(),
            &shader,
            None,
            wgpu::DepthStencilState {
                format: TextureHelper::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            },
        );
        Self { pipeline }
    }

    fn record(&self, rpass: &mut wgpu::RenderPass<'_>, (scene_group, scene): Self::DrawData<'_>) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(BIND_GROUP_SCENE, scene_group, &[]);
        scene.record(rpass);
    }
}
