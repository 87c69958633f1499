use crate::{
    programs::{
        GpuProgram, GpuProgramRenderContext, SceneProgramInit, scene_pipeline, shading_depth_state,
    },
    scene::Scene,
    shaders::{BIND_GROUP_SCENE, create_module},
};

/// Reference shading: every fragment loops over every active light.
pub struct NaiveProgram {
    pipeline: wgpu::RenderPipeline,
}

impl GpuProgram for NaiveProgram {
    type InitData<'i> = SceneProgramInit<'i>;
    type DrawData<'a> = (&'a wgpu::BindGroup, &'a Scene);

    fn new(ctx: &GpuProgramRenderContext, init: &Self::InitData<'_>) -> Self {
        let shader = create_module(ctx.device, "Naive Shader", init.source);
        let pipeline = scene_pipeline(
            ctx,
            "Naive Pipeline",
            &init.layouts.groups(),
            &shader,
            Some("fs_main"),
            shading_depth_state(init.depth_prepass),
        );
        Self { pipeline }
    }

    fn record(&self, rpass: &mut wgpu::RenderPass<'_>, (scene_group, scene): Self::DrawData<'_>) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(BIND_GROUP_SCENE, scene_group, &[]);
        scene.record(rpass);
    }
}
