use crate::{
    programs::{
        GpuProgram, GpuProgramRenderContext, SceneProgramInit, scene_pipeline, shading_depth_state,
    },
    scene::Scene,
    shaders::{BIND_GROUP_LINEAR_DEPTH, BIND_GROUP_SCENE, create_module},
};

/// Clustered shading. Two pipelines over one module: the cluster slice comes
/// either from the interpolated view depth or from the linear depth surface.
pub struct ForwardPlusProgram {
    interpolated: wgpu::RenderPipeline,
    linear: wgpu::RenderPipeline,
    pub linear_depth_layout: wgpu::BindGroupLayout,
}

pub struct ShadeDrawData<'a> {
    pub scene_group: &'a wgpu::BindGroup,
    pub scene: &'a Scene,
    /// Set when a linear depth surface was resolved this frame.
    pub linear_depth: Option<&'a wgpu::BindGroup>,
}

impl GpuProgram for ForwardPlusProgram {
    type InitData<'i> = SceneProgramInit<'i>;
    type DrawData<'a> = ShadeDrawData<'a>;

    fn new(ctx: &GpuProgramRenderContext, init: &Self::InitData<'_>) -> Self {
        let linear_depth_layout = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Linear Depth Read Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            }],
        });

        let shader = create_module(ctx.device, "Forward+ Shader", init.source);
        let [scene, model, material] = init.layouts.groups();
        let depth = shading_depth_state(init.depth_prepass);

        let interpolated = scene_pipeline(
            ctx,
            "Forward+ Pipeline",
            &[scene, model, material],
            &shader,
            Some("fs_main"),
            depth.clone(),
        );
        let linear = scene_pipeline(
            ctx,
            "Forward+ Linear Depth Pipeline",
            &[scene, model, material, &linear_depth_layout],
            &shader,
            Some("fs_main_linear_depth"),
            depth,
        );

        Self {
            interpolated,
            linear,
            linear_depth_layout,
        }
    }

    fn record(&self, rpass: &mut wgpu::RenderPass<'_>, data: Self::DrawData<'_>) {
        match data.linear_depth {
            Some(group) => {
                rpass.set_pipeline(&self.linear);
                rpass.set_bind_group(BIND_GROUP_LINEAR_DEPTH, group, &[]);
            }
            None => rpass.set_pipeline(&self.interpolated),
        }
        rpass.set_bind_group(BIND_GROUP_SCENE, data.scene_group, &[]);
        data.scene.record(rpass);
    }
}
