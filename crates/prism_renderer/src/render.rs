use std::sync::Arc;

use prism_cluster::{ClusterGrid, FramePhase, FrameSequencer, GridLayout, LightStore, Projection, Viewport};
use prism_core::{CameraRig, DepthPrepass, EngineConfig, RenderMode};
use winit::window::Window;

use crate::{
    cluster_pass::ClusterPass,
    context::GpuContext,
    depth_pass::{DepthLayouts, DepthTargets},
    error::RenderError,
    global_resources::{CameraUniforms, GlobalResources},
    light_buffers::LightBuffers,
    programs::{
        DepthPrepassInit, DepthPrepassProgram, ForwardPlusProgram, GpuProgram, GpuProgramRenderContext,
        LinearDepthProgram, NaiveProgram, SceneLayouts, SceneProgramInit, ShadeDrawData,
    },
    scene::{Scene, SceneDescription},
    shaders::{ShaderConstants, ShaderSources},
};

struct Programs {
    forward_plus: ForwardPlusProgram,
    naive: NaiveProgram,
    depth_prepass: DepthPrepassProgram,
    linear_depth: LinearDepthProgram,
}

/// Owns the device and every GPU resource, and records one frame per `render`.
pub struct Renderer {
    ctx: GpuContext,
    rig: CameraRig,
    lights: LightStore,
    frames: FrameSequencer,
    grid_layout: GridLayout,
    mode: RenderMode,
    depth_prepass: DepthPrepass,
    clear_color: wgpu::Color,

    global: GlobalResources,
    light_buffers: LightBuffers,
    clusters: ClusterPass,
    depth: DepthTargets,
    programs: Programs,
    scene: Scene,
}

impl Renderer {
    pub fn new(window: Arc<Window>, config: &EngineConfig) -> Result<Self, RenderError> {
        let ctx = GpuContext::new(window, config.renderer.vsync)?;
        let rig = CameraRig::from_config(&config.camera, ctx.width(), ctx.height());
        let lights = LightStore::new(&config.lights)?;
        let grid_layout = GridLayout::from(&config.clusters);
        let grid = ClusterGrid::build(
            Viewport::new(ctx.width(), ctx.height()),
            grid_layout,
            Projection::from(&rig.camera),
        )?;

        let sources = ShaderSources::new(&ShaderConstants::from_config(config));

        ctx.check_storage_size("light set", LightStore::buffer_size(lights.max_num_lights()) as u64)?;
        let light_buffers = LightBuffers::new(
            &ctx.device,
            &lights,
            &sources.move_lights,
            config.clusters.move_lights_workgroup_size,
        );

        // the clustering pass binds the camera too, so its buffer comes first
        let camera_buffer = GlobalResources::create_camera_buffer(&ctx.device);
        let clusters = ClusterPass::new(
            &ctx,
            grid,
            &camera_buffer,
            &light_buffers.light_set,
            &sources.clustering,
            config.clusters.workgroup_size,
        )?;
        let global = GlobalResources::new(&ctx.device, camera_buffer, &light_buffers, &clusters);

        let depth_prepass = config.renderer.depth_prepass;
        let layouts = SceneLayouts::new(&ctx.device, global.layout.clone());
        let program_ctx = GpuProgramRenderContext {
            device: &ctx.device,
            queue: &ctx.queue,
            format: ctx.format(),
        };
        let programs = Programs {
            forward_plus: ForwardPlusProgram::new(
                &program_ctx,
                &SceneProgramInit {
                    layouts: &layouts,
                    source: &sources.forward_plus,
                    depth_prepass,
                },
            ),
            naive: NaiveProgram::new(
                &program_ctx,
                &SceneProgramInit {
                    layouts: &layouts,
                    source: &sources.naive,
                    depth_prepass,
                },
            ),
            depth_prepass: DepthPrepassProgram::new(
                &program_ctx,
                &DepthPrepassInit {
                    layouts: &layouts,
                    source: &sources.depth_prepass,
                },
            ),
            linear_depth: LinearDepthProgram::new(&program_ctx, &sources.linear_depth.as_str()),
        };

        let depth = DepthTargets::new(
            &ctx.device,
            ctx.width(),
            ctx.height(),
            depth_prepass,
            &DepthLayouts {
                resolve: &programs.linear_depth.layout,
                read: &programs.forward_plus.linear_depth_layout,
            },
            clusters.params_buffer(),
        );

        let scene = Scene::new(
            &ctx.device,
            SceneDescription::procedural(),
            &layouts.model,
            &layouts.material,
        );

        let [r, g, b] = config.renderer.clear_color;
        log::info!(
            "Renderer ready: {:?}, depth pre-pass {:?}, {} of {} lights",
            config.renderer.mode,
            depth_prepass,
            lights.num_lights(),
            lights.max_num_lights()
        );

        Ok(Self {
            ctx,
            rig,
            lights,
            frames: FrameSequencer::new(),
            grid_layout,
            mode: config.renderer.mode,
            depth_prepass,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            global,
            light_buffers,
            clusters,
            depth,
            programs,
            scene,
        })
    }

    pub fn camera(&self) -> &CameraRig {
        &self.rig
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.rig
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn toggle_mode(&mut self) -> RenderMode {
        self.mode = self.mode.toggled();
        log::info!("Render mode: {:?}", self.mode);
        self.mode
    }

    pub fn num_lights(&self) -> u32 {
        self.lights.num_lights()
    }

    pub fn max_num_lights(&self) -> u32 {
        self.lights.max_num_lights()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames.frames_submitted()
    }

    /// Clamps `n` to the light set capacity and publishes the new active
    /// prefix to the GPU. Returns the count that was applied.
    pub fn set_num_lights(&mut self, n: u32) -> Result<u32, RenderError> {
        let n = n.min(self.lights.max_num_lights());
        self.lights.set_active_count(n)?;
        self.light_buffers.write_num_lights(&self.ctx.queue, &self.lights);
        Ok(n)
    }

    /// Rebuilds the cluster grid and every window sized resource.
    /// A zero sized window is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if !self.ctx.resize(width, height) {
            return Ok(());
        }
        if !self.frames.is_between_frames() {
            self.frames.abandon();
        }
        // old cluster buffers may still be read by a submitted frame
        if let Err(err) = self.ctx.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::warn!("Device poll before resize failed: {err}");
        }

        self.rig.camera.set_viewport(width, height);
        let grid = ClusterGrid::build(
            Viewport::new(width, height),
            self.grid_layout,
            Projection::from(&self.rig.camera),
        )?;
        self.clusters.rebuild(
            &self.ctx,
            grid,
            self.global.camera_buffer(),
            &self.light_buffers.light_set,
        )?;
        self.global
            .rebind(&self.ctx.device, &self.light_buffers, &self.clusters);
        self.depth = DepthTargets::new(
            &self.ctx.device,
            width,
            height,
            self.depth_prepass,
            &DepthLayouts {
                resolve: &self.programs.linear_depth.layout,
                read: &self.programs.forward_plus.linear_depth_layout,
            },
            self.clusters.params_buffer(),
        );
        log::info!("Resized to {width}x{height}");
        Ok(())
    }

    /// Reconfigures the surface after it was lost or went out of date.
    pub fn reconfigure(&self) {
        self.ctx.reconfigure();
    }

    /// Records and submits one frame: light motion, cluster clear and
    /// assignment, optional depth passes, shading, present.
    pub fn render(&mut self, time: f32) -> Result<(), RenderError> {
        let frame = self.ctx.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.global
            .update_camera(&self.ctx.queue, &CameraUniforms::from_rig(&self.rig));
        self.light_buffers.write_time(&self.ctx.queue, time);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        if let Err(err) = self.record_frame(&mut encoder, &view) {
            self.frames.abandon();
            return Err(err);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        if self.mode == RenderMode::ForwardPlus {
            self.frames.advance(FramePhase::Submitted)?;
        }
        frame.present();
        Ok(())
    }

    fn record_frame(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let clustered = self.mode == RenderMode::ForwardPlus;

        self.light_buffers
            .record_move(encoder, self.lights.num_lights());

        if clustered {
            self.frames.advance(FramePhase::ClearCounts)?;
            self.clusters.record_clear(encoder);
            self.frames.advance(FramePhase::Assign)?;
            self.clusters.record_assign(encoder);
        }

        if self.depth_prepass != DepthPrepass::Off {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Depth Prepass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            self.programs
                .depth_prepass
                .record(&mut rpass, (&self.global.bind_group, &self.scene));
        }

        let mut linear_depth = None;
        if clustered
            && let (Some(target), Some(resolve_group)) =
                (self.depth.linear_view(), self.depth.resolve_group())
        {
            self.frames.advance(FramePhase::DepthResolve)?;
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Linear Depth Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            self.programs.linear_depth.record(&mut rpass, resolve_group);
            linear_depth = self.depth.read_group();
        }

        if clustered {
            self.frames.advance(FramePhase::Shade)?;
        }
        let depth_load = match self.depth_prepass {
            DepthPrepass::Off => wgpu::LoadOp::Clear(1.0),
            DepthPrepass::Depth | DepthPrepass::LinearDepth => wgpu::LoadOp::Load,
        };
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shading Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.depth,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        match self.mode {
            RenderMode::ForwardPlus => self.programs.forward_plus.record(
                &mut rpass,
                ShadeDrawData {
                    scene_group: &self.global.bind_group,
                    scene: &self.scene,
                    linear_depth,
                },
            ),
            RenderMode::Naive => self
                .programs
                .naive
                .record(&mut rpass, (&self.global.bind_group, &self.scene)),
        }
        Ok(())
    }
}
