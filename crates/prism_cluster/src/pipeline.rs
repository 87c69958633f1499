use glam::Mat4;
use prism_core::{Camera, EngineConfig};
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    assign::{AssignError, AssignStats, ClusterAssigner, ClusterBuffers, DispatchOrder},
    depth::{DepthConvention, DepthResolve, LinearDepthEncoding},
    frame::{FrameError, FramePhase, FrameSequencer},
    grid::{ClusterGrid, GridError, GridLayout, Projection, Viewport},
    light::{LightError, LightStore},
    shading::{ClusterShader, Fragment, Lambert, ShadedFragment},
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Light(#[from] LightError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Assign(#[from] AssignError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("depth image has {depth} texels for {fragments} fragments")]
    DepthMismatch { fragments: usize, depth: usize },
}

/// Per frame inputs handed in by the caller.
pub struct FrameInput<'a> {
    pub time: f32,
    pub view: Mat4,
    pub fragments: &'a [Fragment],
    /// Raw depth buffer values, one per fragment. When present the shading
    /// pass takes view depth from the resolved linear depth instead of the
    /// fragment.
    pub depth: Option<&'a [f32]>,
}

#[derive(Debug, Default)]
pub struct FrameOutput {
    pub stats: AssignStats,
    pub shaded: Vec<ShadedFragment>,
}

/// Host side clustered pipeline. Owns the lights, the grid and the grid
/// sized buffers; the camera view comes in with every frame.
pub struct ClusterPipeline {
    lights: LightStore,
    layout: GridLayout,
    projection: Projection,
    grid: ClusterGrid,
    buffers: ClusterBuffers,
    assigner: ClusterAssigner,
    frames: FrameSequencer,
    linear_depth: LinearDepthEncoding,
}

impl ClusterPipeline {
    pub fn new(config: &EngineConfig, viewport: Viewport) -> Result<Self, PipelineError> {
        let lights = LightStore::new(&config.lights)?;
        let layout = GridLayout::from(&config.clusters);
        let camera = Camera::from_config(&config.camera, viewport.aspect());
        let projection = Projection::from(&camera);
        let grid = ClusterGrid::build(viewport, layout, projection)?;
        let buffers = ClusterBuffers::new(&grid);

        log::info!(
            "Cluster grid {}x{}x{} ({} clusters) for {}x{}",
            grid.tile_count_x(),
            grid.tile_count_y(),
            grid.slice_count(),
            grid.cluster_count(),
            viewport.width,
            viewport.height
        );

        Ok(Self {
            lights,
            layout,
            projection,
            grid,
            buffers,
            assigner: ClusterAssigner::new(config.clusters.workgroup_size),
            frames: FrameSequencer::new(),
            linear_depth: LinearDepthEncoding {
                max: config.renderer.linear_depth_max,
            },
        })
    }

    pub fn with_order(mut self, order: DispatchOrder) -> Self {
        self.assigner = self.assigner.with_order(order);
        self
    }

    pub fn lights(&self) -> &LightStore {
        &self.lights
    }

    pub fn grid(&self) -> &ClusterGrid {
        &self.grid
    }

    pub fn buffers(&self) -> &ClusterBuffers {
        &self.buffers
    }

    pub fn frames(&self) -> &FrameSequencer {
        &self.frames
    }

    pub fn set_num_lights(&mut self, n: u32) -> Result<(), PipelineError> {
        self.lights.set_active_count(n)?;
        Ok(())
    }

    /// Rebuilds the grid and every grid sized buffer for a new viewport.
    /// A half recorded frame is discarded first.
    pub fn resize(&mut self, viewport: Viewport) -> Result<(), PipelineError> {
        if viewport == self.grid.viewport() {
            return Ok(());
        }
        if !self.frames.is_between_frames() {
            self.frames.abandon();
        }
        let grid = ClusterGrid::build(viewport, self.layout, self.projection)?;
        self.buffers = ClusterBuffers::new(&grid);
        self.grid = grid;
        log::info!(
            "Resized cluster grid to {}x{}x{} for {}x{}",
            grid.tile_count_x(),
            grid.tile_count_y(),
            grid.slice_count(),
            viewport.width,
            viewport.height
        );
        Ok(())
    }

    pub fn run_frame(&mut self, input: FrameInput<'_>) -> Result<FrameOutput, PipelineError> {
        let result = self.record_frame(input);
        if result.is_err() {
            self.frames.abandon();
        }
        result
    }

    fn record_frame(&mut self, input: FrameInput<'_>) -> Result<FrameOutput, PipelineError> {
        self.lights.simulate(input.time);

        self.frames.advance(FramePhase::ClearCounts)?;
        self.buffers.clear_counts();

        self.frames.advance(FramePhase::Assign)?;
        let stats = self
            .assigner
            .assign(self.lights.view(), input.view, &self.grid, &self.buffers)?;

        let resolved;
        let fragments = match input.depth {
            Some(depth) => {
                if depth.len() != input.fragments.len() {
                    return Err(PipelineError::DepthMismatch {
                        fragments: input.fragments.len(),
                        depth: depth.len(),
                    });
                }
                self.frames.advance(FramePhase::DepthResolve)?;
                resolved = self.resolve_depth(input.fragments, depth);
                &resolved[..]
            }
            None => input.fragments,
        };

        self.frames.advance(FramePhase::Shade)?;
        let shader = ClusterShader::new(&self.grid, &self.buffers, self.lights.view(), Lambert);
        let shaded = fragments.par_iter().map(|f| shader.shade(f)).collect();

        self.frames.advance(FramePhase::Submitted)?;
        log::debug!(
            "Frame {}: {} assignments, {} dropped, max occupancy {}",
            self.frames.frames_submitted(),
            stats.assignments,
            stats.dropped,
            stats.max_cluster_occupancy
        );
        Ok(FrameOutput { stats, shaded })
    }

    fn resolve_depth(&self, fragments: &[Fragment], depth: &[f32]) -> Vec<Fragment> {
        let resolve = DepthResolve {
            near: self.projection.near,
            far: self.projection.far,
            convention: DepthConvention::ZeroToOne,
            encoding: self.linear_depth,
        };
        let mut linear = vec![0.0; depth.len()];
        resolve.resolve(depth, &mut linear);
        fragments
            .iter()
            .zip(linear)
            .map(|(fragment, stored)| Fragment {
                view_depth: self.linear_depth.decode(stored),
                ..*fragment
            })
            .collect()
    }
}
