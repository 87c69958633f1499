use prism_cluster::ClusterGrid;
use wgpu::util::DeviceExt;

use crate::{
    context::GpuContext,
    error::{RenderError, scoped},
    global_resources::{storage_entry, uniform_entry},
    shaders::create_module,
};

struct GpuClusterBuffers {
    params: wgpu::Buffer,
    counts: wgpu::Buffer,
    indices: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Grid sized cluster buffers and the compute pass that fills them.
pub struct ClusterPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    buffers: GpuClusterBuffers,
    grid: ClusterGrid,
    workgroup_size: [u32; 3],
}

impl ClusterPass {
    pub fn new(
        ctx: &GpuContext,
        grid: ClusterGrid,
        camera_buffer: &wgpu::Buffer,
        light_set: &wgpu::Buffer,
        clustering_source: &str,
        workgroup_size: [u32; 3],
    ) -> Result<Self, RenderError> {
        let device = &ctx.device;
        let compute = wgpu::ShaderStages::COMPUTE;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Clustering Bind Group Layout"),
            entries: &[
                storage_entry(0, compute, true),
                uniform_entry(1, compute),
                uniform_entry(2, compute),
                storage_entry(3, compute, false),
                storage_entry(4, compute, false),
            ],
        });

        let shader = create_module(device, "Clustering Shader", clustering_source);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Clustering Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Clustering Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let buffers = Self::create_buffers(ctx, &layout, &grid, camera_buffer, light_set)?;
        Ok(Self {
            pipeline,
            layout,
            buffers,
            grid,
            workgroup_size,
        })
    }

    fn create_buffers(
        ctx: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        grid: &ClusterGrid,
        camera_buffer: &wgpu::Buffer,
        light_set: &wgpu::Buffer,
    ) -> Result<GpuClusterBuffers, RenderError> {
        ctx.check_storage_size("cluster light counts", grid.count_buffer_size())?;
        ctx.check_storage_size("cluster light indices", grid.index_buffer_size())?;

        let device = &ctx.device;
        scoped(device, "allocating cluster buffers", || {
            let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Cluster Params Buffer"),
                contents: bytemuck::bytes_of(&grid.params()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let counts = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cluster Light Count Buffer"),
                size: grid.count_buffer_size(),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let indices = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Cluster Light Index Buffer"),
                size: grid.index_buffer_size(),
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Clustering Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: light_set.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: camera_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: counts.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: indices.as_entire_binding(),
                    },
                ],
            });

            GpuClusterBuffers {
                params,
                counts,
                indices,
                bind_group,
            }
        })
    }

    /// Swaps in buffers sized for `grid`. Must not overlap a frame in flight;
    /// the caller waits for the device first.
    pub fn rebuild(
        &mut self,
        ctx: &GpuContext,
        grid: ClusterGrid,
        camera_buffer: &wgpu::Buffer,
        light_set: &wgpu::Buffer,
    ) -> Result<(), RenderError> {
        self.buffers = Self::create_buffers(ctx, &self.layout, &grid, camera_buffer, light_set)?;
        self.grid = grid;
        log::info!(
            "Cluster buffers rebuilt: {}x{}x{} clusters, {} KiB of light indices",
            grid.tile_count_x(),
            grid.tile_count_y(),
            grid.slice_count(),
            grid.index_buffer_size() / 1024
        );
        Ok(())
    }

    pub fn grid(&self) -> &ClusterGrid {
        &self.grid
    }

    pub fn params_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.params
    }

    pub fn counts_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.counts
    }

    pub fn indices_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.indices
    }

    /// Zeroes the counts of the previous frame.
    pub fn record_clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.buffers.counts, 0, None);
    }

    pub fn record_assign(&self, encoder: &mut wgpu::CommandEncoder) {
        let [x, y, z] = self.grid.dispatch_size(self.workgroup_size);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Clustering Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.buffers.bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
    }
}
