use prism_cluster::LightStore;
use wgpu::util::DeviceExt;

use crate::{
    global_resources::{storage_entry, uniform_entry},
    shaders::create_module,
};

/// The light set storage buffer plus the compute pass that moves the lights.
pub struct LightBuffers {
    pub light_set: wgpu::Buffer,
    time_buffer: wgpu::Buffer,
    move_pipeline: wgpu::ComputePipeline,
    move_bind_group: wgpu::BindGroup,
    workgroup_size: u32,
}

impl LightBuffers {
    pub fn new(device: &wgpu::Device, store: &LightStore, move_lights_source: &str, workgroup_size: u32) -> Self {
        // header + every slot, colors included; positions get rewritten on the GPU every frame
        let light_set = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Set Buffer"),
            contents: &store.to_bytes(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let time_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Time Uniform Buffer"),
            contents: bytemuck::bytes_of(&[0.0f32; 4]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Move Lights Bind Group Layout"),
            entries: &[
                storage_entry(0, wgpu::ShaderStages::COMPUTE, false),
                uniform_entry(1, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let move_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Move Lights Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: light_set.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: time_buffer.as_entire_binding(),
                },
            ],
        });

        let shader = create_module(device, "Move Lights Shader", move_lights_source);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Move Lights Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let move_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Move Lights Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            light_set,
            time_buffer,
            move_pipeline,
            move_bind_group,
            workgroup_size,
        }
    }

    /// Rewrites the header so every pass sees the new active prefix.
    pub fn write_num_lights(&self, queue: &wgpu::Queue, store: &LightStore) {
        queue.write_buffer(&self.light_set, 0, bytemuck::bytes_of(&store.header()));
    }

    pub fn write_time(&self, queue: &wgpu::Queue, time: f32) {
        queue.write_buffer(&self.time_buffer, 0, bytemuck::bytes_of(&[time, 0.0, 0.0, 0.0]));
    }

    pub fn record_move(&self, encoder: &mut wgpu::CommandEncoder, num_lights: u32) {
        if num_lights == 0 {
            return;
        }
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Move Lights Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.move_pipeline);
        pass.set_bind_group(0, &self.move_bind_group, &[]);
        pass.dispatch_workgroups(move_lights_groups(num_lights, self.workgroup_size), 1, 1);
    }
}

pub fn move_lights_groups(num_lights: u32, workgroup_size: u32) -> u32 {
    num_lights.div_ceil(workgroup_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_worker_per_light() {
        assert_eq!(move_lights_groups(100, 128), 1);
        assert_eq!(move_lights_groups(128, 128), 1);
        assert_eq!(move_lights_groups(129, 128), 2);
        assert_eq!(move_lights_groups(5000, 128), 40);
    }
}
