use glam::Mat4;
use prism_core::CameraRig;
use wgpu::util::DeviceExt;

use crate::{cluster_pass::ClusterPass, light_buffers::LightBuffers};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub _pad: f32,
}

impl CameraUniforms {
    pub fn from_rig(rig: &CameraRig) -> Self {
        let view = rig.view_matrix();
        let proj = rig.projection_matrix();
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            inv_proj: proj.inverse().to_cols_array_2d(),
            position: rig.position().to_array(),
            _pad: 0.0,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view)
    }
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Group 0 of every render program: camera, light set and the cluster lists.
pub struct GlobalResources {
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    camera_buffer: wgpu::Buffer,
}

impl GlobalResources {
    /// Created ahead of the rest so the clustering pass can bind it too.
    pub fn create_camera_buffer(device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::bytes_of(&CameraUniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                view: Mat4::IDENTITY.to_cols_array_2d(),
                inv_proj: Mat4::IDENTITY.to_cols_array_2d(),
                position: [0.0; 3],
                _pad: 0.0,
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn new(
        device: &wgpu::Device,
        camera_buffer: wgpu::Buffer,
        lights: &LightBuffers,
        clusters: &ClusterPass,
    ) -> Self {
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[
                // --- BINDING 0: Camera ---
                uniform_entry(0, wgpu::ShaderStages::VERTEX | fragment),
                // --- BINDING 1: Light Set ---
                storage_entry(1, fragment, true),
                // --- BINDING 2..4: Cluster params, counts, indices ---
                uniform_entry(2, fragment),
                storage_entry(3, fragment, true),
                storage_entry(4, fragment, true),
            ],
        });

        let bind_group = Self::create_bind_group(device, &layout, &camera_buffer, lights, clusters);
        Self {
            layout,
            bind_group,
            camera_buffer,
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        camera_buffer: &wgpu::Buffer,
        lights: &LightBuffers,
        clusters: &ClusterPass,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.light_set.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: clusters.params_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: clusters.counts_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: clusters.indices_buffer().as_entire_binding(),
                },
            ],
        })
    }

    /// The cluster buffers are replaced on resize, so the group must follow.
    pub fn rebind(&mut self, device: &wgpu::Device, lights: &LightBuffers, clusters: &ClusterPass) {
        self.bind_group = Self::create_bind_group(device, &self.layout, &self.camera_buffer, lights, clusters);
    }

    pub fn camera_buffer(&self) -> &wgpu::Buffer {
        &self.camera_buffer
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, uniforms: &CameraUniforms) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(uniforms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_uniforms_are_208_bytes() {
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 3 * 64 + 16);
    }

    #[test]
    fn view_round_trips() {
        let rig = CameraRig::from_config(&prism_core::CameraConfig::default(), 1920, 1080);
        let uniforms = CameraUniforms::from_rig(&rig);
        assert_eq!(uniforms.view(), rig.view_matrix());
    }
}
