use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

// Model matrix plus the normal matrix, both 4x4 for alignment.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl MeshUniform {
    pub fn from_matrix(model: Mat4) -> Self {
        // Transpose(Inverse(Model)) keeps normals perpendicular under non-uniform scale
        let normal_matrix = model.inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (mem::size_of::<[f32; 3]>() * 2) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Indexed triangle list on the host, counter-clockwise front faces.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centred on the origin, four vertices per face so normals stay flat.
    pub fn cube() -> Self {
        let mut mesh = Self::default();
        for axis in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            mesh.push_face(axis * 0.5, axis, 1.0, 1.0);
        }
        mesh
    }

    /// Upward facing quad of `width` x `depth` on the y = 0 plane.
    pub fn plane(width: f32, depth: f32) -> Self {
        let mut mesh = Self::default();
        mesh.push_face(Vec3::ZERO, Vec3::Y, width, depth);
        mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_face(&mut self, center: Vec3, normal: Vec3, width: f32, height: f32) {
        // any vector not parallel to the normal gives a tangent frame
        let helper = if normal.y.abs() > 0.5 { Vec3::Z } else { Vec3::Y };
        let u = helper.cross(normal).normalize() * (width * 0.5);
        let v = normal.cross(u).normalize() * (height * 0.5);

        let base = self.vertices.len() as u32;
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (su, sv) in corners {
            self.vertices.push(Vertex {
                position: (center + u * su + v * sv).to_array(),
                normal: normal.to_array(),
                uv: [(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5],
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuGeometry {
    pub fn upload(device: &wgpu::Device, data: &MeshData, label: &str) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        }
    }

    pub fn record(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle_normal(mesh: &MeshData, tri: usize) -> Vec3 {
        let p = |i: usize| Vec3::from(mesh.vertices[mesh.indices[tri * 3 + i] as usize].position);
        (p(1) - p(0)).cross(p(2) - p(0)).normalize()
    }

    #[test]
    fn vertex_is_32_bytes() {
        assert_eq!(mem::size_of::<Vertex>(), 32);
        assert_eq!(mem::size_of::<MeshUniform>(), 128);
    }

    #[test]
    fn cube_has_six_flat_faces() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for v in &cube.vertices {
            for c in v.position {
                assert_relative_eq!(c.abs(), 0.5, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn winding_matches_stored_normals() {
        for mesh in [MeshData::cube(), MeshData::plane(30.0, 14.0)] {
            for tri in 0..mesh.triangle_count() {
                let stored = Vec3::from(mesh.vertices[mesh.indices[tri * 3] as usize].normal);
                assert!(triangle_normal(&mesh, tri).dot(stored) > 0.999);
            }
        }
    }

    #[test]
    fn plane_spans_requested_extent() {
        let plane = MeshData::plane(30.0, 14.0);
        let xs: Vec<f32> = plane.vertices.iter().map(|v| v.position[0]).collect();
        let zs: Vec<f32> = plane.vertices.iter().map(|v| v.position[2]).collect();
        assert_relative_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 15.0, epsilon = 1e-5);
        assert_relative_eq!(zs.iter().cloned().fold(f32::MIN, f32::max), 7.0, epsilon = 1e-5);
        assert!(plane.vertices.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn normal_matrix_undoes_scale() {
        let uniform = MeshUniform::from_matrix(Mat4::from_scale(Vec3::new(1.0, 16.0, 1.0)));
        let normal = Mat4::from_cols_array_2d(&uniform.normal_matrix);
        assert_relative_eq!(normal.y_axis.y, 1.0 / 16.0, epsilon = 1e-6);
    }
}
