use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::{
    mesh::{GpuGeometry, MeshData, MeshUniform},
    shaders::{BIND_GROUP_MATERIAL, BIND_GROUP_MODEL},
};

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub transform: Mat4,
    pub mesh: usize,
    pub material: usize,
}

/// Callbacks of a scene traversal. `on_material` only fires when the
/// material differs from the previous node's.
pub trait SceneVisitor {
    fn on_node(&mut self, index: usize, node: &SceneNode);
    fn on_material(&mut self, material: usize);
    fn on_primitive(&mut self, mesh: usize);
}

/// Host side scene: meshes, flat base colors and the node list.
#[derive(Clone, Debug, Default)]
pub struct SceneDescription {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<[f32; 4]>,
    pub nodes: Vec<SceneNode>,
}

const FLOOR: usize = 0;
const CUBE: usize = 1;

impl SceneDescription {
    /// A floor with two rows of tall pillars, sized to the default light bounds.
    pub fn procedural() -> Self {
        let mut nodes = vec![SceneNode {
            transform: Mat4::IDENTITY,
            mesh: FLOOR,
            material: 0,
        }];
        for (row, z) in [-4.0f32, 4.0].into_iter().enumerate() {
            for x in [-10.0f32, -5.0, 0.0, 5.0, 10.0] {
                nodes.push(SceneNode {
                    transform: Mat4::from_scale_rotation_translation(
                        Vec3::new(1.0, 16.0, 1.0),
                        glam::Quat::IDENTITY,
                        Vec3::new(x, 8.0, z),
                    ),
                    mesh: CUBE,
                    material: 1 + row,
                });
            }
        }

        let mut scene = Self {
            meshes: vec![MeshData::plane(30.0, 14.0), MeshData::cube()],
            materials: vec![
                [0.8, 0.8, 0.8, 1.0],
                [0.9, 0.85, 0.7, 1.0],
                [0.7, 0.8, 0.9, 1.0],
            ],
            nodes,
        };
        scene.sort_by_material();
        scene
    }

    /// Groups nodes so each material is bound once per pass.
    pub fn sort_by_material(&mut self) {
        self.nodes.sort_by_key(|node| node.material);
    }

    pub fn iterate(&self, visitor: &mut impl SceneVisitor) {
        let mut bound = None;
        for (index, node) in self.nodes.iter().enumerate() {
            visitor.on_node(index, node);
            if bound != Some(node.material) {
                visitor.on_material(node.material);
                bound = Some(node.material);
            }
            visitor.on_primitive(node.mesh);
        }
    }
}

/// GPU copy of a [`SceneDescription`]: one model group per node, one
/// material group per material and the uploaded geometry.
pub struct Scene {
    description: SceneDescription,
    geometry: Vec<GpuGeometry>,
    material_groups: Vec<wgpu::BindGroup>,
    model_groups: Vec<wgpu::BindGroup>,
}

impl Scene {
    pub fn new(
        device: &wgpu::Device,
        description: SceneDescription,
        model_layout: &wgpu::BindGroupLayout,
        material_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let geometry = description
            .meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| GpuGeometry::upload(device, mesh, &format!("Mesh {i}")))
            .collect();

        let material_groups = description
            .materials
            .iter()
            .map(|color| uniform_group(device, material_layout, "Material", bytemuck::bytes_of(color)))
            .collect();

        let model_groups = description
            .nodes
            .iter()
            .map(|node| {
                let uniform = MeshUniform::from_matrix(node.transform);
                uniform_group(device, model_layout, "Model", bytemuck::bytes_of(&uniform))
            })
            .collect();

        log::info!(
            "Scene uploaded: {} nodes, {} meshes, {} materials",
            description.nodes.len(),
            description.meshes.len(),
            description.materials.len()
        );

        Self {
            description,
            geometry,
            material_groups,
            model_groups,
        }
    }

    pub fn description(&self) -> &SceneDescription {
        &self.description
    }

    pub fn iterate(&self, visitor: &mut impl SceneVisitor) {
        self.description.iterate(visitor);
    }

    /// Draws every node with whatever pipeline is set on `rpass`.
    pub fn record(&self, rpass: &mut wgpu::RenderPass<'_>) {
        let mut recorder = PassRecorder { scene: self, rpass };
        self.iterate(&mut recorder);
    }
}

fn uniform_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    label: &str,
    contents: &[u8],
) -> wgpu::BindGroup {
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label} Uniform Buffer")),
        contents,
        usage: wgpu::BufferUsages::UNIFORM,
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label} Bind Group")),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

struct PassRecorder<'s, 'p, 'e> {
    scene: &'s Scene,
    rpass: &'p mut wgpu::RenderPass<'e>,
}

impl SceneVisitor for PassRecorder<'_, '_, '_> {
    fn on_node(&mut self, index: usize, _node: &SceneNode) {
        self.rpass
            .set_bind_group(BIND_GROUP_MODEL, &self.scene.model_groups[index], &[]);
    }

    fn on_material(&mut self, material: usize) {
        self.rpass
            .set_bind_group(BIND_GROUP_MATERIAL, &self.scene.material_groups[material], &[]);
    }

    fn on_primitive(&mut self, mesh: usize) {
        self.scene.geometry[mesh].record(self.rpass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Event {
        Node(usize),
        Material(usize),
        Primitive(usize),
    }

    #[derive(Default)]
    struct Log(Vec<Event>);

    impl SceneVisitor for Log {
        fn on_node(&mut self, index: usize, _node: &SceneNode) {
            self.0.push(Event::Node(index));
        }
        fn on_material(&mut self, material: usize) {
            self.0.push(Event::Material(material));
        }
        fn on_primitive(&mut self, mesh: usize) {
            self.0.push(Event::Primitive(mesh));
        }
    }

    #[test]
    fn procedural_scene_binds_each_material_once() {
        let scene = SceneDescription::procedural();
        let mut log = Log::default();
        scene.iterate(&mut log);

        let count = |f: fn(&Event) -> bool| log.0.iter().filter(|e| f(e)).count();
        assert_eq!(count(|e| matches!(e, Event::Node(_))), 11);
        assert_eq!(count(|e| matches!(e, Event::Primitive(_))), 11);
        assert_eq!(count(|e| matches!(e, Event::Material(_))), 3);
    }

    #[test]
    fn material_change_sits_between_node_and_primitive() {
        let scene = SceneDescription {
            meshes: vec![MeshData::cube()],
            materials: vec![[1.0; 4], [0.5; 4]],
            nodes: vec![
                SceneNode { transform: Mat4::IDENTITY, mesh: 0, material: 0 },
                SceneNode { transform: Mat4::IDENTITY, mesh: 0, material: 0 },
                SceneNode { transform: Mat4::IDENTITY, mesh: 0, material: 1 },
            ],
        };
        let mut log = Log::default();
        scene.iterate(&mut log);
        assert_eq!(
            log.0,
            vec![
                Event::Node(0),
                Event::Material(0),
                Event::Primitive(0),
                Event::Node(1),
                Event::Primitive(0),
                Event::Node(2),
                Event::Material(1),
                Event::Primitive(0),
            ]
        );
    }

    #[test]
    fn pillars_stand_on_the_floor() {
        let scene = SceneDescription::procedural();
        for node in scene.nodes.iter().filter(|n| n.mesh == CUBE) {
            let bottom = node.transform.transform_point3(Vec3::new(0.0, -0.5, 0.0));
            assert!(bottom.y.abs() < 1e-5);
        }
    }
}
