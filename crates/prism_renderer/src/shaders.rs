use prism_core::EngineConfig;

const COMMON: &str = include_str!("shaders/common.wgsl");
const SCENE_BINDINGS: &str = include_str!("shaders/scene_bindings.wgsl");
const VERTEX: &str = include_str!("shaders/vertex.wgsl");
const NAIVE_FRAG: &str = include_str!("shaders/naive.wgsl");
const FORWARD_PLUS_FRAG: &str = include_str!("shaders/forward_plus.wgsl");
const MOVE_LIGHTS: &str = include_str!("shaders/move_lights.wgsl");
const CLUSTERING: &str = include_str!("shaders/clustering.wgsl");
const LINEAR_DEPTH: &str = include_str!("shaders/linear_depth.wgsl");

pub const BIND_GROUP_SCENE: u32 = 0;
pub const BIND_GROUP_MODEL: u32 = 1;
pub const BIND_GROUP_MATERIAL: u32 = 2;
pub const BIND_GROUP_LINEAR_DEPTH: u32 = 3;

/// Values spliced into shader sources wherever `${name}` appears.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderConstants {
    pub move_lights_workgroup_size: u32,
    pub cluster_workgroup_size: [u32; 3],
    pub light_radius_cutoff: f32,
    pub light_bounds_min: [f32; 3],
    pub light_bounds_max: [f32; 3],
    pub linear_depth_max: f32,
}

impl ShaderConstants {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            move_lights_workgroup_size: config.clusters.move_lights_workgroup_size,
            cluster_workgroup_size: config.clusters.workgroup_size,
            light_radius_cutoff: config.lights.falloff_cutoff,
            light_bounds_min: config.lights.bounds_min,
            light_bounds_max: config.lights.bounds_max,
            linear_depth_max: config.renderer.linear_depth_max,
        }
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        let [wx, wy, wz] = self.cluster_workgroup_size;
        vec![
            ("bindGroup_scene", BIND_GROUP_SCENE.to_string()),
            ("bindGroup_model", BIND_GROUP_MODEL.to_string()),
            ("bindGroup_material", BIND_GROUP_MATERIAL.to_string()),
            ("bindGroup_linearDepth", BIND_GROUP_LINEAR_DEPTH.to_string()),
            ("moveLightsWorkgroupSize", self.move_lights_workgroup_size.to_string()),
            ("clusterWorkgroupSizeX", wx.to_string()),
            ("clusterWorkgroupSizeY", wy.to_string()),
            ("clusterWorkgroupSizeZ", wz.to_string()),
            ("lightRadiusCutoff", float(self.light_radius_cutoff)),
            ("lightBoundsMin", vec3(self.light_bounds_min)),
            ("lightBoundsMax", vec3(self.light_bounds_max)),
            ("linearDepthMax", float(self.linear_depth_max)),
        ]
    }

    pub fn process(&self, source: &str) -> String {
        let mut out = source.to_string();
        for (name, value) in self.pairs() {
            out = out.replace(&format!("${{{name}}}"), &value);
        }
        out
    }
}

// `{:?}` keeps the decimal point, so WGSL reads the literal as f32
fn float(value: f32) -> String {
    format!("{value:?}")
}

fn vec3(v: [f32; 3]) -> String {
    format!("vec3f({}, {}, {})", float(v[0]), float(v[1]), float(v[2]))
}

/// Assembled WGSL for every program.
pub struct ShaderSources {
    pub naive: String,
    pub forward_plus: String,
    pub depth_prepass: String,
    pub move_lights: String,
    pub clustering: String,
    pub linear_depth: String,
}

impl ShaderSources {
    pub fn new(constants: &ShaderConstants) -> Self {
        let build = |parts: &[&str]| constants.process(&parts.concat());
        Self {
            naive: build(&[COMMON, SCENE_BINDINGS, VERTEX, NAIVE_FRAG]),
            forward_plus: build(&[COMMON, SCENE_BINDINGS, VERTEX, FORWARD_PLUS_FRAG]),
            depth_prepass: build(&[COMMON, SCENE_BINDINGS, VERTEX]),
            move_lights: build(&[COMMON, MOVE_LIGHTS]),
            clustering: build(&[COMMON, CLUSTERING]),
            linear_depth: build(&[COMMON, LINEAR_DEPTH]),
        }
    }

    #[cfg(test)]
    fn all(&self) -> [(&'static str, &str); 6] {
        [
            ("naive", self.naive.as_str()),
            ("forward_plus", self.forward_plus.as_str()),
            ("depth_prepass", self.depth_prepass.as_str()),
            ("move_lights", self.move_lights.as_str()),
            ("clustering", self.clustering.as_str()),
            ("linear_depth", self.linear_depth.as_str()),
        ]
    }
}

pub fn create_module(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.to_owned().into()),
    })
}
