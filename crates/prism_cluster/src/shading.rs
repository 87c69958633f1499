use glam::{Vec2, Vec3};

use crate::{
    assign::ClusterBuffers,
    grid::ClusterGrid,
    light::{GpuLight, LightView},
};

/// What the shading pass knows about one fragment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fragment {
    /// Framebuffer position, origin top-left.
    pub frag_coord: Vec2,
    /// Distance in front of the camera.
    pub view_depth: f32,
    pub position: Vec3,
    pub normal: Vec3,
}

/// Windowed inverse-square falloff. Exactly zero at and beyond `radius`.
pub fn range_attenuation(distance: f32, radius: f32) -> f32 {
    let window = (1.0 - (distance / radius).powi(4)).clamp(0.0, 1.0);
    window / (distance * distance).max(1e-4)
}

pub trait LightingModel {
    fn contribution(&self, fragment: &Fragment, light: &GpuLight, radius: f32) -> Vec3;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Lambert;

impl LightingModel for Lambert {
    fn contribution(&self, fragment: &Fragment, light: &GpuLight, radius: f32) -> Vec3 {
        let to_light = light.position() - fragment.position;
        let distance = to_light.length();
        // a light sitting on the surface has no direction
        if distance <= 1e-6 {
            return Vec3::ZERO;
        }
        let attenuation = range_attenuation(distance, radius);
        if attenuation <= 0.0 {
            return Vec3::ZERO;
        }
        let lambert = fragment.normal.dot(to_light / distance).max(0.0);
        light.color() * lambert * attenuation
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ShadedFragment {
    pub color: Vec3,
    /// Lights the fragment looked at.
    pub lights_visited: u32,
}

/// Shades fragments from the light list of their cluster.
pub struct ClusterShader<'a, M> {
    grid: &'a ClusterGrid,
    buffers: &'a ClusterBuffers,
    lights: LightView<'a>,
    model: M,
}

impl<'a, M: LightingModel> ClusterShader<'a, M> {
    pub fn new(grid: &'a ClusterGrid, buffers: &'a ClusterBuffers, lights: LightView<'a>, model: M) -> Self {
        Self {
            grid,
            buffers,
            lights,
            model,
        }
    }

    pub fn cluster_of(&self, fragment: &Fragment) -> usize {
        let coord = self.grid.cluster_of_fragment(fragment.frag_coord, fragment.view_depth);
        self.grid.cluster_index(coord)
    }

    pub fn shade(&self, fragment: &Fragment) -> ShadedFragment {
        let cluster = self.cluster_of(fragment);
        let mut shaded = ShadedFragment::default();
        for index in self.buffers.lights(cluster) {
            let index = index as usize;
            let light = &self.lights.lights[index];
            shaded.color += self
                .model
                .contribution(fragment, light, self.lights.radius(index));
            shaded.lights_visited += 1;
        }
        shaded
    }
}

/// Reference shading: every active light, no clusters.
pub fn shade_naive<M: LightingModel>(fragment: &Fragment, lights: LightView<'_>, model: &M) -> ShadedFragment {
    let color = lights
        .lights
        .iter()
        .enumerate()
        .map(|(index, light)| model.contribution(fragment, light, lights.radius(index)))
        .sum();
    ShadedFragment {
        color,
        lights_visited: lights.len() as u32,
    }
}
