use bytemuck::{Pod, Zeroable};
use glam::Vec3;
pub use prism_core::MAX_NUM_LIGHTS;
use prism_core::LightConfig;
use rayon::prelude::*;
use thiserror::Error;

/// vec3f is aligned at 16 byte boundaries
pub const NUM_FLOATS_PER_LIGHT: usize = 8;
pub const LIGHT_SET_HEADER_SIZE: usize = 16;

const GOLDEN_RATIO_CONJUGATE: f32 = 0.618_034;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LightError {
    #[error("active light count {requested} is out of range (max {max})")]
    OutOfRange { requested: u32, max: u32 },
}

/// One light as it sits in the light set buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 3],
    pub _pad0: f32,
    pub color: [f32; 3],
    pub _pad1: f32,
}

impl GpuLight {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position: position.to_array(),
            _pad0: 0.0,
            color: color.to_array(),
            _pad1: 0.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_array(self.color)
    }
}

/// First 16 bytes of the light set buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightSetHeader {
    pub num_lights: u32,
    pub _pad: [u32; 3],
}

/// Turns a light color into the distance at which it stops mattering.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightFalloff {
    pub cutoff: f32,
}

impl LightFalloff {
    /// Distance where the brightest channel of `color` drops to `cutoff`
    /// under inverse-square falloff.
    pub fn influence_radius(&self, color: Vec3) -> f32 {
        (color.max_element().max(0.0) / self.cutoff).sqrt()
    }
}

/// Axis-aligned box the simulated lights wander in.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LightBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl LightBounds {
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// h in [0, 1]
pub fn hue_to_rgb(h: f32) -> Vec3 {
    let f = |n: f32| {
        let k = (n + h * 6.0) % 6.0;
        1.0 - k.min(4.0 - k).min(1.0).max(0.0)
    };
    Vec3::ONE.lerp(Vec3::new(f(5.0), f(3.0), f(1.0)), 0.8)
}

/// lowbias32 integer hash, mirrored by the move-lights shader.
pub fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Uniform float in [0, 1) from 24 hash bits.
pub fn unit_hash(x: u32) -> f32 {
    (hash_u32(x) >> 8) as f32 / 16_777_216.0
}

/// Where light `index` is at `time` seconds.
///
/// Every axis oscillates independently between the bounds with a per-light
/// phase and rate, so the motion is periodic, bounded and depends on nothing
/// but the light index.
pub fn light_position(index: u32, time: f32, bounds: &LightBounds) -> Vec3 {
    let mut t = [0.0f32; 3];
    for (axis, value) in t.iter_mut().enumerate() {
        let seed = index.wrapping_mul(3).wrapping_add(axis as u32);
        let phase = unit_hash(seed) * std::f32::consts::TAU;
        let rate = 0.25 + 0.75 * unit_hash(seed ^ 0x9e37_79b9);
        *value = 0.5 + 0.5 * (time * rate + phase).sin();
    }
    bounds.min + (bounds.max - bounds.min) * Vec3::from_array(t)
}

/// Owns every light. Only the first `num_lights` take part in simulation
/// and clustering, the rest keep their colors for when the count grows.
pub struct LightStore {
    lights: Vec<GpuLight>,
    num_lights: u32,
    bounds: LightBounds,
    falloff: LightFalloff,
}

impl LightStore {
    pub fn new(config: &LightConfig) -> Result<Self, LightError> {
        let max = config.max_count;
        if max > MAX_NUM_LIGHTS {
            return Err(LightError::OutOfRange {
                requested: max,
                max: MAX_NUM_LIGHTS,
            });
        }
        if config.initial_count > max {
            return Err(LightError::OutOfRange {
                requested: config.initial_count,
                max,
            });
        }

        let bounds = LightBounds {
            min: Vec3::from_array(config.bounds_min),
            max: Vec3::from_array(config.bounds_max),
        };

        // light pos is set by the simulation so no need to set it here
        let lights = (0..max)
            .map(|index| {
                let hue = (index as f32 * GOLDEN_RATIO_CONJUGATE).fract();
                GpuLight::new(bounds.min, hue_to_rgb(hue) * config.intensity)
            })
            .collect();

        let mut store = Self {
            lights,
            num_lights: config.initial_count,
            bounds,
            falloff: LightFalloff {
                cutoff: config.falloff_cutoff,
            },
        };
        store.simulate(0.0);

        log::info!(
            "Light store ready: {} of {} lights active",
            store.num_lights,
            max
        );
        Ok(store)
    }

    pub fn num_lights(&self) -> u32 {
        self.num_lights
    }

    pub fn max_num_lights(&self) -> u32 {
        self.lights.len() as u32
    }

    pub fn bounds(&self) -> &LightBounds {
        &self.bounds
    }

    pub fn falloff(&self) -> LightFalloff {
        self.falloff
    }

    pub fn set_active_count(&mut self, n: u32) -> Result<(), LightError> {
        let max = self.max_num_lights();
        if n > max {
            return Err(LightError::OutOfRange { requested: n, max });
        }
        if n != self.num_lights {
            log::info!("Active lights: {} -> {}", self.num_lights, n);
        }
        self.num_lights = n;
        Ok(())
    }

    /// Moves every active light to its position at `time`.
    /// Lights are independent, so workers split the prefix freely.
    pub fn simulate(&mut self, time: f32) {
        let bounds = self.bounds;
        let active = self.num_lights as usize;
        self.lights[..active]
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, light)| {
                light.position = light_position(index as u32, time, &bounds).to_array();
            });
    }

    pub fn active(&self) -> &[GpuLight] {
        &self.lights[..self.num_lights as usize]
    }

    pub fn all(&self) -> &[GpuLight] {
        &self.lights
    }

    pub fn view(&self) -> LightView<'_> {
        LightView {
            lights: self.active(),
            falloff: self.falloff,
        }
    }

    pub fn header(&self) -> LightSetHeader {
        LightSetHeader {
            num_lights: self.num_lights,
            _pad: [0; 3],
        }
    }

    /// Byte image of the whole light set buffer: header then every slot.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::buffer_size(self.max_num_lights()));
        bytes.extend_from_slice(bytemuck::bytes_of(&self.header()));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.lights));
        bytes
    }

    pub fn buffer_size(max_num_lights: u32) -> usize {
        LIGHT_SET_HEADER_SIZE + max_num_lights as usize * std::mem::size_of::<GpuLight>()
    }
}

/// Read-only access to the active lights, handed to assignment and shading.
#[derive(Copy, Clone)]
pub struct LightView<'a> {
    pub lights: &'a [GpuLight],
    pub falloff: LightFalloff,
}

impl<'a> LightView<'a> {
    pub fn new(lights: &'a [GpuLight], falloff: LightFalloff) -> Self {
        Self { lights, falloff }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn radius(&self, index: usize) -> f32 {
        self.falloff.influence_radius(self.lights[index].color())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(initial: u32, max: u32) -> LightConfig {
        LightConfig {
            initial_count: initial,
            max_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn record_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 32);
        assert_eq!(std::mem::size_of::<GpuLight>(), NUM_FLOATS_PER_LIGHT * 4);
        assert_eq!(std::mem::size_of::<LightSetHeader>(), LIGHT_SET_HEADER_SIZE);

        let light = GpuLight::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0));
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&light));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn buffer_image_has_header_and_every_slot() {
        let store = LightStore::new(&config(7, 20)).unwrap();
        let bytes = store.to_bytes();
        assert_eq!(bytes.len(), 16 + 20 * 32);
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 7);
        assert!(bytes[4..16].iter().all(|b| *b == 0));
    }

    #[test]
    fn capacity_is_capped_at_light_limit() {
        let err = LightStore::new(&config(10, 6000)).err();
        assert_eq!(
            err,
            Some(LightError::OutOfRange {
                requested: 6000,
                max: MAX_NUM_LIGHTS
            })
        );

        let mut store = LightStore::new(&config(10, MAX_NUM_LIGHTS)).unwrap();
        assert!(store.set_active_count(MAX_NUM_LIGHTS).is_ok());
        assert!(store.set_active_count(MAX_NUM_LIGHTS + 1).is_err());
    }

    #[test]
    fn set_active_count_rejects_values_above_capacity() {
        let mut store = LightStore::new(&config(10, 50)).unwrap();
        assert_eq!(
            store.set_active_count(51),
            Err(LightError::OutOfRange {
                requested: 51,
                max: 50
            })
        );
        assert_eq!(store.num_lights(), 10);

        store.set_active_count(50).unwrap();
        assert_eq!(store.active().len(), 50);
        store.set_active_count(0).unwrap();
        assert!(store.view().is_empty());
    }

    #[test]
    fn initial_count_above_capacity_fails() {
        assert!(LightStore::new(&config(6, 5)).is_err());
    }

    #[test]
    fn simulation_stays_in_bounds_and_is_deterministic() {
        let mut a = LightStore::new(&config(500, 500)).unwrap();
        let mut b = LightStore::new(&config(500, 500)).unwrap();
        for step in 0..20 {
            let time = step as f32 * 0.37;
            a.simulate(time);
            b.simulate(time);
            assert_eq!(a.active(), b.active());
            for light in a.active() {
                assert!(a.bounds().contains(light.position()));
            }
        }
    }

    #[test]
    fn simulation_leaves_colors_and_inactive_lights_alone() {
        let mut store = LightStore::new(&config(3, 8)).unwrap();
        let before = store.all().to_vec();
        store.simulate(12.5);
        for (index, (old, new)) in before.iter().zip(store.all()).enumerate() {
            assert_eq!(old.color, new.color);
            if index >= 3 {
                assert_eq!(old.position, new.position);
            }
        }
        assert_ne!(before[0].position, store.all()[0].position);
    }

    #[test]
    fn default_intensity_gives_radius_two() {
        let store = LightStore::new(&LightConfig::default()).unwrap();
        let view = store.view();
        for index in 0..view.len() {
            assert_relative_eq!(view.radius(index), 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn hue_endpoints_are_red() {
        let red = hue_to_rgb(0.0);
        assert_relative_eq!(red.x, 1.0);
        assert_relative_eq!(red.y, 0.2, epsilon = 1e-6);
        assert_relative_eq!(red.z, 0.2, epsilon = 1e-6);
        let wrapped = hue_to_rgb(1.0);
        assert_relative_eq!(wrapped.x, red.x, epsilon = 1e-6);
    }
}
