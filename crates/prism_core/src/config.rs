use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on simulated lights, shared by the host store and the GPU light buffer.
pub const MAX_NUM_LIGHTS: u32 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Top level settings for the whole engine.
/// Every section falls back to its defaults, so an empty `{}` file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub lights: LightConfig,
    pub clusters: ClusterConfig,
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Prism Forward+".to_string(),
            width: 1920,
            height: 1080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// World units per second for the fly camera.
    pub move_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
            position: [-12.0, 6.0, 0.0],
            target: [0.0, 4.0, 0.0],
            move_speed: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub initial_count: u32,
    pub max_count: u32,
    /// Scales every generated color.
    pub intensity: f32,
    /// Irradiance below which a light is treated as having no effect.
    pub falloff_cutoff: f32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    /// Lights added or removed per key press.
    pub count_step: u32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            initial_count: 100,
            max_count: MAX_NUM_LIGHTS,
            intensity: 0.1,
            falloff_cutoff: 0.025,
            bounds_min: [-14.0, 0.0, -6.0],
            bounds_max: [14.0, 20.0, 6.0],
            count_step: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub tile_width: u32,
    pub tile_height: u32,
    pub slice_count: u32,
    pub max_lights_per_cluster: u32,
    /// Worker group shape of the clustering dispatch.
    pub workgroup_size: [u32; 3],
    /// Worker group width of the light simulation dispatch.
    pub move_lights_workgroup_size: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tile_width: 128,
            tile_height: 128,
            slice_count: 256,
            max_lights_per_cluster: 500,
            workgroup_size: [4, 4, 4],
            move_lights_workgroup_size: 128,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Every fragment loops over every active light.
    Naive,
    #[default]
    ForwardPlus,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Naive => RenderMode::ForwardPlus,
            RenderMode::ForwardPlus => RenderMode::Naive,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthPrepass {
    Off,
    /// Early depth only, shading keeps reading the interpolated view depth.
    #[default]
    Depth,
    /// Early depth plus a linearized depth surface sampled by the shading pass.
    LinearDepth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub mode: RenderMode,
    pub depth_prepass: DepthPrepass,
    pub vsync: bool,
    /// Linear depth is divided by this before being stored.
    pub linear_depth_max: f32,
    pub clear_color: [f32; 3],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::ForwardPlus,
            depth_prepass: DepthPrepass::Depth,
            vsync: true,
            linear_depth_max: 1000.0,
            clear_color: [0.0, 0.0, 0.0],
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !(camera.near > 0.0) {
            return Err(invalid("camera.near", "must be positive"));
        }
        if !(camera.far > camera.near) {
            return Err(invalid("camera.far", "must be greater than camera.near"));
        }
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            return Err(invalid("camera.fov_y_degrees", "must be in (0, 180)"));
        }

        let lights = &self.lights;
        if lights.max_count == 0 {
            return Err(invalid("lights.max_count", "must be at least 1"));
        }
        if lights.max_count > MAX_NUM_LIGHTS {
            return Err(invalid(
                "lights.max_count",
                format!("{} exceeds the limit of {MAX_NUM_LIGHTS}", lights.max_count),
            ));
        }
        if lights.initial_count > lights.max_count {
            return Err(invalid(
                "lights.initial_count",
                format!("{} exceeds lights.max_count {}", lights.initial_count, lights.max_count),
            ));
        }
        if !(lights.intensity > 0.0) {
            return Err(invalid("lights.intensity", "must be positive"));
        }
        if !(lights.falloff_cutoff > 0.0) {
            return Err(invalid("lights.falloff_cutoff", "must be positive"));
        }
        if (0..3).any(|axis| lights.bounds_min[axis] > lights.bounds_max[axis]) {
            return Err(invalid("lights.bounds_min", "must not exceed lights.bounds_max"));
        }

        let clusters = &self.clusters;
        if clusters.tile_width == 0 || clusters.tile_height == 0 {
            return Err(invalid("clusters.tile_width", "tile size must be non-zero"));
        }
        if clusters.slice_count == 0 {
            return Err(invalid("clusters.slice_count", "must be at least 1"));
        }
        if clusters.max_lights_per_cluster == 0 {
            return Err(invalid("clusters.max_lights_per_cluster", "must be at least 1"));
        }
        if clusters.workgroup_size.contains(&0) || clusters.move_lights_workgroup_size == 0 {
            return Err(invalid("clusters.workgroup_size", "dimensions must be non-zero"));
        }
        // light slots are addressed with 32-bit indices on the GPU
        let slots = u64::from(self.window.width.div_ceil(clusters.tile_width))
            * u64::from(self.window.height.div_ceil(clusters.tile_height))
            * u64::from(clusters.slice_count)
            * u64::from(clusters.max_lights_per_cluster);
        if slots > u64::from(u32::MAX) {
            return Err(invalid(
                "clusters.slice_count",
                format!("grid needs {slots} light slots, more than 32-bit indices can address"),
            ));
        }

        if !(self.renderer.linear_depth_max > 0.0) {
            return Err(invalid("renderer.linear_depth_max", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.clusters.tile_width, 128);
        assert_eq!(config.clusters.slice_count, 256);
        assert_eq!(config.clusters.max_lights_per_cluster, 500);
        assert_eq!(config.lights.max_count, 5000);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "clusters": { "slice_count": 32 }, "renderer": { "mode": "naive" } }"#,
        )
        .unwrap();
        assert_eq!(config.clusters.slice_count, 32);
        assert_eq!(config.clusters.tile_height, 128);
        assert_eq!(config.renderer.mode, RenderMode::Naive);
        assert_eq!(config.renderer.depth_prepass, DepthPrepass::Depth);
    }

    #[test]
    fn initial_count_above_capacity_is_rejected() {
        let err = EngineConfig::from_json_str(
            r#"{ "lights": { "initial_count": 10, "max_count": 5 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "lights.initial_count", .. }));
    }

    #[test]
    fn light_capacity_above_limit_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "lights": { "max_count": 6000 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "lights.max_count", .. }));

        let at_limit = format!(r#"{{ "lights": {{ "max_count": {MAX_NUM_LIGHTS} }} }}"#);
        assert!(EngineConfig::from_json_str(&at_limit).is_ok());
    }

    #[test]
    fn grid_beyond_32_bit_slots_is_rejected() {
        let err = EngineConfig::from_json_str(
            r#"{ "clusters": { "tile_width": 1, "tile_height": 1, "slice_count": 4096 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "clusters.slice_count", .. }));

        // same tiles fit once the depth slicing is coarse enough
        let config = EngineConfig::from_json_str(
            r#"{ "clusters": { "tile_width": 1, "tile_height": 1, "slice_count": 2, "max_lights_per_cluster": 8 } }"#,
        )
        .unwrap();
        assert_eq!(config.clusters.slice_count, 2);
    }

    #[test]
    fn inverted_depth_range_is_rejected() {
        let err =
            EngineConfig::from_json_str(r#"{ "camera": { "near": 10.0, "far": 1.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "camera.far", .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ clusters: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn render_mode_toggles() {
        assert_eq!(RenderMode::Naive.toggled(), RenderMode::ForwardPlus);
        assert_eq!(RenderMode::ForwardPlus.toggled(), RenderMode::Naive);
    }
}
