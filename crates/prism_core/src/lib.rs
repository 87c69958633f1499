pub mod camera;
pub mod config;
pub mod time;
pub mod transform;

pub use camera::{Camera, CameraRig};
pub use config::{
    CameraConfig, ClusterConfig, ConfigError, DepthPrepass, EngineConfig, LightConfig, MAX_NUM_LIGHTS,
    RenderMode, RendererConfig, WindowConfig,
};
pub use time::Time;
pub use transform::Transform;
