pub mod cluster_pass;
pub mod context;
pub mod depth_pass;
pub mod error;
pub mod global_resources;
pub mod light_buffers;
pub mod mesh;
pub mod programs;
pub mod render;
pub mod scene;
pub mod shaders;
mod texture;

pub use context::GpuContext;
pub use error::RenderError;
pub use render::Renderer;
pub use scene::{SceneDescription, SceneNode, SceneVisitor};
