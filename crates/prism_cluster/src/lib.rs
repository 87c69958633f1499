pub mod assign;
pub mod bounds;
pub mod depth;
pub mod frame;
pub mod grid;
pub mod light;
pub mod pipeline;
pub mod shading;

pub use assign::{AssignError, AssignStats, ClusterAssigner, ClusterBuffers, DispatchOrder};
pub use depth::{DepthConvention, DepthResolve, LinearDepthEncoding, linearize_depth};
pub use frame::{FrameError, FramePhase, FrameSequencer};
pub use grid::{ClusterCoord, ClusterGrid, ClusterParams, GridError, GridLayout, Projection, Viewport};
pub use light::{GpuLight, LightError, LightFalloff, LightStore, LightView, MAX_NUM_LIGHTS};
pub use pipeline::{ClusterPipeline, FrameInput, FrameOutput, PipelineError};
pub use shading::{ClusterShader, Fragment, Lambert, LightingModel, ShadedFragment, shade_naive};
