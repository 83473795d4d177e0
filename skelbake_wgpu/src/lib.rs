//! # skelbake_wgpu
//! wgpu resources for drawing crowds of instances animated from a baked pose atlas.
//!
//! The atlas is uploaded once as an [POSE_ATLAS_FORMAT] texture.
//! Per instance records are written each frame to a rotating set of vertex buffers.
mod crowd;
mod instance;
mod pipeline;
mod texture;
mod vertex;

pub use crowd::{CameraData, CreateCrowdError, CrowdAnimation};
pub use instance::{InstanceBufferWriter, InstanceBuffers};
pub use pipeline::CrowdPipeline;
pub use texture::{WgpuTextureFactory, create_pose_atlas_texture};
pub use vertex::{VertexLayouts, vertex_format};

/// The format for baked bone transforms.
/// Each texel stores one row of a 3x4 affine matrix.
pub const POSE_ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
