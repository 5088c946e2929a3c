//! Umbra core: the GPU-agnostic half of the tiled deferred renderer.
//!
//! Everything in here is plain data and math. The wgpu side lives in
//! `umbra-render` and mirrors the layouts defined here byte for byte:
//!
//! - [`tile`]: screen tiling and per-tile view-space frustums
//! - [`light`]: point/directional lights and the per-frame scene globals
//! - [`culling`]: CPU reference light binning (sequential and atomic parallel)
//! - [`ssao`]: hemisphere kernel, rotation noise and a reference occlusion term
//! - [`shading`]: reference lighting resolve for a single pixel
//! - [`barrier`]: access/stage vocabulary shared with the render graph
//! - [`settings`]: serde-backed renderer configuration

pub mod barrier;
pub mod camera;
pub mod capped;
pub mod culling;
pub mod error;
pub mod light;
pub mod mesh;
pub mod scene;
pub mod settings;
pub mod shading;
pub mod ssao;
pub mod tile;

pub use barrier::{AccessFlags, Barrier, ResourceAccess, StageFlags};
pub use camera::Camera;
pub use capped::CappedVec;
pub use culling::{
    cull_lights_parallel, cull_lights_reference, BinsError, CullInputs, CullUniforms, DepthRangePolicy,
    LightBins, LightGridEntry, TileDepthRange,
};
pub use error::{Error, Result};
pub use light::{DirectionalLight, GpuDirectionalLight, GpuPointLight, PointLight, SceneGlobals};
pub use mesh::{Mesh, PackedVertex};
pub use scene::{InstanceTransforms, MeshId, SceneDescription, SceneInstance};
pub use settings::{RenderFeatures, RenderSettings, RendererVariant, SceneLimits, SsaoMode, SsaoSettings};
pub use shading::{shade_pixel, LightListKind, ResolveInputs, SurfaceSample};
pub use ssao::{SsaoKernel, SsaoUniforms};
pub use tile::{TileFrustum, TileFrustums, TileGrid};

/// Edge length of a square screen tile, in pixels.
pub const TILE_SIZE_IN_PIXELS: u32 = 8;

/// Upper bound on the number of lights a single tile can reference.
pub const MAX_LIGHTS_PER_TILE: u32 = 1024;

/// Capacity of the per-frame point light array.
pub const MAX_POINT_LIGHTS: usize = 1000;

/// Number of hemisphere samples taken per pixel by the SSAO pass.
pub const SSAO_KERNEL_SIZE: usize = 64;

/// Number of random rotation vectors tiled over the screen (4x4).
pub const SSAO_NOISE_SIZE: usize = 16;
