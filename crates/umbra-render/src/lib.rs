//! Umbra Render - tiled deferred shading on wgpu
//!
//! The frame is a fixed chain of passes, ordered and checked by the render
//! graph from the resources each pass declares:
//!
//! - Tile frustum (compute, on resize): one view-space frustum per 8x8 tile
//! - GBuffer: view-space position, normal, albedo and depth
//! - Light cull (compute, twice): per-tile light lists for opaque and
//!   transparent depth ranges, built with workgroup and global atomics
//! - SSAO: hemisphere occlusion from the GBuffer
//! - Lighting resolve: per-tile point lights, directional light, ambient
//! - Present: copies the resolved image to the caller's target

pub mod graph;
pub mod mesh;
pub mod passes;
pub mod pipeline;
pub mod readback;
pub mod resources;
pub mod scene;
pub mod shaders;
pub mod targets;

mod renderer;

pub use mesh::GpuMesh;
pub use renderer::{check_adapter, create_renderer, FrameRing, RendererConfig, SceneRenderer, TiledDeferred};
pub use scene::RenderScene;

pub use umbra_core::{DepthRangePolicy, LightListKind, RenderFeatures, RenderSettings, RendererVariant};

/// Result type for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during rendering
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] umbra_core::Error),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Shader error: {0}")]
    Shader(String),

    #[error("WGPU error: {0}")]
    Wgpu(String),

    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Surface error: {0}")]
    Surface(String),
}

impl From<wgpu::Error> for Error {
    fn from(err: wgpu::Error) -> Self {
        Error::Wgpu(err.to_string())
    }
}

impl From<wgpu::SurfaceError> for Error {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost => Error::DeviceLost("surface lost".into()),
            other => Error::Surface(other.to_string()),
        }
    }
}

impl From<wgpu::BufferAsyncError> for Error {
    fn from(err: wgpu::BufferAsyncError) -> Self {
        Error::Resource(format!("buffer map failed: {err}"))
    }
}
