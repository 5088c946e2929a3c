//! Screen-sized render targets and per-tile buffers
//!
//! Everything here depends on the resolution and is rebuilt as a whole on
//! resize.

use crate::resources::{GpuImage, ResourceManager};
use crate::Result;
use std::sync::Arc;
use umbra_core::culling::index_capacity_for;
use umbra_core::{CullUniforms, TileFrustum, TileGrid};

/// Half floats keep the GBuffer renderable on downlevel backends.
pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const OCCLUSION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
pub const RESOLVED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const LIGHT_GRID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg32Uint;

/// One binning pass's outputs.
pub struct LightListTargets {
    /// `max_lights_per_tile * tile_count` light indices.
    pub indices: Arc<wgpu::Buffer>,
    /// Single atomic u32, cleared before every dispatch.
    pub counter: Arc<wgpu::Buffer>,
    /// One (offset, count) texel per tile.
    pub grid: GpuImage,
    pub uniforms: Arc<wgpu::Buffer>,
}

impl LightListTargets {
    fn new(resources: &mut ResourceManager, grid: &TileGrid, max_lights_per_tile: u32, name: &str) -> Result<Self> {
        use wgpu::BufferUsages as B;

        let indices = resources.create_buffer(
            &format!("{name}_light_indices"),
            B::STORAGE | B::COPY_SRC,
            index_capacity_for(grid, max_lights_per_tile) as u64 * 4,
        )?;
        let counter = resources.create_buffer(
            &format!("{name}_light_counter"),
            B::STORAGE | B::COPY_DST | B::COPY_SRC,
            4,
        )?;
        let light_grid = resources.create_image(
            &format!("{name}_light_grid"),
            grid.grid_width,
            grid.grid_height,
            LIGHT_GRID_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
        )?;
        let uniforms = resources.create_buffer(
            &format!("{name}_cull_uniforms"),
            B::UNIFORM | B::COPY_DST,
            std::mem::size_of::<CullUniforms>() as u64,
        )?;

        Ok(Self {
            indices,
            counter,
            grid: light_grid,
            uniforms,
        })
    }
}

/// Render targets and tile buffers for one resolution.
pub struct ScreenTargets {
    pub grid: TileGrid,
    pub position: GpuImage,
    pub normal: GpuImage,
    pub albedo: GpuImage,
    pub depth: GpuImage,
    pub occlusion: GpuImage,
    pub resolved: GpuImage,
    pub frustums: Arc<wgpu::Buffer>,
    pub opaque: LightListTargets,
    pub transparent: LightListTargets,
}

impl ScreenTargets {
    pub fn new(resources: &mut ResourceManager, grid: TileGrid, max_lights_per_tile: u32) -> Result<Self> {
        use wgpu::TextureUsages as T;

        let (width, height) = (grid.width, grid.height);
        let attachment = T::RENDER_ATTACHMENT | T::TEXTURE_BINDING | T::COPY_SRC;

        let targets = Self {
            grid,
            position: resources.create_image("gbuffer_position", width, height, POSITION_FORMAT, attachment)?,
            normal: resources.create_image("gbuffer_normal", width, height, NORMAL_FORMAT, attachment)?,
            albedo: resources.create_image("gbuffer_albedo", width, height, ALBEDO_FORMAT, attachment)?,
            depth: resources.create_image("depth", width, height, DEPTH_FORMAT, attachment)?,
            occlusion: resources.create_image("occlusion", width, height, OCCLUSION_FORMAT, attachment)?,
            resolved: resources.create_image("resolved", width, height, RESOLVED_FORMAT, attachment)?,
            frustums: resources.create_buffer(
                "tile_frustums",
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                (grid.tile_count() * std::mem::size_of::<TileFrustum>()) as u64,
            )?,
            opaque: LightListTargets::new(resources, &grid, max_lights_per_tile, "opaque")?,
            transparent: LightListTargets::new(resources, &grid, max_lights_per_tile, "transparent")?,
        };

        log::info!(
            "Screen targets for {}x{} ({}x{} tiles, {} light index slots per list)",
            width,
            height,
            grid.grid_width,
            grid.grid_height,
            index_capacity_for(&grid, max_lights_per_tile)
        );
        Ok(targets)
    }
}
