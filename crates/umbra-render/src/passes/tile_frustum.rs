//! Per-tile frustum construction on the GPU

use crate::graph::{names, PassResourceBuilder, RenderPass};
use crate::pipeline::PipelineCache;
use crate::resources::{BindGroupBuilder, BindGroupLayouts, ResourceManager};
use crate::{shaders, Result};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use std::sync::Arc;
use umbra_core::{ResourceAccess, TileGrid};

/// Uniforms of `tile_frustum.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrustumParams {
    pub inv_projection: Mat4,
    pub screen_size: [u32; 2],
    pub grid_size: [u32; 2],
}

impl FrustumParams {
    pub fn new(grid: &TileGrid, inv_projection: Mat4) -> Self {
        Self {
            inv_projection,
            screen_size: [grid.width, grid.height],
            grid_size: [grid.grid_width, grid.grid_height],
        }
    }
}

/// Builds the tile frustum buffer; runs on init and on every resize.
pub struct TileFrustumPass {
    pipeline: Arc<wgpu::ComputePipeline>,
    params: Arc<wgpu::Buffer>,
}

impl TileFrustumPass {
    pub fn new(pipelines: &mut PipelineCache, resources: &mut ResourceManager) -> Result<Self> {
        let layouts = resources.bind_group_layouts.clone();
        let pipeline = pipelines.compute_pipeline("tile_frustum", shaders::TILE_FRUSTUM, &[&layouts.tile_frustum])?;
        let params = resources.create_buffer(
            "frustum_params",
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            std::mem::size_of::<FrustumParams>() as u64,
        )?;
        Ok(Self { pipeline, params })
    }

    pub fn params(&self) -> &wgpu::Buffer {
        &self.params
    }

    pub fn bind_group(&self, device: &wgpu::Device, layouts: &BindGroupLayouts, frustums: &wgpu::Buffer) -> wgpu::BindGroup {
        BindGroupBuilder::new("tile_frustum")
            .buffer(0, &self.params)
            .buffer(1, frustums)
            .build(device, &layouts.tile_frustum)
    }

    /// One invocation per tile.
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, grid: &TileGrid) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Tile Frustum Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(grid.grid_width.div_ceil(8), grid.grid_height.div_ceil(8), 1);
    }
}

impl RenderPass for TileFrustumPass {
    fn name(&self) -> &str {
        "tile_frustum"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder.read(names::FRUSTUM_PARAMS, ResourceAccess::UNIFORM_ALL);
        builder.write(names::TILE_FRUSTUMS, ResourceAccess::COMPUTE_WRITE);
    }
}
