//! Light culling compute pass
//!
//! Runs once per light list. Each dispatch clears its list's counter and
//! then bins every point light into per-tile segments of the index list; see
//! `light_cull.wgsl` for the reservation protocol.

use crate::graph::{names, PassResourceBuilder, RenderPass, ResourceHandle};
use crate::pipeline::PipelineCache;
use crate::resources::{BindGroupBuilder, BindGroupLayouts};
use crate::targets::{LightListTargets, ScreenTargets};
use crate::{shaders, Result};
use std::sync::Arc;
use umbra_core::{AccessFlags, DepthRangePolicy, ResourceAccess, StageFlags, TileGrid};

const UNIFORM_COMPUTE: ResourceAccess = ResourceAccess::new(AccessFlags::UNIFORM_READ, StageFlags::COMPUTE);

struct ListResources {
    uniforms: ResourceHandle,
    indices: ResourceHandle,
    counter: ResourceHandle,
    grid: ResourceHandle,
}

/// Bins point lights for one depth range policy.
pub struct LightCullPass {
    policy: DepthRangePolicy,
    pipeline: Arc<wgpu::ComputePipeline>,
}

impl LightCullPass {
    pub fn new(pipelines: &mut PipelineCache, layouts: &BindGroupLayouts, policy: DepthRangePolicy) -> Result<Self> {
        // Both policies share one pipeline; the cache hands back the same handle.
        let pipeline = pipelines.compute_pipeline("light_cull", shaders::LIGHT_CULL, &[&layouts.light_cull])?;
        Ok(Self { policy, pipeline })
    }

    /// The light list this pass fills.
    pub fn list<'a>(&self, targets: &'a ScreenTargets) -> &'a LightListTargets {
        match self.policy {
            DepthRangePolicy::Opaque => &targets.opaque,
            DepthRangePolicy::Transparent => &targets.transparent,
        }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        targets: &ScreenTargets,
        point_lights: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        let list = self.list(targets);
        BindGroupBuilder::new(self.name())
            .buffer(0, &list.uniforms)
            .buffer(1, &targets.frustums)
            .buffer(2, point_lights)
            .texture(3, &targets.depth.view)
            .buffer(4, &list.indices)
            .buffer(5, &list.counter)
            .texture(6, &list.grid.view)
            .build(device, &layouts.light_cull)
    }

    /// Clears the counter, then one workgroup per tile.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &ScreenTargets,
        bind_group: &wgpu::BindGroup,
        grid: &TileGrid,
    ) {
        encoder.clear_buffer(&self.list(targets).counter, 0, None);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.name()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(grid.grid_width, grid.grid_height, 1);
    }

    fn resources(&self) -> ListResources {
        match self.policy {
            DepthRangePolicy::Opaque => ListResources {
                uniforms: names::OPAQUE_CULL_UNIFORMS,
                indices: names::OPAQUE_LIGHT_INDICES,
                counter: names::OPAQUE_LIGHT_COUNTER,
                grid: names::OPAQUE_LIGHT_GRID,
            },
            DepthRangePolicy::Transparent => ListResources {
                uniforms: names::TRANSPARENT_CULL_UNIFORMS,
                indices: names::TRANSPARENT_LIGHT_INDICES,
                counter: names::TRANSPARENT_LIGHT_COUNTER,
                grid: names::TRANSPARENT_LIGHT_GRID,
            },
        }
    }
}

impl RenderPass for LightCullPass {
    fn name(&self) -> &str {
        match self.policy {
            DepthRangePolicy::Opaque => "light_cull_opaque",
            DepthRangePolicy::Transparent => "light_cull_transparent",
        }
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        let list = self.resources();
        builder
            .read(list.uniforms, UNIFORM_COMPUTE)
            .read(names::TILE_FRUSTUMS, ResourceAccess::COMPUTE_READ)
            .read(names::POINT_LIGHTS, ResourceAccess::COMPUTE_READ)
            .read(names::DEPTH, ResourceAccess::COMPUTE_READ)
            .write(list.counter, ResourceAccess::COMPUTE_READ_WRITE)
            .write(list.indices, ResourceAccess::COMPUTE_WRITE)
            .write(list.grid, ResourceAccess::COMPUTE_WRITE);
    }
}
