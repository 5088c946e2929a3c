//! Lighting resolve: per-tile point lights, directional light, ambient

use crate::graph::{names, PassResourceBuilder, RenderPass};
use crate::pipeline::{PipelineCache, RenderPipelineDesc};
use crate::resources::{BindGroupBuilder, BindGroupLayouts, ResourceManager};
use crate::targets::{ScreenTargets, RESOLVED_FORMAT};
use crate::{shaders, Result};
use std::sync::Arc;
use umbra_core::{GpuDirectionalLight, GpuPointLight, ResourceAccess, SceneGlobals};

/// Per-frame light data the resolve reads.
pub struct LightBuffers {
    pub globals: Arc<wgpu::Buffer>,
    pub directional: Arc<wgpu::Buffer>,
    /// View-space point lights, shared with the cull passes.
    pub point_lights: Arc<wgpu::Buffer>,
    /// Lights `point_lights` holds.
    pub max_point_lights: usize,
}

impl LightBuffers {
    pub fn new(resources: &mut ResourceManager, max_point_lights: usize) -> Result<Self> {
        use wgpu::BufferUsages as B;
        Ok(Self {
            globals: resources.create_buffer(
                "scene_globals",
                B::UNIFORM | B::COPY_DST,
                std::mem::size_of::<SceneGlobals>() as u64,
            )?,
            directional: resources.create_buffer(
                "directional_light",
                B::UNIFORM | B::COPY_DST,
                std::mem::size_of::<GpuDirectionalLight>() as u64,
            )?,
            point_lights: resources.create_buffer(
                "point_lights",
                B::STORAGE | B::COPY_DST,
                (max_point_lights.max(1) * std::mem::size_of::<GpuPointLight>()) as u64,
            )?,
            max_point_lights,
        })
    }
}

/// Fullscreen resolve of the opaque GBuffer.
///
/// Reads only the opaque light list. The transparent list is built for
/// transparent geometry, which this renderer does not draw yet; for now its
/// only consumer is the CPU `shade_pixel` reference.
pub struct LightingPass {
    pipeline: Arc<wgpu::RenderPipeline>,
}

impl LightingPass {
    pub fn new(pipelines: &mut PipelineCache, layouts: &BindGroupLayouts) -> Result<Self> {
        let pipeline = pipelines.render_pipeline(&RenderPipelineDesc {
            label: "lighting",
            shader: shaders::LIGHTING,
            vertex_entry: "vs_fullscreen",
            bind_group_layouts: &[&layouts.lighting],
            vertex_buffers: &[],
            color_targets: &[RESOLVED_FORMAT],
            depth_format: None,
            cull_mode: None,
        })?;
        Ok(Self { pipeline })
    }

    /// Binds the opaque light list; the transparent one has no consumer here.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        targets: &ScreenTargets,
        lights: &LightBuffers,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new("lighting")
            .buffer(0, &lights.globals)
            .buffer(1, &lights.directional)
            .buffer(2, &lights.point_lights)
            .texture(3, &targets.opaque.grid.view)
            .buffer(4, &targets.opaque.indices)
            .texture(5, &targets.position.view)
            .texture(6, &targets.normal.view)
            .texture(7, &targets.albedo.view)
            .texture(8, &targets.occlusion.view)
            .build(device, &layouts.lighting)
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, targets: &ScreenTargets, bind_group: &wgpu::BindGroup) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lighting Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.resolved.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

impl RenderPass for LightingPass {
    fn name(&self) -> &str {
        "lighting"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(names::SCENE_GLOBALS, ResourceAccess::UNIFORM_ALL)
            .read(names::DIRECTIONAL_LIGHT, ResourceAccess::UNIFORM_ALL)
            .read(names::POINT_LIGHTS, ResourceAccess::FRAGMENT_READ)
            .read(names::OPAQUE_LIGHT_GRID, ResourceAccess::FRAGMENT_READ)
            .read(names::OPAQUE_LIGHT_INDICES, ResourceAccess::FRAGMENT_READ)
            .read(names::GBUFFER_POSITION, ResourceAccess::FRAGMENT_READ)
            .read(names::GBUFFER_NORMAL, ResourceAccess::FRAGMENT_READ)
            .read(names::GBUFFER_ALBEDO, ResourceAccess::FRAGMENT_READ)
            .read(names::OCCLUSION, ResourceAccess::FRAGMENT_READ)
            .write(names::RESOLVED, ResourceAccess::COLOR_WRITE);
    }
}
