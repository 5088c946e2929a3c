//! GBuffer pass: view-space position, normal, albedo and depth

use crate::graph::{names, PassResourceBuilder, RenderPass};
use crate::mesh::vertex_layout;
use crate::pipeline::{PipelineCache, RenderPipelineDesc};
use crate::resources::{BindGroupBuilder, BindGroupLayouts, ResourceManager};
use crate::scene::RenderScene;
use crate::targets::{ScreenTargets, ALBEDO_FORMAT, DEPTH_FORMAT, NORMAL_FORMAT, POSITION_FORMAT};
use crate::{shaders, Error, Result};
use std::sync::Arc;
use umbra_core::{InstanceTransforms, ResourceAccess};

/// Rasterizes every opaque instance into the GBuffer.
pub struct GBufferPass {
    pipeline: Arc<wgpu::RenderPipeline>,
    instances: Arc<wgpu::Buffer>,
    capacity: usize,
}

impl GBufferPass {
    pub fn new(pipelines: &mut PipelineCache, resources: &mut ResourceManager, max_instances: usize) -> Result<Self> {
        let layouts = resources.bind_group_layouts.clone();
        let pipeline = pipelines.render_pipeline(&RenderPipelineDesc {
            label: "gbuffer",
            shader: shaders::GBUFFER,
            vertex_entry: "vs_main",
            bind_group_layouts: &[&layouts.scene, &layouts.material],
            vertex_buffers: &[vertex_layout()],
            color_targets: &[POSITION_FORMAT, NORMAL_FORMAT, ALBEDO_FORMAT],
            depth_format: Some(DEPTH_FORMAT),
            cull_mode: Some(wgpu::Face::Back),
        })?;
        let instances = resources.create_buffer(
            "instances",
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            (max_instances.max(1) * std::mem::size_of::<InstanceTransforms>()) as u64,
        )?;
        Ok(Self {
            pipeline,
            instances,
            capacity: max_instances,
        })
    }

    pub fn instances(&self) -> &wgpu::Buffer {
        &self.instances
    }

    /// Instances the transform buffer holds; later ones are not drawn.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn scene_bind_group(&self, device: &wgpu::Device, layouts: &BindGroupLayouts) -> wgpu::BindGroup {
        BindGroupBuilder::new("gbuffer_scene")
            .buffer(0, &self.instances)
            .build(device, &layouts.scene)
    }

    /// Draws each instance with `instance_index` pointing at its transforms.
    ///
    /// Only the first [`GBufferPass::capacity`] instances are drawn. An
    /// instance whose mesh was never uploaded is a caller bug and fails the
    /// whole pass.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &ScreenTargets,
        scene: &RenderScene,
        scene_bind_group: &wgpu::BindGroup,
        material_bind_group: &wgpu::BindGroup,
    ) -> Result<()> {
        let instances = &scene.description.instances;
        let meshes = instances
            .iter()
            .take(self.capacity)
            .map(|instance| {
                scene.mesh(instance.mesh).ok_or_else(|| {
                    Error::Pipeline(format!("instance references mesh {} with no geometry bound", instance.mesh.0))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let clear = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GBuffer Pass"),
            color_attachments: &[
                clear(&targets.position.view),
                clear(&targets.normal.view),
                clear(&targets.albedo.view),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, scene_bind_group, &[]);
        pass.set_bind_group(1, material_bind_group, &[]);
        for (index, mesh) in meshes.into_iter().enumerate() {
            let index = index as u32;
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, index..index + 1);
        }
        log::trace!("GBuffer: {} draws", instances.len().min(self.capacity));
        Ok(())
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &str {
        "gbuffer"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(names::INSTANCES, ResourceAccess::VERTEX_STORAGE_READ)
            .write(names::GBUFFER_POSITION, ResourceAccess::COLOR_WRITE)
            .write(names::GBUFFER_NORMAL, ResourceAccess::COLOR_WRITE)
            .write(names::GBUFFER_ALBEDO, ResourceAccess::COLOR_WRITE)
            .write(names::DEPTH, ResourceAccess::DEPTH_WRITE);
    }
}
