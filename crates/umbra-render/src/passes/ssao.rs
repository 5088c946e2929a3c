//! Screen-space ambient occlusion

use crate::graph::{names, PassResourceBuilder, RenderPass};
use crate::pipeline::{PipelineCache, RenderPipelineDesc};
use crate::resources::{BindGroupBuilder, BindGroupLayouts, ResourceManager};
use crate::targets::{ScreenTargets, OCCLUSION_FORMAT};
use crate::{shaders, Result};
use std::sync::Arc;
use umbra_core::{ResourceAccess, SsaoUniforms};

/// Hemisphere SSAO into a single-channel visibility target (1 = unoccluded).
pub struct SsaoPass {
    pipeline: Arc<wgpu::RenderPipeline>,
    uniforms: Arc<wgpu::Buffer>,
}

impl SsaoPass {
    pub fn new(pipelines: &mut PipelineCache, resources: &mut ResourceManager) -> Result<Self> {
        let layouts = resources.bind_group_layouts.clone();
        let pipeline = pipelines.render_pipeline(&RenderPipelineDesc {
            label: "ssao",
            shader: shaders::SSAO,
            vertex_entry: "vs_fullscreen",
            bind_group_layouts: &[&layouts.ssao],
            vertex_buffers: &[],
            color_targets: &[OCCLUSION_FORMAT],
            depth_format: None,
            cull_mode: None,
        })?;
        let uniforms = resources.create_buffer(
            "ssao_uniforms",
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            std::mem::size_of::<SsaoUniforms>() as u64,
        )?;
        Ok(Self { pipeline, uniforms })
    }

    pub fn uniforms(&self) -> &wgpu::Buffer {
        &self.uniforms
    }

    pub fn bind_group(&self, device: &wgpu::Device, layouts: &BindGroupLayouts, targets: &ScreenTargets) -> wgpu::BindGroup {
        BindGroupBuilder::new("ssao")
            .buffer(0, &self.uniforms)
            .texture(1, &targets.position.view)
            .texture(2, &targets.normal.view)
            .texture(3, &targets.depth.view)
            .build(device, &layouts.ssao)
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, targets: &ScreenTargets, bind_group: &wgpu::BindGroup) {
        let mut pass = begin_occlusion_pass(encoder, targets, "SSAO Pass");
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Fills the occlusion target with full visibility, used when SSAO is
    /// switched off so the resolve still reads a valid term.
    pub fn record_disabled(&self, encoder: &mut wgpu::CommandEncoder, targets: &ScreenTargets) {
        let _pass = begin_occlusion_pass(encoder, targets, "SSAO Pass (disabled)");
    }
}

fn begin_occlusion_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    targets: &ScreenTargets,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &targets.occlusion.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

impl RenderPass for SsaoPass {
    fn name(&self) -> &str {
        "ssao"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(names::SSAO_UNIFORMS, ResourceAccess::UNIFORM_ALL)
            .read(names::GBUFFER_POSITION, ResourceAccess::FRAGMENT_READ)
            .read(names::GBUFFER_NORMAL, ResourceAccess::FRAGMENT_READ)
            .read(names::DEPTH, ResourceAccess::FRAGMENT_READ)
            .write(names::OCCLUSION, ResourceAccess::COLOR_WRITE);
    }
}
