//! Copies the resolved image into the caller's target

use crate::graph::{names, PassResourceBuilder, RenderPass};
use crate::pipeline::{PipelineCache, RenderPipelineDesc};
use crate::resources::{BindGroupBuilder, BindGroupLayouts};
use crate::targets::ScreenTargets;
use crate::{shaders, Result};
use std::sync::Arc;
use umbra_core::ResourceAccess;

pub struct PresentPass {
    pipeline: Arc<wgpu::RenderPipeline>,
    sampler: wgpu::Sampler,
}

impl PresentPass {
    pub fn new(
        pipelines: &mut PipelineCache,
        layouts: &BindGroupLayouts,
        sampler: wgpu::Sampler,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let pipeline = pipelines.render_pipeline(&RenderPipelineDesc {
            label: "present",
            shader: shaders::PRESENT,
            vertex_entry: "vs_fullscreen",
            bind_group_layouts: &[&layouts.present],
            vertex_buffers: &[],
            color_targets: &[output_format],
            depth_format: None,
            cull_mode: None,
        })?;
        Ok(Self { pipeline, sampler })
    }

    pub fn bind_group(&self, device: &wgpu::Device, layouts: &BindGroupLayouts, targets: &ScreenTargets) -> wgpu::BindGroup {
        BindGroupBuilder::new("present")
            .texture(0, &targets.resolved.view)
            .sampler(1, &self.sampler)
            .build(device, &layouts.present)
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView, bind_group: &wgpu::BindGroup) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Present Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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

impl RenderPass for PresentPass {
    fn name(&self) -> &str {
        "present"
    }

    fn declare_resources(&self, builder: &mut PassResourceBuilder) {
        builder
            .read(names::RESOLVED, ResourceAccess::FRAGMENT_READ)
            .write(names::OUTPUT, ResourceAccess::COLOR_WRITE);
    }
}
