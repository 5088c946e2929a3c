/// Pipeline cache keyed by shader, constants and target formats

use super::ShaderDefines;
use crate::shaders::ShaderSource;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the cache needs to build a graphics pipeline.
pub struct RenderPipelineDesc<'a> {
    pub label: &'a str,
    pub shader: ShaderSource,
    pub vertex_entry: &'a str,
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub color_targets: &'a [wgpu::TextureFormat],
    /// Depth-tested with `Less` and depth writes when set.
    pub depth_format: Option<wgpu::TextureFormat>,
    pub cull_mode: Option<wgpu::Face>,
}

/// Compiles pipelines once and hands out shared handles afterwards.
///
/// Creation runs inside a validation error scope. A broken shader comes back
/// as [`Error::Shader`] and a layout mismatch as [`Error::Wgpu`], instead of
/// a device panic.
pub struct PipelineCache {
    device: Arc<wgpu::Device>,
    defines: ShaderDefines,
    modules: HashMap<(&'static str, String), Arc<wgpu::ShaderModule>>,
    render: HashMap<String, Arc<wgpu::RenderPipeline>>,
    compute: HashMap<String, Arc<wgpu::ComputePipeline>>,
}

impl PipelineCache {
    pub fn new(device: Arc<wgpu::Device>, defines: ShaderDefines) -> Self {
        Self {
            device,
            defines,
            modules: HashMap::new(),
            render: HashMap::new(),
            compute: HashMap::new(),
        }
    }

    /// Shader module for `shader` with the cache's constants prepended.
    pub fn shader_module(&mut self, shader: &ShaderSource) -> Result<Arc<wgpu::ShaderModule>> {
        let prelude = self.defines.prelude();
        let key = (shader.id, prelude.clone());
        if let Some(module) = self.modules.get(&key) {
            return Ok(module.clone());
        }

        log::debug!("Compiling shader '{}'", shader.id);
        let source = prelude + &shader.assemble();
        let device = self.device.clone();
        let module = with_validation(&device, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.id),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })
        .map_err(|e| Error::Shader(format!("{}: {}", shader.id, e)))?;

        let module = Arc::new(module);
        self.modules.insert(key, module.clone());
        Ok(module)
    }

    /// Compute pipeline with entry point `cs_main`.
    pub fn compute_pipeline(
        &mut self,
        label: &str,
        shader: ShaderSource,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
    ) -> Result<Arc<wgpu::ComputePipeline>> {
        let key = format!("{label}|{}|{}", shader.id, self.defines.prelude());
        if let Some(pipeline) = self.compute.get(&key) {
            log::trace!("Using cached compute pipeline: {}", label);
            return Ok(pipeline.clone());
        }

        log::info!("Creating compute pipeline: {}", label);
        let module = self.shader_module(&shader)?;
        let device = self.device.clone();
        let pipeline = with_validation(&device, || {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label}_layout")),
                bind_group_layouts,
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module: &module,
                entry_point: "cs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        })?;

        let pipeline = Arc::new(pipeline);
        self.compute.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    /// Graphics pipeline with fragment entry point `fs_main`.
    pub fn render_pipeline(&mut self, desc: &RenderPipelineDesc<'_>) -> Result<Arc<wgpu::RenderPipeline>> {
        let key = format!(
            "{}|{}|{:?}|{:?}|{}",
            desc.label,
            desc.shader.id,
            desc.color_targets,
            desc.depth_format,
            self.defines.prelude()
        );
        if let Some(pipeline) = self.render.get(&key) {
            log::trace!("Using cached render pipeline: {}", desc.label);
            return Ok(pipeline.clone());
        }

        log::info!("Creating render pipeline: {}", desc.label);
        let module = self.shader_module(&desc.shader)?;
        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let device = self.device.clone();
        let pipeline = with_validation(&device, || {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{}_layout", desc.label)),
                bind_group_layouts: desc.bind_group_layouts,
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&layout),
                cache: None,
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: desc.vertex_entry,
                    buffers: desc.vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: desc.cull_mode,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: desc.depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })?;

        let pipeline = Arc::new(pipeline);
        self.render.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.render.len() + self.compute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the pipeline cache
    pub fn clear(&mut self) {
        log::info!("Clearing pipeline cache ({} pipelines)", self.len());
        self.render.clear();
        self.compute.clear();
        self.modules.clear();
    }
}

/// Runs `create` inside a validation error scope.
fn with_validation<T>(device: &wgpu::Device, create: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(err.into()),
        None => Ok(value),
    }
}
