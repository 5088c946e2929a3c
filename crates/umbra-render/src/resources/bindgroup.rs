//! Bind group layouts of the built-in passes and a small builder
//!
//! Every pass binds exactly one layout from here (the GBuffer pass binds
//! two). Binding numbers match the `@group/@binding` attributes in the WGSL
//! sources under `shaders/`.

use std::sync::Arc;

/// Layouts shared by pipelines and the bind groups created against them.
#[derive(Clone)]
pub struct BindGroupLayouts {
    /// Group 0 of the GBuffer pass: per-instance transforms.
    pub scene: Arc<wgpu::BindGroupLayout>,
    /// Group 1 of the GBuffer pass: albedo texture and sampler.
    pub material: Arc<wgpu::BindGroupLayout>,
    pub tile_frustum: Arc<wgpu::BindGroupLayout>,
    pub light_cull: Arc<wgpu::BindGroupLayout>,
    pub ssao: Arc<wgpu::BindGroupLayout>,
    pub lighting: Arc<wgpu::BindGroupLayout>,
    pub present: Arc<wgpu::BindGroupLayout>,
}

impl BindGroupLayouts {
    /// Create the standard bind group layouts
    pub fn new(device: &wgpu::Device) -> Self {
        use wgpu::ShaderStages as S;

        let layout = |label: &str, entries: &[wgpu::BindGroupLayoutEntry]| {
            Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            }))
        };

        Self {
            scene: layout("Scene Bind Group Layout", &[storage(0, S::VERTEX, true)]),
            material: layout(
                "Material Bind Group Layout",
                &[texture_float(0, S::FRAGMENT, true), sampler(1, S::FRAGMENT)],
            ),
            tile_frustum: layout(
                "Tile Frustum Bind Group Layout",
                &[uniform(0, S::COMPUTE), storage(1, S::COMPUTE, false)],
            ),
            light_cull: layout(
                "Light Cull Bind Group Layout",
                &[
                    uniform(0, S::COMPUTE),
                    storage(1, S::COMPUTE, true),
                    storage(2, S::COMPUTE, true),
                    texture_depth(3, S::COMPUTE),
                    storage(4, S::COMPUTE, false),
                    storage(5, S::COMPUTE, false),
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: S::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: wgpu::TextureFormat::Rg32Uint,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                ],
            ),
            ssao: layout(
                "SSAO Bind Group Layout",
                &[
                    uniform(0, S::FRAGMENT),
                    texture_float(1, S::FRAGMENT, false),
                    texture_float(2, S::FRAGMENT, false),
                    texture_depth(3, S::FRAGMENT),
                ],
            ),
            lighting: layout(
                "Lighting Bind Group Layout",
                &[
                    uniform(0, S::FRAGMENT),
                    uniform(1, S::FRAGMENT),
                    storage(2, S::FRAGMENT, true),
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: S::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Uint,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    storage(4, S::FRAGMENT, true),
                    texture_float(5, S::FRAGMENT, false),
                    texture_float(6, S::FRAGMENT, false),
                    texture_float(7, S::FRAGMENT, false),
                    texture_float(8, S::FRAGMENT, false),
                ],
            ),
            present: layout(
                "Present Bind Group Layout",
                &[texture_float(0, S::FRAGMENT, true), sampler(1, S::FRAGMENT)],
            ),
        }
    }
}

fn uniform(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_float(binding: u32, visibility: wgpu::ShaderStages, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn texture_depth(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Helper for building bind groups
pub struct BindGroupBuilder<'a> {
    label: Option<&'a str>,
    entries: Vec<wgpu::BindGroupEntry<'a>>,
}

impl<'a> BindGroupBuilder<'a> {
    pub fn new(label: &'a str) -> Self {
        Self {
            label: Some(label),
            entries: Vec::new(),
        }
    }

    /// Add a whole-buffer binding
    pub fn buffer(mut self, binding: u32, buffer: &'a wgpu::Buffer) -> Self {
        self.entries.push(wgpu::BindGroupEntry {
            binding,
            resource: buffer.as_entire_binding(),
        });
        self
    }

    /// Add a texture view binding
    pub fn texture(mut self, binding: u32, view: &'a wgpu::TextureView) -> Self {
        self.entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
        self
    }

    /// Add a sampler binding
    pub fn sampler(mut self, binding: u32, sampler: &'a wgpu::Sampler) -> Self {
        self.entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        self
    }

    /// Build the bind group
    pub fn build(self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: self.label,
            layout,
            entries: &self.entries,
        })
    }
}
