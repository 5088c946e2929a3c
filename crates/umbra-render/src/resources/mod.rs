//! Resource management system
//!
//! The renderer allocates everything through [`ResourceManager`], which
//! checks sizes against device limits up front so an oversized light index
//! list fails with [`Error::Resource`] instead of a validation panic.

mod bindgroup;
mod uploader;

pub use bindgroup::{BindGroupBuilder, BindGroupLayouts};
pub use uploader::{UploadRecord, Uploader};

use crate::{Error, Result};
use std::sync::Arc;

/// A 2D texture together with its default view.
pub struct GpuImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Central resource manager for the renderer
pub struct ResourceManager {
    device: Arc<wgpu::Device>,
    limits: wgpu::Limits,

    /// Standard bind group layouts shared by all pipelines
    pub bind_group_layouts: Arc<BindGroupLayouts>,

    buffers_created: usize,
    images_created: usize,
    bytes_allocated: u64,
}

impl ResourceManager {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        let bind_group_layouts = Arc::new(BindGroupLayouts::new(&device));
        let limits = device.limits();
        Self {
            device,
            limits,
            bind_group_layouts,
            buffers_created: 0,
            images_created: 0,
            bytes_allocated: 0,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Create a buffer of `size` bytes.
    pub fn create_buffer(&mut self, label: &str, usage: wgpu::BufferUsages, size: u64) -> Result<Arc<wgpu::Buffer>> {
        if size == 0 {
            return Err(Error::Resource(format!("buffer '{label}' has zero size")));
        }
        if size > self.limits.max_buffer_size {
            return Err(Error::Resource(format!(
                "buffer '{label}' needs {size} bytes, device allows {}",
                self.limits.max_buffer_size
            )));
        }
        if usage.contains(wgpu::BufferUsages::STORAGE) && size > self.limits.max_storage_buffer_binding_size as u64 {
            return Err(Error::Resource(format!(
                "storage buffer '{label}' needs {size} bytes, binding limit is {}",
                self.limits.max_storage_buffer_binding_size
            )));
        }
        let size = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.buffers_created += 1;
        self.bytes_allocated += size;
        log::debug!("Created buffer '{}' ({} bytes, {:?})", label, size, usage);
        Ok(Arc::new(buffer))
    }

    /// Create a single-mip 2D image with a default view.
    pub fn create_image(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Result<GpuImage> {
        if width == 0 || height == 0 {
            return Err(umbra_core::Error::InvalidDimensions { width, height }.into());
        }
        let max = self.limits.max_texture_dimension_2d;
        if width > max || height > max {
            return Err(Error::Resource(format!(
                "image '{label}' is {width}x{height}, device allows {max}x{max}"
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.images_created += 1;
        let texel = format.block_copy_size(None).unwrap_or(4) as u64;
        self.bytes_allocated += width as u64 * height as u64 * texel;
        log::debug!("Created image '{}' ({}x{} {:?})", label, width, height, format);

        Ok(GpuImage {
            texture,
            view,
            format,
            width,
            height,
        })
    }

    pub fn create_sampler(&self, label: &str, filter: wgpu::FilterMode) -> wgpu::Sampler {
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        })
    }

    /// 8x8 two-tone checkerboard, the default albedo texture.
    pub fn create_checkerboard(&mut self, queue: &wgpu::Queue) -> Result<GpuImage> {
        const SIZE: u32 = 8;
        const LIGHT: [u8; 4] = [230, 230, 230, 255];
        const DARK: [u8; 4] = [90, 90, 90, 255];

        let image = self.create_image(
            "checkerboard",
            SIZE,
            SIZE,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )?;

        let texels: Vec<u8> = (0..SIZE * SIZE)
            .flat_map(|i| if (i % SIZE + i / SIZE) % 2 == 0 { LIGHT } else { DARK })
            .collect();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &image.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(SIZE * 4),
                rows_per_image: Some(SIZE),
            },
            wgpu::Extent3d {
                width: SIZE,
                height: SIZE,
                depth_or_array_layers: 1,
            },
        );
        Ok(image)
    }

    /// (buffers, images, bytes) allocated so far.
    pub fn stats(&self) -> (usize, usize, u64) {
        (self.buffers_created, self.images_created, self.bytes_allocated)
    }
}
