//! Blocking GPU to CPU copies for tests, validation and the demo

use crate::{Error, Result};

/// Copies `size` bytes from the start of `buffer` and waits for them.
///
/// `buffer` needs `COPY_SRC`.
pub fn read_buffer(device: &wgpu::Device, queue: &wgpu::Queue, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>> {
    let size = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
    if size > buffer.size() {
        return Err(Error::Resource(format!(
            "readback of {size} bytes from a {} byte buffer",
            buffer.size()
        )));
    }
    let staging = staging_buffer(device, size);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    let index = queue.submit(Some(encoder.finish()));
    map_and_read(device, &staging, index)
}

/// Copies a single-mip 2D texture, returning tightly packed rows.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    bytes_per_texel: u32,
) -> Result<Vec<u8>> {
    let (width, height) = (texture.width(), texture.height());
    let row = width * bytes_per_texel;
    let padded_row = row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

    let staging = staging_buffer(device, padded_row as u64 * height as u64);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    let index = queue.submit(Some(encoder.finish()));
    let padded = map_and_read(device, &staging, index)?;

    Ok(unpad_rows(&padded, row as usize, padded_row as usize, height as usize))
}

/// Reinterprets tightly packed bytes as `T`s, ignoring alignment.
pub fn decode<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

fn staging_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn map_and_read(device: &wgpu::Device, staging: &wgpu::Buffer, index: wgpu::SubmissionIndex) -> Result<Vec<u8>> {
    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));

    receiver
        .recv()
        .map_err(|_| Error::DeviceLost("readback callback dropped".into()))??;
    let bytes = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(bytes)
}

fn unpad_rows(padded: &[u8], row: usize, padded_row: usize, height: usize) -> Vec<u8> {
    padded
        .chunks(padded_row)
        .take(height)
        .flat_map(|r| &r[..row])
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpad_drops_row_padding() {
        let padded = [1, 2, 0, 0, 3, 4, 0, 0];
        assert_eq!(unpad_rows(&padded, 2, 4, 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn decode_reads_unaligned_words() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&7u32.to_ne_bytes());
        bytes.extend_from_slice(&9u32.to_ne_bytes());
        assert_eq!(decode::<u32>(&bytes[1..]), vec![7, 9]);
    }
}
