//! CPU to GPU buffer uploads with explicit access transitions

use crate::graph::{RenderGraph, ResourceHandle};
use crate::{Error, Result};
use std::sync::Arc;
use umbra_core::{Barrier, ResourceAccess};

/// One upload: where it went and the transitions around it.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    /// Graph resource the buffer backs, when the upload was named.
    pub resource: Option<ResourceHandle>,
    pub offset: u64,
    pub size: u64,
    pub barriers: Vec<Barrier>,
}

/// Writes bytes into buffers through the queue.
///
/// The queue orders writes before the next submission. Each upload records
/// its transitions (`before` to transfer, transfer to `after`);
/// [`Uploader::verify`] checks the named ones against the render graph.
pub struct Uploader {
    queue: Arc<wgpu::Queue>,
    records: Vec<UploadRecord>,
}

impl Uploader {
    pub fn new(queue: Arc<wgpu::Queue>) -> Self {
        Self {
            queue,
            records: Vec::new(),
        }
    }

    pub fn upload(
        &mut self,
        buffer: &wgpu::Buffer,
        offset: u64,
        bytes: &[u8],
        before: ResourceAccess,
        after: ResourceAccess,
    ) -> Result<()> {
        self.write(None, buffer, offset, bytes, before, after)
    }

    /// [`Uploader::upload`] into the buffer backing graph resource `resource`.
    pub fn upload_resource(
        &mut self,
        resource: ResourceHandle,
        buffer: &wgpu::Buffer,
        offset: u64,
        bytes: &[u8],
        before: ResourceAccess,
        after: ResourceAccess,
    ) -> Result<()> {
        self.write(Some(resource), buffer, offset, bytes, before, after)
    }

    fn write(
        &mut self,
        resource: Option<ResourceHandle>,
        buffer: &wgpu::Buffer,
        offset: u64,
        bytes: &[u8],
        before: ResourceAccess,
        after: ResourceAccess,
    ) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let size = bytes.len() as u64;
        check_range(buffer.size(), offset, size)?;

        let barriers = [
            Barrier::between(before, ResourceAccess::UPLOAD),
            Barrier::between(ResourceAccess::UPLOAD, after),
        ]
        .into_iter()
        .flatten()
        .collect();

        self.queue.write_buffer(buffer, offset, bytes);
        log::trace!("Uploaded {} bytes at offset {}", size, offset);
        self.records.push(UploadRecord {
            resource,
            offset,
            size,
            barriers,
        });
        Ok(())
    }

    /// Uploads recorded since the last call.
    pub fn take_records(&mut self) -> Vec<UploadRecord> {
        std::mem::take(&mut self.records)
    }

    /// Drains the records and checks each named upload's final transition
    /// against what `graph` expects of that resource.
    pub fn verify(&mut self, graph: &RenderGraph) -> Result<usize> {
        let records = self.take_records();
        check_records(&records, graph)?;
        Ok(records.len())
    }
}

fn check_records(records: &[UploadRecord], graph: &RenderGraph) -> Result<()> {
    for record in records {
        let Some(resource) = record.resource else {
            continue;
        };
        let after = record
            .barriers
            .iter()
            .find(|b| b.before == ResourceAccess::UPLOAD)
            .map(|b| b.after)
            .ok_or_else(|| Error::Graph(format!("upload to {resource} has no transition out of the transfer")))?;
        graph.check_upload(resource, after)?;
    }
    Ok(())
}

fn check_range(buffer_size: u64, offset: u64, size: u64) -> Result<()> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    if offset % align != 0 || size % align != 0 {
        return Err(Error::Resource(format!(
            "upload of {size} bytes at offset {offset} is not {align}-byte aligned"
        )));
    }
    match offset.checked_add(size) {
        Some(end) if end <= buffer_size => Ok(()),
        _ => Err(Error::Resource(format!(
            "upload of {size} bytes at offset {offset} overruns buffer of {buffer_size} bytes"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PassResourceBuilder, RenderPass};
    use umbra_core::{AccessFlags, StageFlags};

    #[test]
    fn in_bounds_aligned_upload_is_accepted() {
        assert!(check_range(64, 0, 64).is_ok());
        assert!(check_range(64, 16, 32).is_ok());
    }

    #[test]
    fn overrun_is_rejected() {
        assert!(matches!(check_range(64, 48, 32), Err(Error::Resource(_))));
        assert!(matches!(check_range(64, u64::MAX - 3, 4), Err(Error::Resource(_))));
    }

    #[test]
    fn misaligned_upload_is_rejected() {
        assert!(matches!(check_range(64, 2, 4), Err(Error::Resource(_))));
        assert!(matches!(check_range(64, 0, 6), Err(Error::Resource(_))));
    }

    const UNIFORMS: ResourceHandle = ResourceHandle::named("uniforms");

    fn record(after: ResourceAccess) -> UploadRecord {
        UploadRecord {
            resource: Some(UNIFORMS),
            offset: 0,
            size: 16,
            barriers: vec![
                Barrier {
                    before: ResourceAccess::UNIFORM_ALL,
                    after: ResourceAccess::UPLOAD,
                },
                Barrier {
                    before: ResourceAccess::UPLOAD,
                    after,
                },
            ],
        }
    }

    struct ComputeReader;

    impl RenderPass for ComputeReader {
        fn name(&self) -> &str {
            "compute_reader"
        }

        fn declare_resources(&self, builder: &mut PassResourceBuilder) {
            builder.read(UNIFORMS, ResourceAccess::new(AccessFlags::UNIFORM_READ, StageFlags::COMPUTE));
        }
    }

    fn graph() -> RenderGraph {
        let mut graph = RenderGraph::new();
        graph.import(UNIFORMS, ResourceAccess::UPLOAD);
        graph.add_pass(&ComputeReader);
        graph.build().unwrap();
        graph
    }

    #[test]
    fn records_matching_the_graph_pass() {
        assert!(check_records(&[record(ResourceAccess::UNIFORM_ALL)], &graph()).is_ok());
    }

    #[test]
    fn record_left_in_the_wrong_state_fails() {
        let records = [record(ResourceAccess::VERTEX_STORAGE_READ)];
        assert!(matches!(
            check_records(&records, &graph()),
            Err(Error::Graph(msg)) if msg.contains("compute_reader")
        ));
    }

    #[test]
    fn unnamed_records_are_not_checked() {
        let mut unnamed = record(ResourceAccess::VERTEX_STORAGE_READ);
        unnamed.resource = None;
        assert!(check_records(&[unnamed], &graph()).is_ok());
    }
}
