//! Access and pipeline-stage vocabulary for resource hazards.
//!
//! wgpu tracks hazards itself, but the frame is still described in terms of
//! who writes what, where, and who reads it afterwards. The render graph
//! uses these declarations to order passes and to refuse frames where a
//! read has no producer.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const UNIFORM_READ = 1 << 0;
        const VERTEX_READ = 1 << 1;
        const INDEX_READ = 1 << 2;
        const SHADER_READ = 1 << 3;
        const SHADER_WRITE = 1 << 4;
        const COLOR_ATTACHMENT_WRITE = 1 << 5;
        const DEPTH_ATTACHMENT_READ = 1 << 6;
        const DEPTH_ATTACHMENT_WRITE = 1 << 7;
        const TRANSFER_READ = 1 << 8;
        const TRANSFER_WRITE = 1 << 9;
        const HOST_WRITE = 1 << 10;

        const WRITES = Self::SHADER_WRITE.bits()
            | Self::COLOR_ATTACHMENT_WRITE.bits()
            | Self::DEPTH_ATTACHMENT_WRITE.bits()
            | Self::TRANSFER_WRITE.bits()
            | Self::HOST_WRITE.bits();
    }
}

impl AccessFlags {
    pub fn is_write(self) -> bool {
        self.intersects(AccessFlags::WRITES)
    }

    pub fn is_read(self) -> bool {
        !self.difference(AccessFlags::WRITES).is_empty()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const HOST = 1 << 1;
        const TRANSFER = 1 << 2;
        const VERTEX = 1 << 3;
        const EARLY_FRAGMENT_TESTS = 1 << 4;
        const FRAGMENT = 1 << 5;
        const LATE_FRAGMENT_TESTS = 1 << 6;
        const COLOR_OUTPUT = 1 << 7;
        const COMPUTE = 1 << 8;
    }
}

/// One side of a transition: how a resource is touched and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceAccess {
    pub access: AccessFlags,
    pub stage: StageFlags,
}

impl ResourceAccess {
    pub const fn new(access: AccessFlags, stage: StageFlags) -> Self {
        Self { access, stage }
    }

    /// Nothing has touched the resource yet.
    pub const NONE: Self = Self::new(AccessFlags::empty(), StageFlags::TOP_OF_PIPE);

    pub const UPLOAD: Self = Self::new(AccessFlags::TRANSFER_WRITE, StageFlags::TRANSFER);
    pub const CLEAR: Self = Self::new(AccessFlags::TRANSFER_WRITE, StageFlags::TRANSFER);
    pub const UNIFORM_ALL: Self = Self::new(
        AccessFlags::UNIFORM_READ,
        StageFlags::VERTEX.union(StageFlags::FRAGMENT).union(StageFlags::COMPUTE),
    );
    pub const VERTEX_STORAGE_READ: Self = Self::new(AccessFlags::SHADER_READ, StageFlags::VERTEX);
    pub const COMPUTE_READ: Self = Self::new(AccessFlags::SHADER_READ, StageFlags::COMPUTE);
    pub const COMPUTE_WRITE: Self = Self::new(AccessFlags::SHADER_WRITE, StageFlags::COMPUTE);
    pub const COMPUTE_READ_WRITE: Self = Self::new(
        AccessFlags::SHADER_READ.union(AccessFlags::SHADER_WRITE),
        StageFlags::COMPUTE,
    );
    pub const FRAGMENT_READ: Self = Self::new(AccessFlags::SHADER_READ, StageFlags::FRAGMENT);
    pub const COLOR_WRITE: Self = Self::new(AccessFlags::COLOR_ATTACHMENT_WRITE, StageFlags::COLOR_OUTPUT);
    pub const DEPTH_WRITE: Self = Self::new(
        AccessFlags::DEPTH_ATTACHMENT_READ.union(AccessFlags::DEPTH_ATTACHMENT_WRITE),
        StageFlags::EARLY_FRAGMENT_TESTS.union(StageFlags::LATE_FRAGMENT_TESTS),
    );

    pub fn is_write(&self) -> bool {
        self.access.is_write()
    }
}

/// Execution and memory dependency between two accesses of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Barrier {
    pub before: ResourceAccess,
    pub after: ResourceAccess,
}

impl Barrier {
    /// Barrier needed between `before` and `after`, if any. Read-after-read
    /// needs none.
    pub fn between(before: ResourceAccess, after: ResourceAccess) -> Option<Self> {
        if !before.is_write() && !after.is_write() {
            return None;
        }
        Some(Self { before, after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_after_read_needs_no_barrier() {
        assert!(Barrier::between(ResourceAccess::COMPUTE_READ, ResourceAccess::FRAGMENT_READ).is_none());
    }

    #[test]
    fn compute_write_then_fragment_read() {
        let barrier = Barrier::between(ResourceAccess::COMPUTE_WRITE, ResourceAccess::FRAGMENT_READ).unwrap();
        assert_eq!(barrier.before.stage, StageFlags::COMPUTE);
        assert_eq!(barrier.after.access, AccessFlags::SHADER_READ);
        assert_eq!(barrier.after.stage, StageFlags::FRAGMENT);
    }

    #[test]
    fn write_classification() {
        assert!(ResourceAccess::DEPTH_WRITE.is_write());
        assert!(ResourceAccess::DEPTH_WRITE.access.is_read());
        assert!(ResourceAccess::COMPUTE_READ_WRITE.access.is_read());
        assert!(!ResourceAccess::UNIFORM_ALL.is_write());
        assert!(!AccessFlags::TRANSFER_WRITE.is_read());
    }
}
