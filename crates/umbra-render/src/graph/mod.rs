//! Render graph with dependency ordering and barrier derivation
//!
//! Passes declare every resource access as an (access, stage) pair. Building
//! the graph orders passes so producers run before consumers, rejects reads
//! that nothing produces and dependency cycles, and derives the barrier each
//! hazard needs.

mod pass;
mod resource;

pub use pass::RenderPass;
pub use resource::{names, PassId, ResourceHandle};

use crate::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use umbra_core::{AccessFlags, Barrier, ResourceAccess};

/// Render graph for automatic pass ordering and hazard tracking
pub struct RenderGraph {
    passes: Vec<PassNode>,
    imports: HashMap<ResourceHandle, ResourceAccess>,
    execution_order: Vec<PassId>,
    barriers: Vec<GraphBarrier>,
}

struct PassNode {
    name: String,
    accesses: Vec<(ResourceHandle, ResourceAccess)>,
}

impl PassNode {
    fn reads(&self) -> impl Iterator<Item = &(ResourceHandle, ResourceAccess)> {
        self.accesses.iter().filter(|(_, a)| a.access.is_read())
    }

    fn writes(&self) -> impl Iterator<Item = &(ResourceHandle, ResourceAccess)> {
        self.accesses.iter().filter(|(_, a)| a.is_write())
    }
}

/// A barrier the graph derived between two accesses of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphBarrier {
    pub resource: ResourceHandle,
    /// `None` when the earlier access happened outside the graph (uploads).
    pub producer: Option<PassId>,
    pub consumer: PassId,
    pub barrier: Barrier,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            imports: HashMap::new(),
            execution_order: Vec::new(),
            barriers: Vec::new(),
        }
    }

    /// Declare a resource produced outside the graph, e.g. by an upload.
    pub fn import(&mut self, resource: ResourceHandle, last_access: ResourceAccess) {
        self.imports.insert(resource, last_access);
    }

    /// Add a pass to the graph
    pub fn add_pass(&mut self, pass: &dyn RenderPass) -> PassId {
        let id = PassId(self.passes.len());

        let mut builder = PassResourceBuilder::new();
        pass.declare_resources(&mut builder);

        self.passes.push(PassNode {
            name: pass.name().to_string(),
            accesses: builder.finish(),
        });
        id
    }

    /// Build the graph - resolve dependencies, order passes, derive barriers
    pub fn build(&mut self) -> Result<()> {
        log::info!("Building render graph with {} passes", self.passes.len());

        let mut writers: HashMap<ResourceHandle, Vec<usize>> = HashMap::new();
        for (i, pass) in self.passes.iter().enumerate() {
            for &(resource, _) in pass.writes() {
                writers.entry(resource).or_default().push(i);
            }
        }

        let mut dag: DiGraph<usize, ResourceHandle> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..self.passes.len()).map(|i| dag.add_node(i)).collect();

        for (i, pass) in self.passes.iter().enumerate() {
            for &(resource, _) in pass.reads() {
                let producers: Vec<usize> = writers
                    .get(&resource)
                    .map(|w| w.iter().copied().filter(|&w| w != i).collect())
                    .unwrap_or_default();

                if producers.is_empty() && !self.imports.contains_key(&resource) && !pass_writes(pass, resource) {
                    return Err(Error::Graph(format!(
                        "pass '{}' reads {} but no pass or upload produces it",
                        pass.name, resource
                    )));
                }
                for producer in producers {
                    dag.update_edge(nodes[producer], nodes[i], resource);
                }
            }
        }

        // Successive writers of one resource keep their registration order.
        for (&resource, list) in &writers {
            for pair in list.windows(2) {
                dag.update_edge(nodes[pair[0]], nodes[pair[1]], resource);
            }
        }

        if let Err(cycle) = petgraph::algo::toposort(&dag, None) {
            let pass = &self.passes[dag[cycle.node_id()]];
            return Err(Error::Graph(format!(
                "Cyclic dependency detected in render graph at pass '{}'",
                pass.name
            )));
        }

        // Kahn's algorithm, lowest registration index first, so independent
        // passes keep the order they were added in.
        let mut in_degree: Vec<usize> = nodes
            .iter()
            .map(|&n| dag.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> =
            (0..self.passes.len()).filter(|&i| in_degree[i] == 0).map(Reverse).collect();

        let mut order = Vec::with_capacity(self.passes.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(PassId(i));
            for next in dag.neighbors_directed(nodes[i], Direction::Outgoing) {
                let j = dag[next];
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.push(Reverse(j));
                }
            }
        }
        self.execution_order = order;

        for (i, id) in self.execution_order.iter().enumerate() {
            log::debug!("  Pass {}: {}", i, self.passes[id.0].name);
        }

        self.derive_barriers();

        log::info!(
            "Render graph built successfully ({} barriers)",
            self.barriers.len()
        );
        Ok(())
    }

    fn derive_barriers(&mut self) {
        let mut last_write: HashMap<ResourceHandle, (Option<PassId>, ResourceAccess)> = self
            .imports
            .iter()
            .map(|(&resource, &access)| (resource, (None, access)))
            .collect();
        let mut readers: HashMap<ResourceHandle, Vec<(PassId, ResourceAccess)>> = HashMap::new();
        let mut barriers = Vec::new();

        for &id in &self.execution_order {
            for &(resource, access) in &self.passes[id.0].accesses {
                let mut push = |producer: Option<PassId>, before: ResourceAccess| {
                    if let Some(barrier) = Barrier::between(before, access) {
                        barriers.push(GraphBarrier {
                            resource,
                            producer,
                            consumer: id,
                            barrier,
                        });
                    }
                };

                if access.is_write() {
                    match readers.remove(&resource) {
                        Some(earlier) if !earlier.is_empty() => {
                            for (reader, before) in earlier {
                                push(Some(reader), before);
                            }
                        }
                        _ => {
                            if let Some(&(producer, before)) = last_write.get(&resource) {
                                push(producer, before);
                            }
                        }
                    }
                    last_write.insert(resource, (Some(id), access));
                } else {
                    if let Some(&(producer, before)) = last_write.get(&resource) {
                        push(producer, before);
                    }
                    readers.entry(resource).or_default().push((id, access));
                }
            }
        }

        for b in &barriers {
            log::trace!(
                "  Barrier on {}: {:?} -> {:?}",
                b.resource,
                b.barrier.before,
                b.barrier.after
            );
        }
        self.barriers = barriers;
    }

    /// Passes in execution order. Empty until [`RenderGraph::build`] succeeds.
    pub fn execution_order(&self) -> &[PassId] {
        &self.execution_order
    }

    pub fn barriers(&self) -> &[GraphBarrier] {
        &self.barriers
    }

    /// The barrier guarding `consumer`'s access to `resource`, if one is needed.
    pub fn barrier_before(&self, consumer: PassId, resource: ResourceHandle) -> Option<&GraphBarrier> {
        self.barriers
            .iter()
            .find(|b| b.consumer == consumer && b.resource == resource)
    }

    pub fn pass_name(&self, id: PassId) -> &str {
        &self.passes[id.0].name
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Checks an upload's final access against the graph.
    ///
    /// `resource` must be imported, and `after` must cover every read the
    /// graph's passes make of it up to and including its first in-graph
    /// write.
    pub fn check_upload(&self, resource: ResourceHandle, after: ResourceAccess) -> Result<()> {
        if !self.imports.contains_key(&resource) {
            return Err(Error::Graph(format!("upload to {resource}, which the graph does not import")));
        }
        for &id in &self.execution_order {
            let pass = &self.passes[id.0];
            let Some(&(_, access)) = pass.accesses.iter().find(|(r, _)| *r == resource) else {
                continue;
            };
            let reads = access.access.difference(AccessFlags::WRITES);
            if !reads.is_empty() && !(after.access.contains(reads) && after.stage.contains(access.stage)) {
                return Err(Error::Graph(format!(
                    "upload leaves {} as {:?} but pass '{}' reads it as {:?}",
                    resource, after, pass.name, access
                )));
            }
            if access.is_write() {
                break;
            }
        }
        Ok(())
    }
}

fn pass_writes(pass: &PassNode, resource: ResourceHandle) -> bool {
    pass.writes().any(|&(r, _)| r == resource)
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for declaring pass resource dependencies
pub struct PassResourceBuilder {
    accesses: Vec<(ResourceHandle, ResourceAccess)>,
}

impl PassResourceBuilder {
    fn new() -> Self {
        Self { accesses: Vec::new() }
    }

    /// Declare that this pass reads a resource
    pub fn read(&mut self, resource: ResourceHandle, access: ResourceAccess) -> &mut Self {
        self.accesses.push((resource, access));
        self
    }

    /// Declare that this pass writes to a resource
    pub fn write(&mut self, resource: ResourceHandle, access: ResourceAccess) -> &mut Self {
        debug_assert!(access.is_write(), "write of {resource} declared with read-only access");
        self.accesses.push((resource, access));
        self
    }

    /// Merge repeated declarations of one resource into a single access.
    fn finish(self) -> Vec<(ResourceHandle, ResourceAccess)> {
        let mut merged: Vec<(ResourceHandle, ResourceAccess)> = Vec::with_capacity(self.accesses.len());
        for (resource, access) in self.accesses {
            match merged.iter_mut().find(|(r, _)| *r == resource) {
                Some((_, existing)) => {
                    existing.access |= access.access;
                    existing.stage |= access.stage;
                }
                None => merged.push((resource, access)),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::StageFlags;

    struct TestPass {
        name: &'static str,
        reads: Vec<(ResourceHandle, ResourceAccess)>,
        writes: Vec<(ResourceHandle, ResourceAccess)>,
    }

    impl TestPass {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                reads: Vec::new(),
                writes: Vec::new(),
            }
        }

        fn reads(mut self, resource: ResourceHandle, access: ResourceAccess) -> Self {
            self.reads.push((resource, access));
            self
        }

        fn writes(mut self, resource: ResourceHandle, access: ResourceAccess) -> Self {
            self.writes.push((resource, access));
            self
        }
    }

    impl RenderPass for TestPass {
        fn name(&self) -> &str {
            self.name
        }

        fn declare_resources(&self, builder: &mut PassResourceBuilder) {
            for &(r, a) in &self.reads {
                builder.read(r, a);
            }
            for &(r, a) in &self.writes {
                builder.write(r, a);
            }
        }
    }

    const A: ResourceHandle = ResourceHandle::named("a");
    const B: ResourceHandle = ResourceHandle::named("b");

    #[test]
    fn orders_consumer_after_producer() {
        let mut graph = RenderGraph::new();
        let consumer = graph.add_pass(&TestPass::new("consumer").reads(A, ResourceAccess::FRAGMENT_READ));
        let producer = graph.add_pass(&TestPass::new("producer").writes(A, ResourceAccess::COMPUTE_WRITE));
        graph.build().unwrap();
        assert_eq!(graph.execution_order(), &[producer, consumer]);
    }

    #[test]
    fn missing_producer_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(&TestPass::new("orphan").reads(A, ResourceAccess::COMPUTE_READ));
        let err = graph.build().unwrap_err();
        assert!(matches!(err, Error::Graph(msg) if msg.contains("orphan") && msg.contains("reads a")));
    }

    #[test]
    fn imported_resources_count_as_produced() {
        let mut graph = RenderGraph::new();
        graph.import(A, ResourceAccess::UPLOAD);
        let reader = graph.add_pass(&TestPass::new("reader").reads(A, ResourceAccess::COMPUTE_READ));
        graph.build().unwrap();

        let barrier = graph.barrier_before(reader, A).unwrap();
        assert_eq!(barrier.producer, None);
        assert_eq!(barrier.barrier.before, ResourceAccess::UPLOAD);
        assert_eq!(barrier.barrier.after, ResourceAccess::COMPUTE_READ);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(
            &TestPass::new("first")
                .reads(A, ResourceAccess::COMPUTE_READ)
                .writes(B, ResourceAccess::COMPUTE_WRITE),
        );
        graph.add_pass(
            &TestPass::new("second")
                .reads(B, ResourceAccess::COMPUTE_READ)
                .writes(A, ResourceAccess::COMPUTE_WRITE),
        );
        assert!(matches!(graph.build(), Err(Error::Graph(msg)) if msg.contains("Cyclic")));
    }

    #[test]
    fn compute_write_to_fragment_read_barrier() {
        let mut graph = RenderGraph::new();
        let cull = graph.add_pass(&TestPass::new("cull").writes(A, ResourceAccess::COMPUTE_WRITE));
        let resolve = graph.add_pass(&TestPass::new("resolve").reads(A, ResourceAccess::FRAGMENT_READ));
        graph.build().unwrap();

        let barrier = graph.barrier_before(resolve, A).unwrap();
        assert_eq!(barrier.producer, Some(cull));
        assert_eq!(barrier.barrier.before.access, AccessFlags::SHADER_WRITE);
        assert_eq!(barrier.barrier.before.stage, StageFlags::COMPUTE);
        assert_eq!(barrier.barrier.after.access, AccessFlags::SHADER_READ);
        assert_eq!(barrier.barrier.after.stage, StageFlags::FRAGMENT);
    }

    #[test]
    fn read_write_access_is_merged() {
        let mut graph = RenderGraph::new();
        graph.import(A, ResourceAccess::UPLOAD);
        let reader = graph.add_pass(&TestPass::new("reader").reads(A, ResourceAccess::FRAGMENT_READ));
        let rw = graph.add_pass(
            &TestPass::new("rw")
                .reads(A, ResourceAccess::COMPUTE_READ)
                .writes(A, ResourceAccess::COMPUTE_WRITE),
        );
        graph.build().unwrap();
        assert_eq!(graph.execution_order(), &[rw, reader]);

        let upload = graph.barrier_before(rw, A).unwrap();
        assert_eq!(upload.producer, None);
        assert_eq!(upload.barrier.after, ResourceAccess::COMPUTE_READ_WRITE);

        let read = graph.barrier_before(reader, A).unwrap();
        assert_eq!(read.producer, Some(rw));
        assert_eq!(read.barrier.before, ResourceAccess::COMPUTE_READ_WRITE);
    }

    #[test]
    fn upload_covering_every_reader_is_accepted() {
        let mut graph = RenderGraph::new();
        graph.import(A, ResourceAccess::UPLOAD);
        graph.add_pass(&TestPass::new("cull").reads(A, ResourceAccess::COMPUTE_READ));
        graph.add_pass(&TestPass::new("resolve").reads(A, ResourceAccess::FRAGMENT_READ));
        graph.build().unwrap();

        let both = ResourceAccess::new(AccessFlags::SHADER_READ, StageFlags::COMPUTE | StageFlags::FRAGMENT);
        assert!(graph.check_upload(A, both).is_ok());
    }

    #[test]
    fn upload_missing_a_reader_stage_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.import(A, ResourceAccess::UPLOAD);
        graph.add_pass(&TestPass::new("cull").reads(A, ResourceAccess::COMPUTE_READ));
        graph.add_pass(&TestPass::new("resolve").reads(A, ResourceAccess::FRAGMENT_READ));
        graph.build().unwrap();

        let err = graph.check_upload(A, ResourceAccess::COMPUTE_READ).unwrap_err();
        assert!(matches!(err, Error::Graph(msg) if msg.contains("resolve")));

        let err = graph.check_upload(A, ResourceAccess::UNIFORM_ALL).unwrap_err();
        assert!(matches!(err, Error::Graph(msg) if msg.contains("cull")));
    }

    #[test]
    fn upload_to_unimported_resource_is_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(&TestPass::new("writer").writes(A, ResourceAccess::COMPUTE_WRITE));
        graph.build().unwrap();
        assert!(matches!(
            graph.check_upload(A, ResourceAccess::COMPUTE_READ),
            Err(Error::Graph(msg)) if msg.contains("does not import")
        ));
    }

    #[test]
    fn reads_after_an_overwrite_are_not_checked() {
        let mut graph = RenderGraph::new();
        graph.import(A, ResourceAccess::UPLOAD);
        graph.add_pass(&TestPass::new("overwrite").writes(A, ResourceAccess::COMPUTE_WRITE));
        graph.add_pass(&TestPass::new("later").reads(A, ResourceAccess::FRAGMENT_READ));
        graph.build().unwrap();
        assert!(graph.check_upload(A, ResourceAccess::COMPUTE_READ).is_ok());
    }
}
