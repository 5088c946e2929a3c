//! Render pass trait

use super::PassResourceBuilder;

/// Implemented by every pass that takes part in the frame graph.
///
/// Passes only *declare* here; recording happens through each pass's own
/// typed entry point, called by the renderer in graph order.
pub trait RenderPass {
    /// Unique name for this pass
    fn name(&self) -> &str;

    /// Declare every resource this pass touches, with how and where.
    ///
    /// Called once when the graph is built.
    fn declare_resources(&self, builder: &mut PassResourceBuilder);
}
