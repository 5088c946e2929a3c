//! Built-in render passes
//!
//! Each pass owns its pipeline and declares its resource accesses through
//! [`RenderPass`](crate::graph::RenderPass); recording goes through the
//! pass's own typed method so bind groups and targets are checked by the
//! compiler rather than looked up by name.

pub mod gbuffer;
pub mod light_cull;
pub mod lighting;
pub mod present;
pub mod ssao;
pub mod tile_frustum;

pub use gbuffer::GBufferPass;
pub use light_cull::LightCullPass;
pub use lighting::LightingPass;
pub use present::PresentPass;
pub use ssao::SsaoPass;
pub use tile_frustum::{FrustumParams, TileFrustumPass};
