//! Pipeline management system

mod cache;
mod spec;

pub use cache::{PipelineCache, RenderPipelineDesc};
pub use spec::ShaderDefines;
