//! WGSL sources for the built-in passes
//!
//! Each shader is assembled from shared chunks plus its own file. Constants
//! such as the tile size are not written in the sources; the pipeline cache
//! prepends them as `const` declarations from [`ShaderDefines`](crate::pipeline::ShaderDefines).

const COMMON: &str = include_str!("common.wgsl");
const FULLSCREEN: &str = include_str!("fullscreen.wgsl");

/// A shader assembled from one or more WGSL chunks.
#[derive(Debug, Clone, Copy)]
pub struct ShaderSource {
    pub id: &'static str,
    pub chunks: &'static [&'static str],
}

impl ShaderSource {
    /// Concatenates the chunks in order.
    pub fn assemble(&self) -> String {
        let mut source = String::with_capacity(self.chunks.iter().map(|c| c.len() + 1).sum());
        for chunk in self.chunks {
            source.push_str(chunk);
            source.push('\n');
        }
        source
    }
}

pub const TILE_FRUSTUM: ShaderSource = ShaderSource {
    id: "tile_frustum",
    chunks: &[COMMON, include_str!("tile_frustum.wgsl")],
};

pub const GBUFFER: ShaderSource = ShaderSource {
    id: "gbuffer",
    chunks: &[include_str!("gbuffer.wgsl")],
};

pub const LIGHT_CULL: ShaderSource = ShaderSource {
    id: "light_cull",
    chunks: &[COMMON, include_str!("light_cull.wgsl")],
};

pub const SSAO: ShaderSource = ShaderSource {
    id: "ssao",
    chunks: &[FULLSCREEN, include_str!("ssao.wgsl")],
};

pub const LIGHTING: ShaderSource = ShaderSource {
    id: "lighting",
    chunks: &[COMMON, FULLSCREEN, include_str!("lighting.wgsl")],
};

pub const PRESENT: ShaderSource = ShaderSource {
    id: "present",
    chunks: &[FULLSCREEN, include_str!("present.wgsl")],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_chunks_come_first() {
        let source = LIGHTING.assemble();
        let common = source.find("struct PointLight").unwrap();
        let fullscreen = source.find("fn vs_fullscreen").unwrap();
        let body = source.find("fn fs_main").unwrap();
        assert!(common < fullscreen && fullscreen < body);
    }

    #[test]
    fn cull_shader_uses_injected_constants() {
        let source = LIGHT_CULL.assemble();
        assert!(source.contains("array<u32, MAX_LIGHTS_PER_TILE>"));
        assert!(source.contains("TILE_SIZE"));
        assert!(!source.contains("const TILE_SIZE"));
    }
}
