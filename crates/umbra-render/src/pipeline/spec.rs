//! Compile-time constants injected into WGSL

use std::collections::BTreeMap;
use std::fmt::Write;

/// Ordered set of `u32` shader constants.
///
/// Ordered so the generated prelude, and with it the cache key, does not
/// depend on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines(BTreeMap<&'static str, u32>);

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any earlier value.
    pub fn with(mut self, name: &'static str, value: u32) -> Self {
        self.0.insert(name, value);
        self
    }

    /// Constants every built-in shader may reference.
    pub fn standard() -> Self {
        Self::new()
            .with("TILE_SIZE", umbra_core::TILE_SIZE_IN_PIXELS)
            .with("MAX_LIGHTS_PER_TILE", umbra_core::MAX_LIGHTS_PER_TILE)
            .with("SSAO_KERNEL_SIZE", umbra_core::SSAO_KERNEL_SIZE as u32)
            .with("SSAO_NOISE_SIZE", umbra_core::SSAO_NOISE_SIZE as u32)
    }

    /// WGSL `const` declarations for every define.
    pub fn prelude(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            // Writing into a String cannot fail.
            let _ = writeln!(out, "const {name}: u32 = {value}u;");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_is_sorted() {
        let defines = ShaderDefines::new().with("RADIUS", 4).with("COUNT", 64);
        assert_eq!(defines.prelude(), "const COUNT: u32 = 64u;\nconst RADIUS: u32 = 4u;\n");
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let defines = ShaderDefines::standard().with("MAX_LIGHTS_PER_TILE", 16);
        let prelude = defines.prelude();
        assert!(prelude.contains("const MAX_LIGHTS_PER_TILE: u32 = 16u;"));
        assert!(!prelude.contains("1024u"));
    }

    #[test]
    fn standard_defines_cover_the_tile_constants() {
        let prelude = ShaderDefines::standard().prelude();
        assert!(prelude.contains("const TILE_SIZE: u32 = 8u;"));
        assert!(prelude.contains("const MAX_LIGHTS_PER_TILE: u32 = 1024u;"));
        assert!(prelude.contains("const SSAO_KERNEL_SIZE: u32 = 64u;"));
    }
}
