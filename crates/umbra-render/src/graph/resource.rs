//! Resource identity for the graph

use std::fmt;

/// Pass identifier
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PassId(pub usize);

/// Resource handle for graph resources, named for readable errors
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct ResourceHandle(&'static str);

impl ResourceHandle {
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.0)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Well-known resources of the tiled deferred frame.
pub mod names {
    use super::ResourceHandle;

    pub const SCENE_GLOBALS: ResourceHandle = ResourceHandle::named("scene_globals");
    pub const DIRECTIONAL_LIGHT: ResourceHandle = ResourceHandle::named("directional_light");
    pub const POINT_LIGHTS: ResourceHandle = ResourceHandle::named("point_lights");
    pub const INSTANCES: ResourceHandle = ResourceHandle::named("instances");
    pub const OPAQUE_CULL_UNIFORMS: ResourceHandle = ResourceHandle::named("opaque_cull_uniforms");
    pub const TRANSPARENT_CULL_UNIFORMS: ResourceHandle = ResourceHandle::named("transparent_cull_uniforms");
    pub const SSAO_UNIFORMS: ResourceHandle = ResourceHandle::named("ssao_uniforms");
    pub const FRUSTUM_PARAMS: ResourceHandle = ResourceHandle::named("frustum_params");
    pub const TILE_FRUSTUMS: ResourceHandle = ResourceHandle::named("tile_frustums");

    pub const GBUFFER_POSITION: ResourceHandle = ResourceHandle::named("gbuffer_position");
    pub const GBUFFER_NORMAL: ResourceHandle = ResourceHandle::named("gbuffer_normal");
    pub const GBUFFER_ALBEDO: ResourceHandle = ResourceHandle::named("gbuffer_albedo");
    pub const DEPTH: ResourceHandle = ResourceHandle::named("depth");

    pub const OPAQUE_LIGHT_INDICES: ResourceHandle = ResourceHandle::named("opaque_light_indices");
    pub const OPAQUE_LIGHT_COUNTER: ResourceHandle = ResourceHandle::named("opaque_light_counter");
    pub const OPAQUE_LIGHT_GRID: ResourceHandle = ResourceHandle::named("opaque_light_grid");
    pub const TRANSPARENT_LIGHT_INDICES: ResourceHandle = ResourceHandle::named("transparent_light_indices");
    pub const TRANSPARENT_LIGHT_COUNTER: ResourceHandle = ResourceHandle::named("transparent_light_counter");
    pub const TRANSPARENT_LIGHT_GRID: ResourceHandle = ResourceHandle::named("transparent_light_grid");

    pub const OCCLUSION: ResourceHandle = ResourceHandle::named("occlusion");
    pub const RESOLVED: ResourceHandle = ResourceHandle::named("resolved");
    pub const OUTPUT: ResourceHandle = ResourceHandle::named("output");
}
