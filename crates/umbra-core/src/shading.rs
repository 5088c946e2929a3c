//! Reference lighting resolve, one pixel at a time.

use glam::{UVec2, Vec3};

use crate::culling::LightBins;
use crate::light::{GpuDirectionalLight, GpuPointLight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightListKind {
    Opaque,
    Transparent,
}

/// GBuffer contents at one pixel, view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
}

/// Light lists and light data a resolve reads from.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInputs<'a> {
    pub opaque: &'a LightBins,
    pub transparent: &'a LightBins,
    pub lights: &'a [GpuPointLight],
    pub directional: &'a GpuDirectionalLight,
}

/// `clamp(1 - d / max_distance, 0, 1)^2`
pub fn point_attenuation(distance: f32, max_distance: f32) -> f32 {
    let falloff = (1.0 - distance / max_distance).clamp(0.0, 1.0);
    falloff * falloff
}

/// Shades `surface` at `pixel` with the lights binned into its tile.
pub fn shade_pixel(
    inputs: &ResolveInputs<'_>,
    kind: LightListKind,
    pixel: UVec2,
    surface: &SurfaceSample,
    visibility: f32,
) -> Vec3 {
    let bins = match kind {
        LightListKind::Opaque => inputs.opaque,
        LightListKind::Transparent => inputs.transparent,
    };
    let tile = bins.grid.tile_of_pixel(pixel);
    let normal = surface.normal.normalize_or_zero();

    let mut color = Vec3::ZERO;
    for &index in bins.tile_lights(tile.x, tile.y) {
        let light = &inputs.lights[index as usize];
        let to_light = light.position() - surface.position;
        let distance = to_light.length();
        let l = to_light / distance.max(f32::EPSILON);
        let attenuation = point_attenuation(distance, light.max_distance);
        color += surface.albedo * light.color() * normal.dot(l).max(0.0) * attenuation;
    }

    let directional = inputs.directional;
    let direction = Vec3::from_array(directional.direction);
    color += surface.albedo * Vec3::from_array(directional.color) * normal.dot(-direction).max(0.0);
    color += surface.albedo * Vec3::from_array(directional.ambient) * visibility;
    color
}
