//! Light types and their GPU layouts.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// An omnidirectional light with a hard cutoff at `max_distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub max_distance: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, max_distance: f32) -> Self {
        Self {
            position,
            color,
            max_distance,
        }
    }

    /// Moves the light into view space for upload.
    pub fn to_gpu(&self, view: &Mat4) -> GpuPointLight {
        GpuPointLight {
            position: view.transform_point3(self.position).to_array(),
            max_distance: self.max_distance,
            color: self.color.to_array(),
            _pad: 0.0,
        }
    }
}

/// View-space point light as stored in the light storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub max_distance: f32,
    pub color: [f32; 3],
    pub _pad: f32,
}

impl GpuPointLight {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_array(self.color)
    }
}

/// The single scene-wide directional light. Never binned into tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in, world space.
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::Z,
            color: Vec3::splat(0.3),
            ambient: Vec3::ZERO,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, ambient: Vec3) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
            ambient,
        }
    }

    pub fn to_gpu(&self, view: &Mat4) -> GpuDirectionalLight {
        GpuDirectionalLight {
            direction: view.transform_vector3(self.direction).normalize_or_zero().to_array(),
            _pad0: 0.0,
            color: self.color.to_array(),
            _pad1: 0.0,
            ambient: self.ambient.to_array(),
            _pad2: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuDirectionalLight {
    pub direction: [f32; 3],
    pub _pad0: f32,
    pub color: [f32; 3],
    pub _pad1: f32,
    pub ambient: [f32; 3],
    pub _pad2: f32,
}

/// Per-frame scene uniform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneGlobals {
    pub camera_position: [f32; 3],
    pub point_light_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gpu_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<GpuPointLight>(), 32);
        assert_eq!(std::mem::size_of::<GpuDirectionalLight>(), 48);
        assert_eq!(std::mem::size_of::<SceneGlobals>(), 16);
    }

    #[test]
    fn point_light_moves_into_view_space() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let light = PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0).to_gpu(&view);
        assert_relative_eq!(light.position(), Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);
        assert_eq!(light.max_distance, 1.0);
    }

    #[test]
    fn directional_light_ignores_translation() {
        let view = Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0));
        let light = DirectionalLight::new(Vec3::new(0.0, 0.0, 2.0), Vec3::ONE, Vec3::ZERO);
        assert_relative_eq!(
            Vec3::from_array(light.to_gpu(&view).direction),
            Vec3::Z,
            epsilon = 1e-6
        );
    }
}
