//! Hemisphere SSAO kernel and a CPU reference of the per-pixel term.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::settings::{SsaoMode, SsaoSettings};
use crate::{SSAO_KERNEL_SIZE, SSAO_NOISE_SIZE};

/// Sample offsets in tangent space plus the 4x4 rotation table.
#[derive(Debug, Clone, PartialEq)]
pub struct SsaoKernel {
    pub samples: [Vec4; SSAO_KERNEL_SIZE],
    pub noise: [Vec4; SSAO_NOISE_SIZE],
}

impl SsaoKernel {
    /// Generates the kernel for `settings`, reproducible for a given seed.
    pub fn new(settings: &SsaoSettings) -> Result<Self> {
        if settings.mode != SsaoMode::Hemisphere {
            return Err(Error::Unsupported(format!("SSAO mode {:?}", settings.mode)));
        }
        Ok(Self::hemisphere(settings.kernel_seed))
    }

    pub fn hemisphere(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let mut samples = [Vec4::ZERO; SSAO_KERNEL_SIZE];
        for (i, sample) in samples.iter_mut().enumerate() {
            let direction = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(0.05..=1.0),
            )
            .normalize();
            let t = i as f32 / SSAO_KERNEL_SIZE as f32;
            // Cluster samples close to the origin.
            let scale = 0.1 + (1.0 - 0.1) * t * t;
            *sample = (direction * rng.gen_range(0.0..=1.0f32) * scale).extend(0.0);
        }

        let mut noise = [Vec4::ZERO; SSAO_NOISE_SIZE];
        for rotation in noise.iter_mut() {
            *rotation = Vec4::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), 0.0, 0.0);
        }

        Self { samples, noise }
    }

    /// Rotation vector used for `pixel`.
    pub fn rotation(&self, pixel: UVec2) -> Vec3 {
        self.noise[((pixel.y % 4) * 4 + pixel.x % 4) as usize].xyz()
    }

    /// Visibility for one pixel: `1 - occluded / 64`.
    ///
    /// `depth_at` returns the stored depth-buffer value of a texel; texel
    /// coordinates are already clamped to `screen`.
    pub fn visibility(
        &self,
        pixel: UVec2,
        position: Vec3,
        normal: Vec3,
        projection: &Mat4,
        screen: UVec2,
        settings: &SsaoSettings,
        depth_at: impl Fn(UVec2) -> f32,
    ) -> f32 {
        let rotation = self.rotation(pixel);
        let tangent = (rotation - normal * rotation.dot(normal)).normalize_or_zero();
        let tangent = if tangent == Vec3::ZERO {
            normal.any_orthonormal_vector()
        } else {
            tangent
        };
        let tbn = Mat3::from_cols(tangent, normal.cross(tangent), normal);

        let max_texel = screen.as_vec2() - 1.0;
        let mut occluded = 0u32;
        for offset in &self.samples {
            let sample = position + settings.radius * (tbn * offset.xyz());
            let clip = *projection * sample.extend(1.0);
            let ndc = clip.xyz() / clip.w;
            let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
            let texel = (uv * screen.as_vec2()).clamp(Vec2::ZERO, max_texel).as_uvec2();
            if ndc.z > depth_at(texel) + settings.bias {
                occluded += 1;
            }
        }
        1.0 - occluded as f32 / SSAO_KERNEL_SIZE as f32
    }

    pub fn uniforms(&self, projection: Mat4, screen: UVec2, settings: &SsaoSettings) -> SsaoUniforms {
        SsaoUniforms {
            projection,
            samples: self.samples.map(|s| s.to_array()),
            noise: self.noise.map(|n| n.to_array()),
            screen_size: screen.as_vec2().to_array(),
            radius: settings.radius,
            bias: settings.bias,
        }
    }
}

/// Uniform block of the SSAO pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SsaoUniforms {
    pub projection: Mat4,
    pub samples: [[f32; 4]; SSAO_KERNEL_SIZE],
    pub noise: [[f32; 4]; SSAO_NOISE_SIZE],
    pub screen_size: [f32; 2],
    pub radius: f32,
    pub bias: f32,
}
