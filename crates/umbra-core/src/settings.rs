//! Renderer configuration, loadable from RON.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::{MAX_LIGHTS_PER_TILE, MAX_POINT_LIGHTS};

bitflags! {
    /// Runtime toggles for optional parts of the frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RenderFeatures: u32 {
        const SSAO = 1 << 0;
        const TRANSPARENT_LIGHT_LIST = 1 << 1;
    }
}

impl Default for RenderFeatures {
    fn default() -> Self {
        RenderFeatures::all()
    }
}

/// Frame structure selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RendererVariant {
    Forward,
    Deferred,
    #[default]
    TiledDeferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SsaoMode {
    #[default]
    Hemisphere,
    /// Horizon-based occlusion. Declared so configs can name it; not built.
    Horizon,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    pub mode: SsaoMode,
    pub radius: f32,
    pub bias: f32,
    pub kernel_seed: u64,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            mode: SsaoMode::Hemisphere,
            radius: 0.25,
            bias: 1e-7,
            kernel_seed: 0x5a0,
        }
    }
}

/// Capacities of the per-frame scene lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneLimits {
    pub max_point_lights: usize,
    pub max_instances: usize,
    pub max_meshes: usize,
    /// Per-tile cap of each light list, at most [`MAX_LIGHTS_PER_TILE`].
    pub max_lights_per_tile: u32,
}

impl Default for SceneLimits {
    fn default() -> Self {
        Self {
            max_point_lights: MAX_POINT_LIGHTS,
            max_instances: 1000,
            max_meshes: 100,
            max_lights_per_tile: MAX_LIGHTS_PER_TILE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub variant: RendererVariant,
    pub features: RenderFeatures,
    pub ssao: SsaoSettings,
    pub limits: SceneLimits,
    pub frames_in_flight: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            variant: RendererVariant::TiledDeferred,
            features: RenderFeatures::default(),
            ssao: SsaoSettings::default(),
            limits: SceneLimits::default(),
            frames_in_flight: 2,
        }
    }
}

impl RenderSettings {
    /// Rejects settings the renderer cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::Unsupported("zero frames in flight".into()));
        }
        if self.limits.max_point_lights > MAX_POINT_LIGHTS {
            return Err(Error::CapacityExceeded {
                what: "point lights",
                capacity: MAX_POINT_LIGHTS,
            });
        }
        if self.limits.max_lights_per_tile == 0 {
            return Err(Error::Unsupported("zero lights per tile".into()));
        }
        if self.limits.max_lights_per_tile > MAX_LIGHTS_PER_TILE {
            return Err(Error::CapacityExceeded {
                what: "lights per tile",
                capacity: MAX_LIGHTS_PER_TILE as usize,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.variant, RendererVariant::TiledDeferred);
        assert_eq!(settings.ssao.radius, 0.25);
        assert_eq!(settings.ssao.bias, 1e-7);
        assert_eq!(settings.limits.max_point_lights, 1000);
        assert!(settings.features.contains(RenderFeatures::SSAO));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn validation() {
        let mut settings = RenderSettings {
            frames_in_flight: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        settings.frames_in_flight = 3;
        settings.limits.max_point_lights = 5000;
        assert!(matches!(settings.validate(), Err(Error::CapacityExceeded { .. })));
    }

    #[test]
    fn per_tile_cap_is_bounded() {
        let mut settings = RenderSettings::default();
        assert_eq!(settings.limits.max_lights_per_tile, MAX_LIGHTS_PER_TILE);

        settings.limits.max_lights_per_tile = 16;
        assert!(settings.validate().is_ok());

        settings.limits.max_lights_per_tile = 0;
        assert!(matches!(settings.validate(), Err(Error::Unsupported(_))));

        settings.limits.max_lights_per_tile = MAX_LIGHTS_PER_TILE + 1;
        assert!(matches!(
            settings.validate(),
            Err(Error::CapacityExceeded {
                what: "lights per tile",
                ..
            })
        ));
    }
}
