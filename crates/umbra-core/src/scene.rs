use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::capped::CappedVec;
use crate::error::Result;
use crate::light::{DirectionalLight, GpuPointLight, PointLight};
use crate::settings::SceneLimits;

/// Index into the renderer's mesh table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInstance {
    pub mesh: MeshId,
    pub transform: Mat4,
}

/// Per-instance transforms consumed by the GBuffer vertex shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransforms {
    pub world_view: Mat4,
    pub world_view_proj: Mat4,
}

/// What gets drawn and lit this frame. Rebuilt by the caller every frame.
#[derive(Debug, Clone)]
pub struct SceneDescription {
    pub instances: CappedVec<SceneInstance>,
    pub point_lights: CappedVec<PointLight>,
    pub directional: DirectionalLight,
}

impl SceneDescription {
    pub fn new(limits: &SceneLimits) -> Self {
        Self {
            instances: CappedVec::new("opaque instances", limits.max_instances),
            point_lights: CappedVec::new("point lights", limits.max_point_lights),
            directional: DirectionalLight::default(),
        }
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.point_lights.clear();
    }

    pub fn add_instance(&mut self, mesh: MeshId, transform: Mat4) -> Result<usize> {
        self.instances.push(SceneInstance { mesh, transform })
    }

    pub fn add_point_light(&mut self, position: Vec3, color: Vec3, max_distance: f32) -> Result<usize> {
        self.point_lights
            .push(PointLight::new(position, color, max_distance))
    }

    pub fn set_directional_light(&mut self, direction: Vec3, color: Vec3, ambient: Vec3) {
        self.directional = DirectionalLight::new(direction, color, ambient);
    }

    /// 3x3x3 spheres, five coloured lights and a dim directional light.
    pub fn populate_demo(&mut self, sphere: MeshId) -> Result<()> {
        self.clear();
        for z in -1..=1 {
            for y in -1..=1 {
                for x in -1..=1 {
                    let transform = Mat4::from_translation(Vec3::new(x as f32, y as f32, z as f32))
                        * Mat4::from_scale(Vec3::splat(0.25));
                    self.add_instance(sphere, transform)?;
                }
            }
        }

        self.add_point_light(Vec3::new(0.0, 0.0, -1.0), Vec3::new(1.0, 0.0, 0.0), 1.0)?;
        self.add_point_light(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), 1.0)?;
        self.add_point_light(Vec3::new(0.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 1.0), 1.0)?;
        self.add_point_light(Vec3::new(0.0, -1.0, 1.0), Vec3::new(0.0, 1.0, 1.0), 1.0)?;
        self.add_point_light(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0), 1.0)?;

        self.set_directional_light(Vec3::Z, Vec3::splat(0.3), Vec3::ZERO);
        Ok(())
    }

    pub fn instance_transforms(&self, view: &Mat4, projection: &Mat4) -> Vec<InstanceTransforms> {
        self.instances
            .iter()
            .map(|instance| {
                let world_view = *view * instance.transform;
                InstanceTransforms {
                    world_view,
                    world_view_proj: *projection * world_view,
                }
            })
            .collect()
    }

    /// Point lights moved to view space, in upload order.
    pub fn view_space_lights(&self, view: &Mat4) -> Vec<GpuPointLight> {
        self.point_lights.iter().map(|light| light.to_gpu(view)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn demo_population() {
        let mut scene = SceneDescription::new(&SceneLimits::default());
        scene.populate_demo(MeshId(0)).unwrap();
        assert_eq!(scene.instances.len(), 27);
        assert_eq!(scene.point_lights.len(), 5);
        assert_eq!(scene.directional.direction, Vec3::Z);

        // Populating again replaces rather than appends.
        scene.populate_demo(MeshId(0)).unwrap();
        assert_eq!(scene.instances.len(), 27);
    }

    #[test]
    fn light_capacity_is_enforced() {
        let limits = SceneLimits {
            max_point_lights: 3,
            ..SceneLimits::default()
        };
        let mut scene = SceneDescription::new(&limits);
        assert!(matches!(
            scene.populate_demo(MeshId(0)),
            Err(Error::CapacityExceeded { what: "point lights", capacity: 3 })
        ));
        assert_eq!(scene.point_lights.len(), 3);
    }

    #[test]
    fn transforms_compose_view_and_projection() {
        let mut scene = SceneDescription::new(&SceneLimits::default());
        scene
            .add_instance(MeshId(1), Mat4::from_translation(Vec3::X))
            .unwrap();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 10.0);
        let transforms = scene.instance_transforms(&view, &projection);
        assert_eq!(transforms.len(), 1);
        assert_eq!(
            transforms[0].world_view.transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 0.0, -5.0)
        );
        assert_eq!(transforms[0].world_view_proj, projection * transforms[0].world_view);
    }
}
