//! Scene as the renderer sees it: camera, instances, lights and meshes

use crate::mesh::GpuMesh;
use crate::Result;
use umbra_core::mesh::create_sphere_mesh;
use umbra_core::{Camera, CappedVec, Mesh, MeshId, SceneDescription, SceneLimits};

/// Everything one frame draws.
///
/// Instances reference meshes by [`MeshId`], an index into `meshes`.
pub struct RenderScene {
    pub camera: Camera,
    pub description: SceneDescription,
    pub meshes: CappedVec<GpuMesh>,
}

impl RenderScene {
    pub fn new(limits: &SceneLimits, camera: Camera) -> Self {
        Self {
            camera,
            description: SceneDescription::new(limits),
            meshes: CappedVec::new("meshes", limits.max_meshes),
        }
    }

    pub fn add_mesh(&mut self, device: &wgpu::Device, mesh: &Mesh) -> Result<MeshId> {
        let gpu = GpuMesh::new(device, mesh)?;
        let index = self.meshes.push(gpu)?;
        Ok(MeshId(index as u32))
    }

    pub fn mesh(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(id.0 as usize)
    }

    /// Spheres, five coloured point lights and a dim directional light,
    /// seen from the demo camera.
    pub fn demo(device: &wgpu::Device, limits: &SceneLimits, width: u32, height: u32) -> Result<Self> {
        let mut scene = Self::new(limits, Camera::demo(width, height));
        let sphere = scene.add_mesh(device, &create_sphere_mesh(1.0, 64, 64))?;
        scene.description.populate_demo(sphere)?;
        log::info!(
            "Demo scene: {} instances, {} point lights",
            scene.description.instances.len(),
            scene.description.point_lights.len()
        );
        Ok(scene)
    }
}
