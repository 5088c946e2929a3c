//! Procedural meshes.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};

/// Vertex layout shared by every mesh: position, snorm8x4 normal, uv.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PackedVertex {
    pub position: [f32; 3],
    pub normal: u32,
    pub tex_coords: [f32; 2],
}

impl PackedVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal: pack_snorm(normal[0], normal[1], normal[2], 0.0),
            tex_coords,
        }
    }

    pub fn unpacked_normal(&self) -> [f32; 3] {
        let component = |shift: u32| ((self.normal >> shift) as u8 as i8) as f32 / 127.0;
        [component(0), component(8), component(16)]
    }
}

fn pack_snorm(x: f32, y: f32, z: f32, w: f32) -> u32 {
    let to_snorm = |v: f32| ((v.clamp(-1.0, 1.0) * 127.0).round() as i8) as u8;
    (to_snorm(x) as u32)
        | ((to_snorm(y) as u32) << 8)
        | ((to_snorm(z) as u32) << 16)
        | ((to_snorm(w) as u32) << 24)
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<PackedVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// Unit quad in the XY plane facing +Z.
pub fn create_quad_mesh() -> Mesh {
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        PackedVertex::new([-0.5, -0.5, 0.0], n, [0.0, 1.0]),
        PackedVertex::new([0.5, -0.5, 0.0], n, [1.0, 1.0]),
        PackedVertex::new([0.5, 0.5, 0.0], n, [1.0, 0.0]),
        PackedVertex::new([-0.5, 0.5, 0.0], n, [0.0, 0.0]),
    ];
    Mesh {
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

pub fn create_cube_mesh(size: f32) -> Mesh {
    let s = size / 2.0;
    // (normal, u axis, v axis) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (cu, cv, uv) in [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ] {
            let position = [
                (normal[0] + cu * u[0] + cv * v[0]) * s,
                (normal[1] + cu * u[1] + cv * v[1]) * s,
                (normal[2] + cu * u[2] + cv * v[2]) * s,
            ];
            vertices.push(PackedVertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Mesh { vertices, indices }
}

/// UV sphere, counter-clockwise when seen from outside.
pub fn create_sphere_mesh(radius: f32, sectors: u32, stacks: u32) -> Mesh {
    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
    let mut indices = Vec::new();

    for i in 0..=stacks {
        let stack_angle = PI / 2.0 - i as f32 * PI / stacks as f32;
        let ring = radius * stack_angle.cos();
        let y = radius * stack_angle.sin();

        for j in 0..=sectors {
            let sector_angle = j as f32 * 2.0 * PI / sectors as f32;
            let x = ring * sector_angle.cos();
            let z = -ring * sector_angle.sin();
            let uv = [j as f32 / sectors as f32, i as f32 / stacks as f32];
            vertices.push(PackedVertex::new(
                [x, y, z],
                [x / radius, y / radius, z / radius],
                uv,
            ));
        }
    }

    for i in 0..stacks {
        let k1 = i * (sectors + 1);
        let k2 = k1 + sectors + 1;

        for j in 0..sectors {
            if i != 0 {
                indices.extend_from_slice(&[k1 + j, k2 + j, k1 + j + 1]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[k1 + j + 1, k2 + j, k2 + j + 1]);
            }
        }
    }

    Mesh { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn assert_outward_ccw(mesh: &Mesh) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(mesh.vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) >= -1e-6, "inward triangle {tri:?}");
        }
    }

    #[test]
    fn vertex_is_24_bytes() {
        assert_eq!(std::mem::size_of::<PackedVertex>(), 24);
    }

    #[test]
    fn normals_round_trip_through_snorm() {
        let v = PackedVertex::new([0.0; 3], [0.0, -1.0, 0.0], [0.0; 2]);
        assert_eq!(v.unpacked_normal(), [0.0, -1.0, 0.0]);
    }

    #[test]
    fn cube_faces_point_outward() {
        let cube = create_cube_mesh(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_outward_ccw(&cube);
    }

    #[test]
    fn sphere_topology() {
        let sphere = create_sphere_mesh(1.0, 64, 64);
        assert_eq!(sphere.vertices.len(), 65 * 65);
        // Pole rows contribute one triangle per sector, the rest two.
        assert_eq!(sphere.indices.len(), (64 * 2 * (64 - 1)) * 3);
        assert_outward_ccw(&sphere);
        assert!(!sphere.is_empty());
    }
}
