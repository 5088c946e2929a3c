//! Screen tiling and per-tile view-space frustums.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::error::{Error, Result};
use crate::TILE_SIZE_IN_PIXELS;

/// The screen partitioned into `TILE_SIZE_IN_PIXELS` square tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub grid_width: u32,
    pub grid_height: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            grid_width: width.div_ceil(TILE_SIZE_IN_PIXELS),
            grid_height: height.div_ceil(TILE_SIZE_IN_PIXELS),
        })
    }

    pub fn tile_count(&self) -> usize {
        (self.grid_width * self.grid_height) as usize
    }

    pub fn tile_index(&self, x: u32, y: u32) -> usize {
        (y * self.grid_width + x) as usize
    }

    /// Tile containing `pixel`, clamped to the grid.
    pub fn tile_of_pixel(&self, pixel: UVec2) -> UVec2 {
        let tile = pixel / TILE_SIZE_IN_PIXELS;
        tile.min(UVec2::new(self.grid_width - 1, self.grid_height - 1))
    }

    pub fn tiles(&self) -> impl Iterator<Item = UVec2> + '_ {
        (0..self.grid_height).flat_map(move |y| (0..self.grid_width).map(move |x| UVec2::new(x, y)))
    }

    /// Pixel position to NDC, with y pointing up.
    pub fn pixel_to_ndc(&self, pixel: Vec2) -> Vec2 {
        let size = Vec2::new(self.width as f32, self.height as f32);
        let uv = pixel / size;
        Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
    }
}

/// Four view-space planes bounding one tile, normals pointing inward.
///
/// Each plane is `(normal, distance)`; all planes pass through the eye so the
/// distance is always zero. Order: left, right, top, bottom.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TileFrustum {
    pub planes: [Vec4; 4],
}

impl TileFrustum {
    /// Conservative sphere test: false only when the sphere lies completely
    /// outside one of the planes.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.xyz().dot(center) + plane.w >= -radius)
    }
}

/// Per-tile frustums for a given resolution and projection.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFrustums {
    pub grid: TileGrid,
    pub frustums: Vec<TileFrustum>,
}

impl TileFrustums {
    /// Builds every tile frustum by unprojecting the tile corners at the far
    /// plane (NDC z = 1).
    pub fn build(grid: &TileGrid, inv_projection: Mat4) -> Self {
        let unproject = |pixel: Vec2| -> Vec3 {
            let ndc = grid.pixel_to_ndc(pixel);
            let view = inv_projection * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
            view.xyz() / view.w
        };

        let tile = TILE_SIZE_IN_PIXELS as f32;
        let frustums = grid
            .tiles()
            .map(|t| {
                let min = Vec2::new(t.x as f32, t.y as f32) * tile;
                let max = min + Vec2::splat(tile);

                let top_left = unproject(min);
                let top_right = unproject(Vec2::new(max.x, min.y));
                let bottom_right = unproject(max);
                let bottom_left = unproject(Vec2::new(min.x, max.y));
                let center = unproject((min + max) * 0.5);

                let planes = [
                    plane_through_eye(bottom_left, top_left, center),
                    plane_through_eye(top_right, bottom_right, center),
                    plane_through_eye(top_left, top_right, center),
                    plane_through_eye(bottom_right, bottom_left, center),
                ];
                TileFrustum { planes }
            })
            .collect();

        log::debug!(
            "Built {} tile frustums for {}x{} ({}x{} tiles)",
            grid.tile_count(),
            grid.width,
            grid.height,
            grid.grid_width,
            grid.grid_height
        );

        Self {
            grid: *grid,
            frustums,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> &TileFrustum {
        &self.frustums[self.grid.tile_index(x, y)]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.frustums)
    }
}

/// Plane containing the eye and two corner rays, flipped so `inside` is on
/// its positive side.
fn plane_through_eye(a: Vec3, b: Vec3, inside: Vec3) -> Vec4 {
    let mut normal = a.cross(b).normalize_or_zero();
    if normal.dot(inside) < 0.0 {
        normal = -normal;
    }
    normal.extend(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn projection() -> Mat4 {
        Mat4::perspective_rh(90f32.to_radians(), 1920.0 / 1080.0, 0.001, 1000.0)
    }

    #[test]
    fn grid_rounds_up() {
        let grid = TileGrid::new(1920, 1080).unwrap();
        assert_eq!((grid.grid_width, grid.grid_height), (240, 135));

        let grid = TileGrid::new(9, 1).unwrap();
        assert_eq!((grid.grid_width, grid.grid_height), (2, 1));
        assert_eq!(grid.tile_count(), 2);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(
            TileGrid::new(0, 720),
            Err(Error::InvalidDimensions {
                width: 0,
                height: 720
            })
        );
        assert!(TileGrid::new(1280, 0).is_err());
    }

    #[test]
    fn pixels_clamp_to_last_tile() {
        let grid = TileGrid::new(20, 20).unwrap();
        assert_eq!(grid.tile_of_pixel(UVec2::new(19, 19)), UVec2::new(2, 2));
        assert_eq!(grid.tile_of_pixel(UVec2::new(500, 0)), UVec2::new(2, 0));
    }

    #[test]
    fn rebuild_is_bit_identical() {
        let grid = TileGrid::new(1920, 1080).unwrap();
        let a = TileFrustums::build(&grid, projection().inverse());
        let b = TileFrustums::build(&grid, projection().inverse());
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn planes_contain_tile_center_ray() {
        let grid = TileGrid::new(64, 32).unwrap();
        let inv = Mat4::perspective_rh(1.2, 2.0, 0.1, 100.0).inverse();
        let frustums = TileFrustums::build(&grid, inv);

        for tile in grid.tiles() {
            let center = (tile.as_vec2() + 0.5) * TILE_SIZE_IN_PIXELS as f32;
            let ndc = grid.pixel_to_ndc(center);
            let point = inv * Vec4::new(ndc.x, ndc.y, 0.5, 1.0);
            let point = point.xyz() / point.w;

            let frustum = frustums.get(tile.x, tile.y);
            for plane in frustum.planes {
                assert_relative_eq!(plane.xyz().length(), 1.0, epsilon = 1e-5);
                assert_eq!(plane.w, 0.0);
                assert!(plane.xyz().dot(point) > 0.0);
            }
        }
    }

    #[test]
    fn sphere_behind_a_plane_is_rejected() {
        let grid = TileGrid::new(1920, 1080).unwrap();
        let frustums = TileFrustums::build(&grid, projection().inverse());
        let centre_tile = frustums.get(120, 67);

        assert!(centre_tile.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
        assert!(!centre_tile.intersects_sphere(Vec3::new(40.0, 0.0, -5.0), 1.0));
        assert!(!frustums.get(0, 0).intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
    }
}
