//! CPU reference light binning.
//!
//! Two implementations of the same tile binning the GPU culler performs:
//! a sequential one used as ground truth, and a rayon one that follows the
//! GPU reservation protocol (per-tile local counter, one global reservation
//! per tile) so its races look like the device's races. Ordering of indices
//! inside a tile's segment is unspecified; only membership and count matter.

use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;
use thiserror::Error;

use crate::light::GpuPointLight;
use crate::tile::{TileFrustum, TileFrustums, TileGrid};
use crate::{MAX_LIGHTS_PER_TILE, TILE_SIZE_IN_PIXELS};

/// NDC depth interval covered by a tile, `min <= max`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TileDepthRange {
    pub min: f32,
    pub max: f32,
}

impl TileDepthRange {
    pub const FULL: Self = Self { min: 0.0, max: 1.0 };

    /// Reduces a depth buffer (row-major, one value per pixel) to per-tile
    /// min/max, the same reduction the cull workgroups perform.
    pub fn from_depth_buffer(grid: &TileGrid, depth: &[f32]) -> Vec<TileDepthRange> {
        let mut ranges = vec![
            TileDepthRange {
                min: f32::MAX,
                max: f32::MIN,
            };
            grid.tile_count()
        ];
        for y in 0..grid.height {
            for x in 0..grid.width {
                let d = depth[(y * grid.width + x) as usize];
                let tile = UVec2::new(x, y) / TILE_SIZE_IN_PIXELS;
                let range = &mut ranges[grid.tile_index(tile.x, tile.y)];
                range.min = range.min.min(d);
                range.max = range.max.max(d);
            }
        }
        ranges
    }
}

/// Which depth interval a binning pass tests lights against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthRangePolicy {
    /// `[tile min depth, tile max depth]`: lights touching visible opaque
    /// surfaces.
    Opaque,
    /// `[near plane, tile max opaque depth]`: anything in front of the
    /// closest-behind opaque surface, where transparent geometry can live.
    Transparent,
}

impl DepthRangePolicy {
    pub fn apply(self, tile: TileDepthRange) -> TileDepthRange {
        match self {
            DepthRangePolicy::Opaque => tile,
            DepthRangePolicy::Transparent => TileDepthRange {
                min: 0.0,
                max: tile.max,
            },
        }
    }

    /// Value the cull shader switches on.
    pub fn as_gpu(self) -> u32 {
        match self {
            DepthRangePolicy::Opaque => 0,
            DepthRangePolicy::Transparent => 1,
        }
    }
}

/// Tests a view-space sphere against a tile's depth interval.
///
/// `inv_projection` maps NDC depth back to view-space distance; view space
/// looks down -Z.
pub fn sphere_overlaps_depth(center: Vec3, radius: f32, range: TileDepthRange, inv_projection: &Mat4) -> bool {
    let near = view_distance(range.min, inv_projection);
    let far = view_distance(range.max, inv_projection);
    let distance = -center.z;
    distance + radius >= near && distance - radius <= far
}

/// Positive view-space distance of NDC depth `depth` on the view axis.
pub fn view_distance(depth: f32, inv_projection: &Mat4) -> f32 {
    let p = *inv_projection * Vec4::new(0.0, 0.0, depth, 1.0);
    -(p.xyz() / p.w).z
}

fn light_in_tile(
    light: &GpuPointLight,
    frustum: &TileFrustum,
    range: TileDepthRange,
    inv_projection: &Mat4,
) -> bool {
    let center = light.position();
    frustum.intersects_sphere(center, light.max_distance)
        && sphere_overlaps_depth(center, light.max_distance, range, inv_projection)
}

/// One light grid texel: the tile's segment of the index list.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LightGridEntry {
    pub offset: u32,
    pub count: u32,
}

/// Everything a cull pass needs besides the lights themselves.
#[derive(Debug, Clone, Copy)]
pub struct CullInputs<'a> {
    pub frustums: &'a TileFrustums,
    pub depth: &'a [TileDepthRange],
    pub inv_projection: Mat4,
    pub policy: DepthRangePolicy,
}

/// Uniform block of the light cull compute pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CullUniforms {
    pub inv_projection: Mat4,
    pub screen_size: [u32; 2],
    pub grid_size: [u32; 2],
    pub light_count: u32,
    pub policy: u32,
    pub max_lights_per_tile: u32,
    pub index_capacity: u32,
}

impl CullUniforms {
    pub fn new(grid: &TileGrid, inv_projection: Mat4, light_count: u32, policy: DepthRangePolicy) -> Self {
        Self {
            inv_projection,
            screen_size: [grid.width, grid.height],
            grid_size: [grid.grid_width, grid.grid_height],
            light_count,
            policy: policy.as_gpu(),
            max_lights_per_tile: MAX_LIGHTS_PER_TILE,
            index_capacity: index_capacity(grid),
        }
    }

    /// Lowers the per-tile cap below [`MAX_LIGHTS_PER_TILE`]; the index list
    /// capacity shrinks with it.
    pub fn with_max_lights_per_tile(mut self, max_lights_per_tile: u32) -> Self {
        let max = max_lights_per_tile.min(MAX_LIGHTS_PER_TILE);
        self.max_lights_per_tile = max;
        self.index_capacity = max * self.grid_size[0] * self.grid_size[1];
        self
    }
}

/// Length of the index list for `grid`.
pub fn index_capacity(grid: &TileGrid) -> u32 {
    index_capacity_for(grid, MAX_LIGHTS_PER_TILE)
}

/// Length of the index list for `grid` with a per-tile cap of `max_lights_per_tile`.
pub fn index_capacity_for(grid: &TileGrid, max_lights_per_tile: u32) -> u32 {
    max_lights_per_tile * grid.tile_count() as u32
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BinsError {
    #[error("tile {tile} segment [{offset}, {end}) exceeds index capacity {capacity}")]
    OutOfBounds {
        tile: usize,
        offset: u32,
        end: u64,
        capacity: u32,
    },
    #[error("tile {tile} holds {count} lights, more than {max} allowed")]
    TooManyLights { tile: usize, count: u32, max: u32 },
    #[error("segments of tiles {first} and {second} overlap")]
    Overlap { first: usize, second: usize },
    #[error("grid has {actual} entries, expected {expected}")]
    GridSize { expected: usize, actual: usize },
}

/// Output of one binning pass: the flat index list plus one grid entry per
/// tile.
#[derive(Debug, Clone, PartialEq)]
pub struct LightBins {
    pub grid: TileGrid,
    pub index_list: Vec<u32>,
    pub entries: Vec<LightGridEntry>,
}

impl LightBins {
    /// Wraps data read back from the device.
    pub fn from_raw(grid: TileGrid, index_list: Vec<u32>, entries: Vec<LightGridEntry>) -> Self {
        Self {
            grid,
            index_list,
            entries,
        }
    }

    pub fn entry(&self, x: u32, y: u32) -> LightGridEntry {
        self.entries[self.grid.tile_index(x, y)]
    }

    /// Indices binned into tile `(x, y)`, in arbitrary order.
    pub fn tile_lights(&self, x: u32, y: u32) -> &[u32] {
        let entry = self.entry(x, y);
        let start = entry.offset as usize;
        &self.index_list[start..start + entry.count as usize]
    }

    /// Indices of tile `(x, y)` sorted, for set comparisons.
    pub fn sorted_tile_lights(&self, x: u32, y: u32) -> Vec<u32> {
        let mut lights = self.tile_lights(x, y).to_vec();
        lights.sort_unstable();
        lights
    }

    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }

    /// Checks that there is one entry per tile, that segments fit the index
    /// list, and that no two segments overlap.
    pub fn validate(&self) -> Result<(), BinsError> {
        if self.entries.len() != self.grid.tile_count() {
            return Err(BinsError::GridSize {
                expected: self.grid.tile_count(),
                actual: self.entries.len(),
            });
        }
        let capacity = self.index_list.len() as u32;

        let mut segments: Vec<(usize, LightGridEntry)> = Vec::with_capacity(self.entries.len());
        for (tile, entry) in self.entries.iter().enumerate() {
            if entry.count > MAX_LIGHTS_PER_TILE {
                return Err(BinsError::TooManyLights {
                    tile,
                    count: entry.count,
                    max: MAX_LIGHTS_PER_TILE,
                });
            }
            let end = entry.offset as u64 + entry.count as u64;
            if end > capacity as u64 {
                return Err(BinsError::OutOfBounds {
                    tile,
                    offset: entry.offset,
                    end,
                    capacity,
                });
            }
            if entry.count > 0 {
                segments.push((tile, *entry));
            }
        }

        segments.sort_unstable_by_key(|(_, e)| e.offset);
        for pair in segments.windows(2) {
            let (first, a) = pair[0];
            let (second, b) = pair[1];
            if a.offset + a.count > b.offset {
                return Err(BinsError::Overlap { first, second });
            }
        }
        Ok(())
    }
}

/// Sequential, deterministic binning. Tiles are visited in linear order and
/// each tile's lights appear in ascending index order.
pub fn cull_lights_reference(inputs: &CullInputs<'_>, lights: &[GpuPointLight]) -> LightBins {
    let grid = inputs.frustums.grid;
    let capacity = index_capacity(&grid);
    let mut index_list = vec![0u32; capacity as usize];
    let mut entries = Vec::with_capacity(grid.tile_count());
    let mut next = 0u32;

    for (tile, frustum) in inputs.frustums.frustums.iter().enumerate() {
        let range = inputs.policy.apply(inputs.depth[tile]);
        let mut count = 0u32;
        let mut local = Vec::new();
        for (index, light) in lights.iter().enumerate() {
            if light_in_tile(light, frustum, range, &inputs.inv_projection) {
                count += 1;
                if local.len() < MAX_LIGHTS_PER_TILE as usize {
                    local.push(index as u32);
                }
            }
        }
        if count > MAX_LIGHTS_PER_TILE {
            log::warn!(
                "Tile {} touched by {} lights, truncated to {}",
                tile,
                count,
                MAX_LIGHTS_PER_TILE
            );
        }

        let count = (local.len() as u32).min(capacity - next);
        let offset = next;
        index_list[offset as usize..(offset + count) as usize].copy_from_slice(&local[..count as usize]);
        next += count;
        entries.push(LightGridEntry { offset, count });
    }

    LightBins {
        grid,
        index_list,
        entries,
    }
}

/// Parallel binning with the GPU's reservation protocol.
///
/// Tiles run concurrently; inside a tile, lights are tested concurrently and
/// append through a local atomic counter, then the tile reserves its segment
/// from the shared counter with a single `fetch_add`. Segment offsets depend
/// on scheduling, the per-tile sets do not.
pub fn cull_lights_parallel(inputs: &CullInputs<'_>, lights: &[GpuPointLight]) -> LightBins {
    let grid = inputs.frustums.grid;
    let capacity = index_capacity(&grid);
    let global_counter = AtomicU32::new(0);
    let index_list: Vec<AtomicU32> = (0..capacity).map(|_| AtomicU32::new(0)).collect();

    let entries: Vec<LightGridEntry> = inputs
        .frustums
        .frustums
        .par_iter()
        .enumerate()
        .map(|(tile, frustum)| {
            let range = inputs.policy.apply(inputs.depth[tile]);
            let local_counter = AtomicU32::new(0);
            let local: Vec<AtomicU32> = (0..MAX_LIGHTS_PER_TILE).map(|_| AtomicU32::new(0)).collect();

            lights.par_iter().enumerate().for_each(|(index, light)| {
                if light_in_tile(light, frustum, range, &inputs.inv_projection) {
                    let slot = local_counter.fetch_add(1, Ordering::Relaxed);
                    if slot < MAX_LIGHTS_PER_TILE {
                        local[slot as usize].store(index as u32, Ordering::Relaxed);
                    }
                }
            });

            let wanted = local_counter.load(Ordering::Acquire).min(MAX_LIGHTS_PER_TILE);
            let offset = global_counter.fetch_add(wanted, Ordering::AcqRel);
            let count = wanted.min(capacity.saturating_sub(offset));
            for i in 0..count {
                let index = local[i as usize].load(Ordering::Relaxed);
                index_list[(offset + i) as usize].store(index, Ordering::Relaxed);
            }
            LightGridEntry {
                offset: if count == 0 { 0 } else { offset },
                count,
            }
        })
        .collect();

    LightBins {
        grid,
        index_list: index_list.into_iter().map(AtomicU32::into_inner).collect(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Setup {
        frustums: TileFrustums,
        depth: Vec<TileDepthRange>,
        inv_projection: Mat4,
    }

    impl Setup {
        fn new(width: u32, height: u32) -> Self {
            let grid = TileGrid::new(width, height).unwrap();
            let projection = Mat4::perspective_rh(
                90f32.to_radians(),
                width as f32 / height as f32,
                0.001,
                1000.0,
            );
            let inv_projection = projection.inverse();
            Self {
                frustums: TileFrustums::build(&grid, inv_projection),
                depth: vec![TileDepthRange::FULL; grid.tile_count()],
                inv_projection,
            }
        }

        fn inputs(&self, policy: DepthRangePolicy) -> CullInputs<'_> {
            CullInputs {
                frustums: &self.frustums,
                depth: &self.depth,
                inv_projection: self.inv_projection,
                policy,
            }
        }
    }

    fn light(position: Vec3, radius: f32) -> GpuPointLight {
        GpuPointLight {
            position: position.to_array(),
            max_distance: radius,
            color: [1.0; 3],
            _pad: 0.0,
        }
    }

    fn random_lights(count: usize, seed: u64) -> Vec<GpuPointLight> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let position = Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-12.0..12.0),
                    rng.gen_range(-40.0..-1.0),
                );
                light(position, rng.gen_range(0.5..4.0))
            })
            .collect()
    }

    #[test]
    fn light_at_origin_hits_only_the_projected_circle() {
        let setup = Setup::new(1920, 1080);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let lights = [crate::light::PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0).to_gpu(&view)];

        let bins = cull_lights_reference(&setup.inputs(DepthRangePolicy::Opaque), &lights);
        assert_eq!(bins.grid.grid_width, 240);
        assert_eq!(bins.grid.grid_height, 135);
        bins.validate().unwrap();

        assert_eq!(bins.tile_lights(120, 67), &[0]);
        assert_eq!(bins.tile_lights(132, 67), &[0]);
        assert!(bins.tile_lights(136, 67).is_empty());
        assert!(bins.tile_lights(0, 0).is_empty());
        assert!(bins.tile_lights(239, 134).is_empty());

        // The circle spans roughly 110 pixels, so only a small patch of the
        // 32400 tiles may be hit.
        let hit = bins.entries.iter().filter(|e| e.count > 0).count();
        assert!(hit > 400 && hit < 1200, "{hit} tiles hit");
    }

    #[test]
    fn zero_lights_gives_empty_grid() {
        let setup = Setup::new(320, 200);
        let bins = cull_lights_reference(&setup.inputs(DepthRangePolicy::Opaque), &[]);
        assert!(bins.entries.iter().all(|e| e.count == 0));
        assert_eq!(bins.total_count(), 0);
        let bins = cull_lights_parallel(&setup.inputs(DepthRangePolicy::Transparent), &[]);
        assert!(bins.entries.iter().all(|e| e.count == 0));
    }

    #[test]
    fn parallel_matches_reference_sets() {
        let setup = Setup::new(256, 144);
        let lights = random_lights(300, 7);
        for policy in [DepthRangePolicy::Opaque, DepthRangePolicy::Transparent] {
            let reference = cull_lights_reference(&setup.inputs(policy), &lights);
            let parallel = cull_lights_parallel(&setup.inputs(policy), &lights);
            reference.validate().unwrap();
            parallel.validate().unwrap();
            assert_eq!(reference.total_count(), parallel.total_count());
            for tile in reference.grid.tiles() {
                assert_eq!(
                    reference.sorted_tile_lights(tile.x, tile.y),
                    parallel.sorted_tile_lights(tile.x, tile.y),
                    "tile {tile}"
                );
            }
        }
    }

    #[test]
    fn saturates_at_max_lights_per_tile() {
        let _ = env_logger::builder().is_test(true).try_init();
        let setup = Setup::new(16, 16);
        // Every light covers the whole screen.
        let lights: Vec<_> = (0..1500).map(|_| light(Vec3::new(0.0, 0.0, -2.0), 50.0)).collect();

        let bins = cull_lights_parallel(&setup.inputs(DepthRangePolicy::Opaque), &lights);
        assert_eq!(bins.index_list.len(), MAX_LIGHTS_PER_TILE as usize * 4);
        assert!(bins.entries.iter().all(|e| e.count == MAX_LIGHTS_PER_TILE));
        bins.validate().unwrap();

        let reference = cull_lights_reference(&setup.inputs(DepthRangePolicy::Opaque), &lights);
        assert!(reference.entries.iter().all(|e| e.count == MAX_LIGHTS_PER_TILE));
        assert_eq!(reference.tile_lights(1, 1)[1023], 1023);
    }

    #[test]
    fn transparent_range_extends_to_near_plane() {
        let mut setup = Setup::new(64, 64);
        // Opaque surface everywhere at 10 units.
        let surface = {
            let projection = setup.inv_projection.inverse();
            let p = projection * Vec4::new(0.0, 0.0, -10.0, 1.0);
            p.z / p.w
        };
        setup.depth = vec![TileDepthRange { min: surface, max: surface }; 64];

        // Between the camera and the surface, touching neither.
        let lights = [light(Vec3::new(0.0, 0.0, -4.0), 1.0)];
        let opaque = cull_lights_reference(&setup.inputs(DepthRangePolicy::Opaque), &lights);
        let transparent = cull_lights_reference(&setup.inputs(DepthRangePolicy::Transparent), &lights);
        assert_eq!(opaque.total_count(), 0);
        assert!(transparent.total_count() > 0);

        // Behind the surface: culled by both.
        let lights = [light(Vec3::new(0.0, 0.0, -20.0), 1.0)];
        assert_eq!(cull_lights_reference(&setup.inputs(DepthRangePolicy::Transparent), &lights).total_count(), 0);
    }

    #[test]
    fn depth_reduction_per_tile() {
        let grid = TileGrid::new(16, 8).unwrap();
        let mut depth = vec![1.0; 16 * 8];
        depth[3] = 0.25;
        depth[8 * 16 + 15 - 16] = 0.5;
        let ranges = TileDepthRange::from_depth_buffer(&grid, &depth);
        assert_eq!(ranges[0], TileDepthRange { min: 0.25, max: 1.0 });
        assert_eq!(ranges[1], TileDepthRange { min: 0.5, max: 1.0 });
    }

    #[test]
    fn validate_catches_overlap() {
        let grid = TileGrid::new(16, 8).unwrap();
        let bins = LightBins::from_raw(
            grid,
            vec![0; index_capacity(&grid) as usize],
            vec![
                LightGridEntry { offset: 0, count: 4 },
                LightGridEntry { offset: 2, count: 4 },
            ],
        );
        assert_eq!(bins.validate(), Err(BinsError::Overlap { first: 0, second: 1 }));

        let bins = LightBins::from_raw(grid, vec![0; 8], vec![LightGridEntry { offset: 6, count: 4 }; 2]);
        assert!(matches!(bins.validate(), Err(BinsError::OutOfBounds { .. })));
    }

    #[test]
    fn uniforms_layout() {
        assert_eq!(std::mem::size_of::<CullUniforms>(), 96);
        assert_eq!(std::mem::size_of::<LightGridEntry>(), 8);
    }

    #[test]
    fn lowered_cap_shrinks_the_index_list() {
        let grid = TileGrid::new(64, 32).unwrap();
        let uniforms = CullUniforms::new(&grid, Mat4::IDENTITY, 3, DepthRangePolicy::Opaque).with_max_lights_per_tile(16);
        assert_eq!(uniforms.max_lights_per_tile, 16);
        assert_eq!(uniforms.index_capacity, 16 * 32);
        assert_eq!(uniforms.index_capacity, index_capacity_for(&grid, 16));

        let clamped = uniforms.with_max_lights_per_tile(4096);
        assert_eq!(clamped.max_lights_per_tile, MAX_LIGHTS_PER_TILE);
        assert_eq!(clamped.index_capacity, index_capacity(&grid));
    }
}
