//! GPU light culling against the CPU reference.
//!
//! These need a real adapter and are ignored by default:
//! `cargo test -p umbra-render -- --ignored`. Without an adapter they log and
//! pass.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use umbra_core::{
    cull_lights_reference, CullInputs, DepthRangePolicy, LightListKind, RendererVariant, SceneLimits, TileDepthRange,
};
use umbra_render::{check_adapter, create_renderer, RenderScene, RendererConfig, SceneRenderer, TiledDeferred};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn device() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()));
    let Some(adapter) = adapter else {
        log::warn!("No GPU adapter available, skipping");
        return None;
    };
    if let Err(err) = check_adapter(&adapter) {
        log::warn!("Adapter cannot run the renderer ({err}), skipping");
        return None;
    }
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("umbra test device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .ok()?;
    Some((Arc::new(device), Arc::new(queue)))
}

fn output(device: &wgpu::Device) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("test output"),
            size: wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn renderer(device: &Arc<wgpu::Device>, queue: &Arc<wgpu::Queue>) -> TiledDeferred {
    renderer_with(device, queue, |_| {})
}

fn renderer_with(
    device: &Arc<wgpu::Device>,
    queue: &Arc<wgpu::Queue>,
    configure: impl FnOnce(&mut RendererConfig),
) -> TiledDeferred {
    let mut config = RendererConfig::new(WIDTH, HEIGHT, OUTPUT_FORMAT);
    configure(&mut config);
    TiledDeferred::new(device.clone(), queue.clone(), config).unwrap()
}

/// Renders one frame and compares the GPU bins of `kind` with the CPU
/// reference fed the same frustums and depth buffer. Returns how many tiles
/// disagree; float differences between the two can flip a light that only
/// grazes a tile boundary.
fn mismatched_tiles(renderer: &mut TiledDeferred, scene: &RenderScene, kind: LightListKind) -> usize {
    let view = output(renderer.device());
    renderer.render(scene, &view).unwrap();

    let gpu = renderer.read_light_bins(kind).unwrap();
    gpu.validate().unwrap();

    let grid = *renderer.tile_grid();
    let depth = renderer.read_depth().unwrap();
    let ranges = TileDepthRange::from_depth_buffer(&grid, &depth);
    let policy = match kind {
        LightListKind::Opaque => DepthRangePolicy::Opaque,
        LightListKind::Transparent => DepthRangePolicy::Transparent,
    };
    let inputs = CullInputs {
        frustums: renderer.tile_frustums(),
        depth: &ranges,
        inv_projection: renderer.inverse_projection(),
        policy,
    };
    let lights = scene.description.view_space_lights(&scene.camera.view_matrix());
    let cpu = cull_lights_reference(&inputs, &lights);

    grid.tiles()
        .filter(|t| gpu.sorted_tile_lights(t.x, t.y) != cpu.sorted_tile_lights(t.x, t.y))
        .count()
}

#[test]
#[ignore]
fn opaque_bins_match_reference() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let mut renderer = renderer(&device, &queue);
    let scene = RenderScene::demo(&device, &SceneLimits::default(), WIDTH, HEIGHT).unwrap();
    renderer.init(&scene).unwrap();

    let tiles = renderer.tile_grid().tile_count();
    let mismatched = mismatched_tiles(&mut renderer, &scene, LightListKind::Opaque);
    assert!(mismatched * 100 <= tiles, "{mismatched} of {tiles} tiles differ");
}

#[test]
#[ignore]
fn transparent_bins_match_reference_with_many_lights() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let mut renderer = renderer(&device, &queue);
    let mut scene = RenderScene::demo(&device, &SceneLimits::default(), WIDTH, HEIGHT).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    while !scene.description.point_lights.is_full() {
        let position = Vec3::new(
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
        );
        scene
            .description
            .add_point_light(position, Vec3::ONE, rng.gen_range(0.1..1.5))
            .unwrap();
    }
    renderer.init(&scene).unwrap();

    let tiles = renderer.tile_grid().tile_count();
    let mismatched = mismatched_tiles(&mut renderer, &scene, LightListKind::Transparent);
    assert!(mismatched * 100 <= tiles, "{mismatched} of {tiles} tiles differ");
}

#[test]
#[ignore]
fn zero_lights_give_empty_bins() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let mut renderer = renderer(&device, &queue);
    let mut scene = RenderScene::demo(&device, &SceneLimits::default(), WIDTH, HEIGHT).unwrap();
    scene.description.point_lights.clear();
    renderer.init(&scene).unwrap();

    let view = output(&device);
    renderer.render(&scene, &view).unwrap();

    for kind in [LightListKind::Opaque, LightListKind::Transparent] {
        let bins = renderer.read_light_bins(kind).unwrap();
        assert!(bins.entries.iter().all(|e| e.count == 0));
        assert_eq!(bins.total_count(), 0);
    }
}

#[test]
#[ignore]
fn gpu_frustums_match_cpu_build() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let renderer = renderer(&device, &queue);

    let gpu = renderer.read_tile_frustums().unwrap();
    let cpu = &renderer.tile_frustums().frustums;
    assert_eq!(gpu.len(), cpu.len());
    for (g, c) in gpu.iter().zip(cpu) {
        for (gp, cp) in g.planes.iter().zip(&c.planes) {
            assert!(gp.abs_diff_eq(*cp, 1e-4), "{gp:?} vs {cp:?}");
        }
    }
}

#[test]
#[ignore]
fn resize_rebuilds_the_grid() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let mut renderer = renderer(&device, &queue);
    let mut scene = RenderScene::demo(&device, &SceneLimits::default(), WIDTH, HEIGHT).unwrap();

    renderer.resize(100, 60, &mut scene).unwrap();
    assert_eq!(renderer.tile_grid().grid_width, 13);
    assert_eq!(renderer.tile_grid().grid_height, 8);
    assert_eq!(renderer.read_tile_frustums().unwrap().len(), 13 * 8);
}

#[test]
#[ignore]
fn non_tiled_variants_are_unsupported() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    for variant in [RendererVariant::Forward, RendererVariant::Deferred] {
        let mut config = RendererConfig::new(WIDTH, HEIGHT, OUTPUT_FORMAT);
        config.settings.variant = variant;
        let result = create_renderer(device.clone(), queue.clone(), config);
        assert!(matches!(
            result,
            Err(umbra_render::Error::Core(umbra_core::Error::Unsupported(_)))
        ));
    }
}

#[test]
#[ignore]
fn frame_graph_orders_the_passes() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let renderer = renderer(&device, &queue);
    let graph = renderer.graph();
    let order: Vec<&str> = graph.execution_order().iter().map(|&id| graph.pass_name(id)).collect();
    assert_eq!(
        order,
        [
            "gbuffer",
            "light_cull_opaque",
            "light_cull_transparent",
            "ssao",
            "lighting",
            "present"
        ]
    );
}

#[test]
#[ignore]
fn gpu_bins_saturate_at_the_per_tile_cap() {
    const CAP: u32 = 16;

    init_logger();
    let Some((device, queue)) = device() else { return };
    let mut renderer = renderer_with(&device, &queue, |config| {
        config.settings.limits.max_lights_per_tile = CAP;
    });
    let mut scene = RenderScene::demo(&device, &SceneLimits::default(), WIDTH, HEIGHT).unwrap();
    // Every one of these covers the middle of the screen.
    for _ in 0..3 * CAP {
        scene
            .description
            .add_point_light(Vec3::ZERO, Vec3::ONE, 3.0)
            .unwrap();
    }
    renderer.init(&scene).unwrap();
    renderer.render(&scene, &output(&device)).unwrap();

    let grid = *renderer.tile_grid();
    let bins = renderer.read_light_bins(LightListKind::Transparent).unwrap();
    bins.validate().unwrap();
    assert_eq!(bins.index_list.len(), CAP as usize * grid.tile_count());
    assert!(bins.entries.iter().all(|e| e.count <= CAP));
    assert_eq!(bins.entry(grid.grid_width / 2, grid.grid_height / 2).count, CAP);

    let opaque = renderer.read_light_bins(LightListKind::Opaque).unwrap();
    opaque.validate().unwrap();
    assert!(opaque.entries.iter().all(|e| e.count <= CAP));
}

#[test]
#[ignore]
fn scene_larger_than_the_renderer_is_truncated() {
    init_logger();
    let Some((device, queue)) = device() else { return };
    let mut renderer = renderer_with(&device, &queue, |config| {
        config.settings.limits.max_point_lights = 5;
        config.settings.limits.max_instances = 10;
    });
    let mut scene = RenderScene::demo(&device, &SceneLimits::default(), WIDTH, HEIGHT).unwrap();
    scene
        .description
        .add_point_light(Vec3::ZERO, Vec3::ONE, 2.0)
        .unwrap();
    assert_eq!(scene.description.point_lights.len(), 6);
    assert!(scene.description.instances.len() > 10);

    renderer.init(&scene).unwrap();
    renderer.render(&scene, &output(&device)).unwrap();

    let bins = renderer.read_light_bins(LightListKind::Opaque).unwrap();
    bins.validate().unwrap();
    for tile in renderer.tile_grid().tiles() {
        assert!(bins.tile_lights(tile.x, tile.y).iter().all(|&light| light < 5));
    }
}
