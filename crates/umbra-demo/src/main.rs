//! Headless Umbra demo
//!
//! Renders the sphere grid scene offscreen, reads both light lists back and
//! logs how the lights were binned.
//!
//! ```text
//! umbra-demo [SETTINGS.ron] [WIDTHxHEIGHT]
//! ```

use std::error::Error;
use std::sync::Arc;
use umbra_core::{LightBins, RenderSettings, TileGrid};
use umbra_render::{check_adapter, LightListKind, RenderScene, RendererConfig, SceneRenderer, TiledDeferred};

const DEFAULT_SIZE: (u32, u32) = (1280, 720);
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

struct Args {
    settings: RenderSettings,
    width: u32,
    height: u32,
}

fn parse_args() -> Args {
    let mut args = Args {
        settings: RenderSettings::default(),
        width: DEFAULT_SIZE.0,
        height: DEFAULT_SIZE.1,
    };

    for arg in std::env::args().skip(1) {
        if let Some((w, h)) = arg.split_once('x').and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?))) {
            args.width = w;
            args.height = h;
            continue;
        }
        match load_settings(&arg) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", arg);
                args.settings = settings;
            }
            Err(err) => log::error!("Ignoring settings file {}: {}", arg, err),
        }
    }
    args
}

fn load_settings(path: &str) -> Result<RenderSettings, Box<dyn Error>> {
    let data = std::fs::read_to_string(path)?;
    Ok(ron::from_str(&data)?)
}

fn request_device() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>), Box<dyn Error>> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok_or("no suitable GPU adapter")?;

    let info = adapter.get_info();
    log::info!("Using {} ({:?})", info.name, info.backend);
    check_adapter(&adapter)?;

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Umbra Demo Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))?;
    Ok((Arc::new(device), Arc::new(queue)))
}

fn report(kind: LightListKind, grid: &TileGrid, bins: &LightBins) {
    let busiest = grid
        .tiles()
        .max_by_key(|t| bins.entry(t.x, t.y).count)
        .map(|t| (t, bins.entry(t.x, t.y).count));
    let lit = bins.entries.iter().filter(|e| e.count > 0).count();

    log::info!(
        "{:?} list: {} indices over {} tiles, {} tiles lit",
        kind,
        bins.total_count(),
        grid.tile_count(),
        lit
    );
    if let Some((tile, count)) = busiest {
        log::info!("  busiest tile ({}, {}) with {} lights", tile.x, tile.y, count);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args();
    let (device, queue) = request_device()?;

    let config = RendererConfig::new(args.width, args.height, OUTPUT_FORMAT).with_settings(args.settings);
    let limits = config.settings.limits;
    let mut renderer = TiledDeferred::new(device.clone(), queue.clone(), config)?;
    let scene = RenderScene::demo(&device, &limits, args.width, args.height)?;
    renderer.init(&scene)?;

    let output = device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Demo Output"),
            size: wgpu::Extent3d {
                width: args.width,
                height: args.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default());

    renderer.render(&scene, &output)?;
    log::info!(
        "Rendered frame {} with {} point lights",
        renderer.frame_count(),
        scene.description.point_lights.len()
    );

    let grid = *renderer.tile_grid();
    for kind in [LightListKind::Opaque, LightListKind::Transparent] {
        let bins = renderer.read_light_bins(kind)?;
        bins.validate()?;
        report(kind, &grid, &bins);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::{RenderFeatures, RendererVariant};

    #[test]
    fn bundled_settings_parse() {
        let settings: RenderSettings = ron::from_str(include_str!("../settings.ron")).unwrap();
        assert_eq!(settings.variant, RendererVariant::TiledDeferred);
        assert_eq!(settings.features, RenderFeatures::all());
        assert_eq!(settings.limits.max_point_lights, 1000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: RenderSettings = ron::from_str("(frames_in_flight: 3)").unwrap();
        assert_eq!(settings.frames_in_flight, 3);
        assert_eq!(settings.ssao, RenderSettings::default().ssao);
    }
}
