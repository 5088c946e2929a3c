//! Renderer strategies and the tiled deferred implementation

use crate::graph::{names, PassId, RenderGraph};
use crate::passes::lighting::LightBuffers;
use crate::passes::{FrustumParams, GBufferPass, LightCullPass, LightingPass, PresentPass, SsaoPass, TileFrustumPass};
use crate::pipeline::{PipelineCache, ShaderDefines};
use crate::readback;
use crate::resources::{BindGroupBuilder, BindGroupLayouts, GpuImage, ResourceManager, Uploader};
use crate::scene::RenderScene;
use crate::targets::ScreenTargets;
use crate::{Error, Result};
use glam::{Mat4, UVec2};
use std::collections::HashMap;
use std::sync::Arc;
use umbra_core::{
    AccessFlags, Camera, CullUniforms, DepthRangePolicy, LightBins, LightGridEntry, LightListKind, RenderFeatures,
    RenderSettings, RendererVariant, ResourceAccess, SceneGlobals, SsaoKernel, StageFlags, TileFrustum,
    TileFrustums, TileGrid,
};

/// Main renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    /// Format of the views passed to [`SceneRenderer::render`].
    pub output_format: wgpu::TextureFormat,
    pub settings: RenderSettings,
}

impl RendererConfig {
    pub fn new(width: u32, height: u32, output_format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            output_format,
            settings: RenderSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// A rendering strategy the frame driver can swap at runtime.
pub trait SceneRenderer {
    /// Prepares screen-dependent state for `scene`'s camera.
    fn init(&mut self, scene: &RenderScene) -> Result<()>;

    /// Renders one frame of `scene` into `output` and submits it.
    fn render(&mut self, scene: &RenderScene, output: &wgpu::TextureView) -> Result<()>;

    /// Rebuilds everything that depends on the resolution.
    fn resize(&mut self, width: u32, height: u32, scene: &mut RenderScene) -> Result<()>;
}

/// Creates the renderer selected by `config.settings.variant`.
pub fn create_renderer(
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: RendererConfig,
) -> Result<Box<dyn SceneRenderer>> {
    match config.settings.variant {
        RendererVariant::TiledDeferred => Ok(Box::new(TiledDeferred::new(device, queue, config)?)),
        other => Err(umbra_core::Error::Unsupported(format!("{other:?} renderer")).into()),
    }
}

/// Rejects adapters the tiled deferred renderer cannot run on.
///
/// Light culling needs compute shaders and depth texture loads from compute,
/// which the GL backend cannot translate.
pub fn check_adapter(adapter: &wgpu::Adapter) -> Result<()> {
    let info = adapter.get_info();
    check_support(info.backend, adapter.get_downlevel_capabilities().flags)
}

fn check_support(backend: wgpu::Backend, flags: wgpu::DownlevelFlags) -> Result<()> {
    if !flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(umbra_core::Error::Unsupported("adapter without compute shaders".into()).into());
    }
    if backend == wgpu::Backend::Gl {
        return Err(umbra_core::Error::Unsupported("depth loads in compute on the GL backend".into()).into());
    }
    Ok(())
}

/// Tracks the submissions of the last `N` frames.
///
/// Before a slot is reused, the submission it last held must have finished.
#[derive(Debug)]
pub struct FrameRing<T = wgpu::SubmissionIndex> {
    slots: Vec<Option<T>>,
    frame: u64,
}

impl<T> FrameRing<T> {
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            slots: (0..frames_in_flight.max(1)).map(|_| None).collect(),
            frame: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Frames completed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Slot for the next frame and the submission that must finish first.
    pub fn acquire(&mut self) -> (usize, Option<T>) {
        let slot = (self.frame % self.slots.len() as u64) as usize;
        (slot, self.slots[slot].take())
    }

    pub fn complete(&mut self, slot: usize, submission: T) {
        self.slots[slot] = Some(submission);
        self.frame += 1;
    }
}

impl FrameRing<wgpu::SubmissionIndex> {
    /// Acquires the next slot, blocking until its previous frame finished.
    pub fn begin(&mut self, device: &wgpu::Device) -> usize {
        let (slot, pending) = self.acquire();
        if let Some(index) = pending {
            log::trace!("Waiting for frame slot {}", slot);
            device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
        }
        slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameStage {
    GBuffer,
    Cull(DepthRangePolicy),
    Ssao,
    Lighting,
    Present,
}

struct Passes {
    tile_frustum: TileFrustumPass,
    gbuffer: GBufferPass,
    opaque_cull: LightCullPass,
    transparent_cull: LightCullPass,
    ssao: SsaoPass,
    lighting: LightingPass,
    present: PresentPass,
}

impl Passes {
    fn cull(&self, policy: DepthRangePolicy) -> &LightCullPass {
        match policy {
            DepthRangePolicy::Opaque => &self.opaque_cull,
            DepthRangePolicy::Transparent => &self.transparent_cull,
        }
    }
}

/// Bind groups that reference screen-sized targets.
struct ScreenBindGroups {
    tile_frustum: wgpu::BindGroup,
    opaque_cull: wgpu::BindGroup,
    transparent_cull: wgpu::BindGroup,
    ssao: wgpu::BindGroup,
    lighting: wgpu::BindGroup,
    present: wgpu::BindGroup,
}

impl ScreenBindGroups {
    fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        passes: &Passes,
        targets: &ScreenTargets,
        lights: &LightBuffers,
    ) -> Self {
        Self {
            tile_frustum: passes.tile_frustum.bind_group(device, layouts, &targets.frustums),
            opaque_cull: passes.opaque_cull.bind_group(device, layouts, targets, &lights.point_lights),
            transparent_cull: passes.transparent_cull.bind_group(device, layouts, targets, &lights.point_lights),
            ssao: passes.ssao.bind_group(device, layouts, targets),
            lighting: passes.lighting.bind_group(device, layouts, targets, lights),
            present: passes.present.bind_group(device, layouts, targets),
        }
    }

    fn cull(&self, policy: DepthRangePolicy) -> &wgpu::BindGroup {
        match policy {
            DepthRangePolicy::Opaque => &self.opaque_cull,
            DepthRangePolicy::Transparent => &self.transparent_cull,
        }
    }
}

/// Tile-based deferred renderer with compute light culling and SSAO.
///
/// Owns every GPU object it uses. The frame runs in the order the render
/// graph derived from the passes' declared accesses.
pub struct TiledDeferred {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    resources: ResourceManager,
    uploader: Uploader,
    pipelines: PipelineCache,
    settings: RenderSettings,
    kernel: SsaoKernel,

    passes: Passes,
    lights: LightBuffers,
    scene_bind_group: wgpu::BindGroup,
    material_bind_group: wgpu::BindGroup,
    _albedo: GpuImage,

    targets: ScreenTargets,
    bind_groups: ScreenBindGroups,
    frustums: TileFrustums,
    inv_projection: Mat4,
    projection: Mat4,

    graph: RenderGraph,
    stages: Vec<FrameStage>,
    frames: FrameRing,
    light_count: u32,
}

impl TiledDeferred {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, config: RendererConfig) -> Result<Self> {
        log::info!("Creating tiled deferred renderer");
        log::info!("  Output format: {:?}", config.output_format);
        log::info!("  Resolution: {}x{}", config.width, config.height);

        let settings = config.settings;
        settings.validate()?;
        let kernel = SsaoKernel::new(&settings.ssao)?;
        let grid = TileGrid::new(config.width, config.height)?;

        let mut resources = ResourceManager::new(device.clone());
        let layouts = resources.bind_group_layouts.clone();
        let max_lights_per_tile = settings.limits.max_lights_per_tile;
        let defines = ShaderDefines::standard().with("MAX_LIGHTS_PER_TILE", max_lights_per_tile);
        let mut pipelines = PipelineCache::new(device.clone(), defines);

        let linear = resources.create_sampler("linear", wgpu::FilterMode::Linear);
        let passes = Passes {
            tile_frustum: TileFrustumPass::new(&mut pipelines, &mut resources)?,
            gbuffer: GBufferPass::new(&mut pipelines, &mut resources, settings.limits.max_instances)?,
            opaque_cull: LightCullPass::new(&mut pipelines, &layouts, DepthRangePolicy::Opaque)?,
            transparent_cull: LightCullPass::new(&mut pipelines, &layouts, DepthRangePolicy::Transparent)?,
            ssao: SsaoPass::new(&mut pipelines, &mut resources)?,
            lighting: LightingPass::new(&mut pipelines, &layouts)?,
            present: PresentPass::new(&mut pipelines, &layouts, linear, config.output_format)?,
        };
        let lights = LightBuffers::new(&mut resources, settings.limits.max_point_lights)?;

        let albedo = resources.create_checkerboard(&queue)?;
        let nearest = resources.create_sampler("albedo", wgpu::FilterMode::Nearest);
        let material_bind_group = BindGroupBuilder::new("default_material")
            .texture(0, &albedo.view)
            .sampler(1, &nearest)
            .build(&device, &layouts.material);
        let scene_bind_group = passes.gbuffer.scene_bind_group(&device, &layouts);

        let targets = ScreenTargets::new(&mut resources, grid, max_lights_per_tile)?;
        let bind_groups = ScreenBindGroups::new(&device, &layouts, &passes, &targets, &lights);

        let (graph, stages) = build_frame_graph(&passes, settings.features)?;
        let camera = Camera::demo(config.width, config.height);

        let mut renderer = Self {
            uploader: Uploader::new(queue.clone()),
            device,
            queue,
            resources,
            pipelines,
            kernel,
            passes,
            lights,
            scene_bind_group,
            material_bind_group,
            _albedo: albedo,
            frustums: TileFrustums::build(&grid, camera.inverse_projection()),
            targets,
            bind_groups,
            inv_projection: camera.inverse_projection(),
            projection: camera.projection_matrix(),
            graph,
            stages,
            frames: FrameRing::new(settings.frames_in_flight),
            settings,
            light_count: 0,
        };
        renderer.build_tile_grid(config.width, config.height, camera.inverse_projection())?;

        let (buffers, images, bytes) = renderer.resources.stats();
        log::info!(
            "Tiled deferred renderer ready: {} pipelines, {} buffers, {} images, {:.1} MiB",
            renderer.pipelines.len(),
            buffers,
            images,
            bytes as f64 / (1024.0 * 1024.0)
        );
        Ok(renderer)
    }

    /// Rebuilds the tile grid and frustums for a resolution and projection.
    ///
    /// Screen targets are recreated only when the resolution changed. The
    /// frustum buffer is filled on the GPU; the CPU copy is kept for
    /// validation.
    pub fn build_tile_grid(&mut self, width: u32, height: u32, inv_projection: Mat4) -> Result<&TileFrustums> {
        let grid = TileGrid::new(width, height)?;
        if grid != self.targets.grid {
            log::info!("Resizing screen targets to {}x{}", width, height);
            self.targets = ScreenTargets::new(&mut self.resources, grid, self.settings.limits.max_lights_per_tile)?;
            self.bind_groups = ScreenBindGroups::new(
                &self.device,
                &self.resources.bind_group_layouts,
                &self.passes,
                &self.targets,
                &self.lights,
            );
        }

        self.inv_projection = inv_projection;
        self.projection = inv_projection.inverse();
        self.frustums = TileFrustums::build(&grid, inv_projection);

        let mut graph = RenderGraph::new();
        graph.import(names::FRUSTUM_PARAMS, ResourceAccess::UPLOAD);
        graph.add_pass(&self.passes.tile_frustum);
        graph.build()?;

        let params = FrustumParams::new(&grid, inv_projection);
        self.uploader.upload_resource(
            names::FRUSTUM_PARAMS,
            self.passes.tile_frustum.params(),
            0,
            bytemuck::bytes_of(&params),
            ResourceAccess::UNIFORM_ALL,
            ResourceAccess::UNIFORM_ALL,
        )?;
        self.uploader.verify(&graph)?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Tile Frustum Encoder"),
        });
        self.passes
            .tile_frustum
            .dispatch(&mut encoder, &self.bind_groups.tile_frustum, &grid);
        self.queue.submit(Some(encoder.finish()));

        Ok(&self.frustums)
    }

    /// Uploads instance transforms and records the GBuffer pass.
    pub fn render_gbuffer(&mut self, encoder: &mut wgpu::CommandEncoder, scene: &RenderScene) -> Result<()> {
        self.upload_instances(scene)?;
        self.uploader.verify(&self.graph)?;
        self.passes
            .gbuffer
            .record(encoder, &self.targets, scene, &self.scene_bind_group, &self.material_bind_group)
    }

    /// Uploads the frame's lights and records one binning pass per policy.
    ///
    /// The transparent list is skipped when its feature is off.
    pub fn cull_lights(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &RenderScene,
        policies: &[DepthRangePolicy],
    ) -> Result<()> {
        self.upload_lights(scene)?;
        self.uploader.verify(&self.graph)?;
        for &policy in policies {
            self.record_cull(encoder, policy);
        }
        Ok(())
    }

    /// Records the SSAO pass, or a full-visibility clear when SSAO is off.
    pub fn render_ssao(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<()> {
        self.upload_ssao()?;
        self.uploader.verify(&self.graph)?;
        self.record_ssao(encoder);
        Ok(())
    }

    /// Records the lighting resolve and returns the resolved color view.
    pub fn resolve_lighting(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<&wgpu::TextureView> {
        self.passes
            .lighting
            .record(encoder, &self.targets, &self.bind_groups.lighting);
        Ok(&self.targets.resolved.view)
    }

    fn upload_instances(&mut self, scene: &RenderScene) -> Result<()> {
        let view = scene.camera.view_matrix();
        self.projection = scene.camera.projection_matrix();
        let mut transforms = scene.description.instance_transforms(&view, &self.projection);
        clamp_to_capacity(&mut transforms, self.passes.gbuffer.capacity(), "instances");
        self.uploader.upload_resource(
            names::INSTANCES,
            self.passes.gbuffer.instances(),
            0,
            bytemuck::cast_slice(&transforms),
            ResourceAccess::VERTEX_STORAGE_READ,
            ResourceAccess::VERTEX_STORAGE_READ,
        )
    }

    fn upload_lights(&mut self, scene: &RenderScene) -> Result<()> {
        let view = scene.camera.view_matrix();
        let mut lights = scene.description.view_space_lights(&view);
        clamp_to_capacity(&mut lights, self.lights.max_point_lights, "point lights");
        self.light_count = lights.len() as u32;

        let storage_read = ResourceAccess::new(
            AccessFlags::SHADER_READ,
            StageFlags::COMPUTE.union(StageFlags::FRAGMENT),
        );
        self.uploader.upload_resource(
            names::POINT_LIGHTS,
            &self.lights.point_lights,
            0,
            bytemuck::cast_slice(&lights),
            storage_read,
            storage_read,
        )?;

        let globals = SceneGlobals {
            camera_position: scene.camera.position.to_array(),
            point_light_count: self.light_count,
        };
        self.uploader.upload_resource(
            names::SCENE_GLOBALS,
            &self.lights.globals,
            0,
            bytemuck::bytes_of(&globals),
            ResourceAccess::UNIFORM_ALL,
            ResourceAccess::UNIFORM_ALL,
        )?;
        let directional = scene.description.directional.to_gpu(&view);
        self.uploader.upload_resource(
            names::DIRECTIONAL_LIGHT,
            &self.lights.directional,
            0,
            bytemuck::bytes_of(&directional),
            ResourceAccess::UNIFORM_ALL,
            ResourceAccess::UNIFORM_ALL,
        )?;

        for (policy, resource) in [
            (DepthRangePolicy::Opaque, names::OPAQUE_CULL_UNIFORMS),
            (DepthRangePolicy::Transparent, names::TRANSPARENT_CULL_UNIFORMS),
        ] {
            let uniforms = CullUniforms::new(&self.targets.grid, self.inv_projection, self.light_count, policy)
                .with_max_lights_per_tile(self.settings.limits.max_lights_per_tile);
            let list = self.passes.cull(policy).list(&self.targets);
            self.uploader.upload_resource(
                resource,
                &list.uniforms,
                0,
                bytemuck::bytes_of(&uniforms),
                ResourceAccess::UNIFORM_ALL,
                ResourceAccess::UNIFORM_ALL,
            )?;
        }
        log::trace!("Uploaded {} point lights", self.light_count);
        Ok(())
    }

    fn upload_ssao(&mut self) -> Result<()> {
        if !self.settings.features.contains(RenderFeatures::SSAO) {
            return Ok(());
        }
        let screen = UVec2::new(self.targets.grid.width, self.targets.grid.height);
        let uniforms = self.kernel.uniforms(self.projection, screen, &self.settings.ssao);
        self.uploader.upload_resource(
            names::SSAO_UNIFORMS,
            self.passes.ssao.uniforms(),
            0,
            bytemuck::bytes_of(&uniforms),
            ResourceAccess::UNIFORM_ALL,
            ResourceAccess::UNIFORM_ALL,
        )
    }

    fn record_cull(&self, encoder: &mut wgpu::CommandEncoder, policy: DepthRangePolicy) {
        if policy == DepthRangePolicy::Transparent
            && !self.settings.features.contains(RenderFeatures::TRANSPARENT_LIGHT_LIST)
        {
            log::trace!("Transparent light list disabled, skipping");
            return;
        }
        let grid = self.targets.grid;
        self.passes
            .cull(policy)
            .record(encoder, &self.targets, self.bind_groups.cull(policy), &grid);
    }

    fn record_ssao(&self, encoder: &mut wgpu::CommandEncoder) {
        if self.settings.features.contains(RenderFeatures::SSAO) {
            self.passes.ssao.record(encoder, &self.targets, &self.bind_groups.ssao);
        } else {
            self.passes.ssao.record_disabled(encoder, &self.targets);
        }
    }

    /// Reads back one light list as [`LightBins`]. Blocks until the GPU is idle.
    pub fn read_light_bins(&self, kind: LightListKind) -> Result<LightBins> {
        let list = match kind {
            LightListKind::Opaque => &self.targets.opaque,
            LightListKind::Transparent => &self.targets.transparent,
        };
        let indices = readback::read_buffer(&self.device, &self.queue, &list.indices, list.indices.size())?;
        let grid = readback::read_texture(&self.device, &self.queue, &list.grid.texture, 8)?;
        Ok(LightBins::from_raw(
            self.targets.grid,
            readback::decode(&indices),
            readback::decode::<LightGridEntry>(&grid),
        ))
    }

    /// Reads back the GPU-built tile frustums.
    pub fn read_tile_frustums(&self) -> Result<Vec<TileFrustum>> {
        let bytes = readback::read_buffer(&self.device, &self.queue, &self.targets.frustums, self.targets.frustums.size())?;
        Ok(readback::decode(&bytes))
    }

    /// Reads back the depth buffer, one value per pixel, row-major.
    pub fn read_depth(&self) -> Result<Vec<f32>> {
        let bytes = readback::read_texture(&self.device, &self.queue, &self.targets.depth.texture, 4)?;
        Ok(readback::decode(&bytes))
    }

    /// CPU-built frustums for the current grid and projection.
    pub fn tile_frustums(&self) -> &TileFrustums {
        &self.frustums
    }

    pub fn tile_grid(&self) -> &TileGrid {
        &self.targets.grid
    }

    pub fn inverse_projection(&self) -> Mat4 {
        self.inv_projection
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.frame()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl SceneRenderer for TiledDeferred {
    fn init(&mut self, scene: &RenderScene) -> Result<()> {
        let grid = self.targets.grid;
        self.build_tile_grid(grid.width, grid.height, scene.camera.inverse_projection())?;
        Ok(())
    }

    fn render(&mut self, scene: &RenderScene, output: &wgpu::TextureView) -> Result<()> {
        log::trace!("Rendering frame {}", self.frames.frame());
        let slot = self.frames.begin(&self.device);

        self.upload_instances(scene)?;
        self.upload_lights(scene)?;
        self.upload_ssao()?;
        let uploads = self.uploader.verify(&self.graph)?;
        log::trace!("Verified {} uploads against the frame graph", uploads);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        for stage in self.stages.clone() {
            match stage {
                FrameStage::GBuffer => self.passes.gbuffer.record(
                    &mut encoder,
                    &self.targets,
                    scene,
                    &self.scene_bind_group,
                    &self.material_bind_group,
                )?,
                FrameStage::Cull(policy) => self.record_cull(&mut encoder, policy),
                FrameStage::Ssao => self.record_ssao(&mut encoder),
                FrameStage::Lighting => {
                    self.passes
                        .lighting
                        .record(&mut encoder, &self.targets, &self.bind_groups.lighting)
                }
                FrameStage::Present => self
                    .passes
                    .present
                    .record(&mut encoder, output, &self.bind_groups.present),
            }
        }

        let submission = self.queue.submit(Some(encoder.finish()));
        self.frames.complete(slot, submission);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, scene: &mut RenderScene) -> Result<()> {
        log::info!("Resizing renderer to {}x{}", width, height);
        scene.camera.set_viewport(width, height);
        self.build_tile_grid(width, height, scene.camera.inverse_projection())?;
        Ok(())
    }
}

/// Drops what does not fit a buffer sized for `capacity` items.
fn clamp_to_capacity<T>(items: &mut Vec<T>, capacity: usize, what: &str) {
    if items.len() > capacity {
        log::warn!(
            "Scene has {} {} but the renderer holds {}, dropping the rest",
            items.len(),
            what,
            capacity
        );
        items.truncate(capacity);
    }
}

/// Declares the frame's passes and derives their order.
///
/// Fails unless the resolve reads the opaque light grid behind a
/// compute-write to fragment-read barrier.
fn build_frame_graph(passes: &Passes, features: RenderFeatures) -> Result<(RenderGraph, Vec<FrameStage>)> {
    let mut graph = RenderGraph::new();
    for uploaded in [
        names::INSTANCES,
        names::POINT_LIGHTS,
        names::SCENE_GLOBALS,
        names::DIRECTIONAL_LIGHT,
        names::OPAQUE_CULL_UNIFORMS,
        names::TRANSPARENT_CULL_UNIFORMS,
        names::SSAO_UNIFORMS,
    ] {
        graph.import(uploaded, ResourceAccess::UPLOAD);
    }
    graph.import(names::TILE_FRUSTUMS, ResourceAccess::COMPUTE_WRITE);

    let mut stages: HashMap<PassId, FrameStage> = HashMap::new();
    stages.insert(graph.add_pass(&passes.gbuffer), FrameStage::GBuffer);
    stages.insert(graph.add_pass(&passes.opaque_cull), FrameStage::Cull(DepthRangePolicy::Opaque));
    if features.contains(RenderFeatures::TRANSPARENT_LIGHT_LIST) {
        stages.insert(
            graph.add_pass(&passes.transparent_cull),
            FrameStage::Cull(DepthRangePolicy::Transparent),
        );
    }
    stages.insert(graph.add_pass(&passes.ssao), FrameStage::Ssao);
    let lighting = graph.add_pass(&passes.lighting);
    stages.insert(lighting, FrameStage::Lighting);
    stages.insert(graph.add_pass(&passes.present), FrameStage::Present);

    graph.build()?;

    let grid_barrier = graph
        .barrier_before(lighting, names::OPAQUE_LIGHT_GRID)
        .filter(|b| b.barrier.before == ResourceAccess::COMPUTE_WRITE && b.barrier.after == ResourceAccess::FRAGMENT_READ);
    if grid_barrier.is_none() {
        return Err(Error::Graph(
            "lighting reads the opaque light grid without a compute-to-fragment barrier".into(),
        ));
    }

    let order = graph
        .execution_order()
        .iter()
        .filter_map(|id| stages.get(id).copied())
        .collect();
    Ok((graph, order))
}
