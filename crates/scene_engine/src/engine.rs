//! Core engine implementation
//!
//! [`Engine`] is the explicit context owning every subsystem of the core.
//! The host calls [`Engine::run_frame`] once per displayed frame:
//!
//! 1. `World::update(dt)` runs the game systems
//! 2. `Scene::collect_visible_renderers` culls against the camera frustum
//!    and selects levels of detail
//! 3. the post-processor begins capturing
//! 4. the render context draws the visible list
//! 5. the post-processor ends the capture and runs bloom

use std::path::Path;

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::core::config::EngineConfig;
use crate::ecs::{EcsError, World};
use crate::foundation::time::{FrameClock, Stopwatch};
use crate::postprocess::{CaptureState, PostProcessor};
use crate::render::backend::{ClearMask, GpuBackend, RenderError, RenderResult, Viewport};
use crate::render::camera::Camera;
use crate::render::context::{DrawStats, GlobalUniforms, RenderContext};
use crate::render::material::MaterialLibrary;
use crate::scene::scene_graph::{CullingStats, Scene, SceneError, VisibleRenderer};

/// Aspect ratio used until the first frame reports a surface size
const DEFAULT_ASPECT: f32 = 16.0 / 9.0;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rendering error
    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    /// Scene graph error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// ECS error
    #[error("ECS error: {0}")]
    Ecs(#[from] EcsError),

    /// A frame was requested before [`Engine::initialize`]
    #[error("Engine is not initialized")]
    NotInitialized,
}

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Counters of one [`Engine::run_frame`] call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Delta time passed by the host
    pub delta_time: f32,
    /// Visibility traversal counters
    pub culling: CullingStats,
    /// Entries in the draw list
    pub visible_renderers: usize,
    /// Draw dispatch counters
    pub draws: DrawStats,
    /// Whether the frame went through bloom
    pub bloom_applied: bool,
    /// Wall time of the world update in milliseconds
    pub update_ms: f32,
    /// Wall time of culling, drawing and post-processing in milliseconds
    pub render_ms: f32,
}

/// Main engine struct
///
/// Owns the ECS world, the scene graph, the camera, the material library
/// and the post-processor. GPU resources are created through the backend
/// passed to [`initialize`](Self::initialize) and must be released with
/// [`shutdown`](Self::shutdown) on the same backend.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    /// Configuration last pushed into the subsystems
    applied_config: EngineConfig,
    world: World,
    scene: Scene,
    camera: Camera,
    materials: MaterialLibrary,
    post: PostProcessor,
    context: RenderContext,
    clock: FrameClock,
    clear_color: [f32; 4],
    surface_size: Option<(u32, u32)>,
    initialized: bool,
    last_stats: FrameStats,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        log::info!("Creating engine");

        Ok(Self {
            world: World::new(),
            scene: Scene::with_culling(config.culling.clone()),
            camera: Camera::from_config(&config.camera, DEFAULT_ASPECT),
            materials: MaterialLibrary::new(),
            post: PostProcessor::new(config.bloom.clone()),
            context: RenderContext::new(),
            clock: FrameClock::new(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            surface_size: None,
            initialized: false,
            last_stats: FrameStats::default(),
            applied_config: config.clone(),
            config,
        })
    }

    /// Create an engine from a TOML or RON configuration file
    pub fn from_config_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::new(EngineConfig::load_from_file(path)?)
    }

    /// Compile materials and bloom programs.
    ///
    /// A material failure is an error. A bloom failure is logged and the
    /// engine keeps running without bloom.
    pub fn initialize(&mut self, backend: &mut dyn GpuBackend) -> EngineResult<()> {
        self.materials.compile_all(backend)?;
        if !self.post.initialize(backend) {
            log::warn!("Continuing without bloom");
        }
        self.initialized = true;
        log::info!("Engine initialized ({} materials)", self.materials.len());
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) succeeded
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run one frame at the given surface size
    pub fn run_frame(
        &mut self,
        backend: &mut dyn GpuBackend,
        delta_time: f32,
        width: u32,
        height: u32,
    ) -> EngineResult<FrameStats> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        self.clock.advance(delta_time);
        self.apply_config();
        self.apply_surface_size(backend, width, height)?;

        let update_timer = Stopwatch::start_new();
        self.world.update(delta_time);
        let update_ms = update_timer.elapsed_millis();

        let render_timer = Stopwatch::start_new();
        let visible = self.scene.collect_visible_renderers(&mut self.camera);

        backend.set_viewport(Viewport::full(width, height));
        backend.clear(self.clear_color, ClearMask::COLOR | ClearMask::DEPTH);
        self.post.begin_capture(backend, width, height)?;
        let bloom_applied = self.post.state() == CaptureState::Capturing;

        let draws = match self.draw(backend, &visible, width, height) {
            Ok(draws) => draws,
            Err(error) => {
                self.post.abort_capture(backend);
                return Err(error.into());
            }
        };

        self.post.end_capture(backend)?;
        self.post.process(backend)?;

        let stats = FrameStats {
            frame: self.clock.frame_count(),
            delta_time,
            culling: self.scene.stats(),
            visible_renderers: visible.len(),
            draws,
            bloom_applied,
            update_ms,
            render_ms: render_timer.elapsed_millis(),
        };
        log::debug!(
            "Frame {}: {} visible, {} culled, {} draws, bloom {}",
            stats.frame,
            stats.culling.visible,
            stats.culling.culled,
            stats.draws.draw_calls,
            if bloom_applied { "on" } else { "off" }
        );
        self.last_stats = stats;
        Ok(stats)
    }

    fn draw(
        &mut self,
        backend: &mut dyn GpuBackend,
        visible: &[VisibleRenderer],
        width: u32,
        height: u32,
    ) -> RenderResult<DrawStats> {
        let frame = u32::try_from(self.clock.frame_count()).unwrap_or(u32::MAX);
        let globals = GlobalUniforms::new(self.clock.total_time(), frame, width, height);
        self.context.begin_frame(&mut self.camera, globals);
        let result = self
            .context
            .upload_globals(backend)
            .and_then(|()| self.context.render_visible(backend, &self.scene, &self.materials, visible));
        self.context.end_frame();
        result
    }

    /// Push configuration edits made through [`config_mut`](Self::config_mut)
    fn apply_config(&mut self) {
        if self.config == self.applied_config {
            return;
        }
        if self.config.bloom != self.applied_config.bloom {
            *self.post.settings_mut() = self.config.bloom.clone();
        }
        if self.config.culling != self.applied_config.culling {
            self.scene.set_culling(self.config.culling.clone());
        }
        if self.config.camera != self.applied_config.camera {
            let aspect = self
                .surface_size
                .filter(|&(_, height)| height > 0)
                .map_or(DEFAULT_ASPECT, |(width, height)| width as f32 / height as f32);
            let camera = &self.config.camera;
            self.camera.set_perspective(camera.fov_degrees, aspect, camera.near, camera.far);
        }
        log::debug!("Applied configuration changes");
        self.applied_config = self.config.clone();
    }

    fn apply_surface_size(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) -> EngineResult<()> {
        if self.surface_size == Some((width, height)) {
            return Ok(());
        }
        if height > 0 {
            self.camera.set_aspect_ratio(width as f32 / height as f32);
        }
        self.post.resize(backend, width, height)?;
        log::info!("Surface size {}x{}", width, height);
        self.surface_size = Some((width, height));
        Ok(())
    }

    /// Release every GPU resource owned by the engine
    pub fn shutdown(&mut self, backend: &mut dyn GpuBackend) {
        self.post.shutdown(backend);
        self.materials.release_all(backend);
        self.initialized = false;
        log::info!("Engine shutdown complete after {} frames", self.clock.frame_count());
    }

    /// Get the ECS world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Get the scene graph
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Get mutable access to the scene graph
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Get the camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Get mutable access to the camera
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Get the post-processor
    pub fn post(&self) -> &PostProcessor {
        &self.post
    }

    /// Get mutable access to the post-processor
    pub fn post_mut(&mut self) -> &mut PostProcessor {
        &mut self.post
    }

    /// Get the material library
    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    /// Get mutable access to the material library.
    ///
    /// Materials added after [`initialize`](Self::initialize) must be
    /// compiled with [`MaterialLibrary::compile_all`].
    pub fn materials_mut(&mut self) -> &mut MaterialLibrary {
        &mut self.materials
    }

    /// Current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable configuration, applied at the start of the next frame
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Colour the host framebuffer is cleared to each frame
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Frame clock
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Counters of the last completed frame
    pub fn last_stats(&self) -> &FrameStats {
        &self.last_stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::postprocess::shaders;
    use crate::render::camera::Projection;
    use crate::render::material::MaterialId;
    use crate::render::software::SoftwareBackend;
    use crate::scene::bounds::AABB;
    use crate::scene::node::MeshRenderer;
    use approx::assert_relative_eq;

    fn engine_with_cube(backend: &mut SoftwareBackend) -> Engine {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.camera_mut().look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros());

        let mesh = backend.register_mesh([0.2, 0.4, 0.6, 1.0]);
        let scene = engine.scene_mut();
        let cube = scene.create_node("cube");
        scene
            .set_renderable(
                cube,
                Box::new(MeshRenderer::new(mesh, None, AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(0.5)))),
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.camera.near = -1.0;
        assert!(matches!(Engine::new(config), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_frame_requires_initialize() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        assert!(matches!(
            engine.run_frame(&mut backend, 0.016, 4, 4),
            Err(EngineError::NotInitialized)
        ));
    }

    #[test]
    fn test_frame_draws_visible_scene_through_bloom() {
        let mut backend = SoftwareBackend::new(8, 8);
        let mut engine = engine_with_cube(&mut backend);
        engine.initialize(&mut backend).unwrap();

        let stats = engine.run_frame(&mut backend, 0.016, 8, 8).unwrap();
        assert_eq!(stats.frame, 1);
        assert_eq!(stats.visible_renderers, 1);
        assert_eq!(stats.draws.draw_calls, 1);
        assert!(stats.bloom_applied);

        // Dim mesh colour sits below the bloom threshold
        let pixel = backend.default_framebuffer().pixel(4, 4);
        assert_relative_eq!(pixel[0], 0.2, epsilon = 1e-5);
        assert_relative_eq!(pixel[2], 0.6, epsilon = 1e-5);
    }

    #[test]
    fn test_bloom_failure_keeps_engine_running() {
        let mut backend = SoftwareBackend::new(8, 8);
        backend.fail_program(shaders::EXTRACT_PROGRAM);
        let mut engine = engine_with_cube(&mut backend);
        engine.initialize(&mut backend).unwrap();

        let stats = engine.run_frame(&mut backend, 0.016, 8, 8).unwrap();
        assert!(!stats.bloom_applied);
        assert_eq!(stats.draws.draw_calls, 1);
        assert_relative_eq!(backend.default_framebuffer().pixel(4, 4)[1], 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_config_changes_apply_next_frame() {
        let mut backend = SoftwareBackend::new(8, 8);
        let mut engine = engine_with_cube(&mut backend);
        engine.initialize(&mut backend).unwrap();
        engine.run_frame(&mut backend, 0.016, 8, 8).unwrap();

        engine.config_mut().bloom.enabled = false;
        engine.config_mut().culling.frustum_culling = false;
        let stats = engine.run_frame(&mut backend, 0.016, 8, 8).unwrap();

        assert!(!stats.bloom_applied);
        assert!(!engine.post().settings().enabled);
        assert!(!engine.scene().culling().frustum_culling);
    }

    #[test]
    fn test_surface_resize_reaches_camera_and_bloom() {
        let mut backend = SoftwareBackend::new(8, 8);
        let mut engine = engine_with_cube(&mut backend);
        engine.initialize(&mut backend).unwrap();
        engine.run_frame(&mut backend, 0.016, 8, 8).unwrap();

        backend.resize(16, 8);
        engine.run_frame(&mut backend, 0.016, 16, 8).unwrap();
        assert_eq!(engine.post().capture_size(), Some((16, 8)));
        match engine.camera().projection() {
            Projection::Perspective { aspect, .. } => assert_relative_eq!(*aspect, 2.0),
            other => panic!("unexpected projection {other:?}"),
        }
    }

    #[test]
    fn test_shutdown_releases_gpu_resources() {
        let mut backend = SoftwareBackend::new(8, 8);
        let mut engine = engine_with_cube(&mut backend);
        engine.initialize(&mut backend).unwrap();
        engine.run_frame(&mut backend, 0.016, 8, 8).unwrap();

        engine.shutdown(&mut backend);
        assert_eq!(backend.live_target_count(), 0);
        assert!(!engine.is_initialized());
        assert!(!engine.materials().get(MaterialId::DEFAULT).unwrap().is_ready(&backend));
    }
}
