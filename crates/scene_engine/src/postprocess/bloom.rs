//! Bloom post-processing
//!
//! # Pipeline
//!
//! 1. Capture: the host renders into a full-resolution scene target
//! 2. Extract: soft-knee bright pass into a half-resolution target
//! 3. Blur: `iterations * 2` separable Gaussian passes alternating between
//!    two half-resolution ping-pong targets
//! 4. Composite: scene plus blurred bloom, alpha blended over the
//!    framebuffer that was bound before capture
//!
//! A pass never samples the target it writes to. Targets are owned by the
//! [`PostProcessor`] and reallocated when the capture resolution changes.

use serde::{Deserialize, Serialize};

use crate::render::backend::{
    ClearMask, FramebufferBinding, GpuBackend, ProgramHandle, RenderError, RenderResult, RenderState, ShaderValue,
    TargetHandle, Viewport,
};

use super::kernels::{gaussian_weights, BLUR_TAPS};
use super::shaders;

/// Upper bound of [`BloomSettings::iterations`] accepted by the setter
pub const MAX_ITERATIONS: u32 = 16;

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Tunable bloom parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    /// Run the pipeline at all
    pub enabled: bool,
    /// Luminance above which pixels bloom
    pub threshold: f32,
    /// Width of the soft transition around the threshold, as a fraction of it
    pub soft_knee: f32,
    /// Bloom strength; zero leaves the scene untouched
    pub intensity: f32,
    /// Horizontal plus vertical blur pairs
    pub iterations: u32,
    /// Exposure applied to the bloom term
    pub exposure: f32,
    /// Reinhard-tonemap the bloom term
    pub tonemap: bool,
    /// How strongly glow raises alpha over transparent background
    pub alpha_scale: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.8,
            soft_knee: 0.5,
            intensity: 1.0,
            iterations: 4,
            exposure: 1.0,
            tonemap: true,
            alpha_scale: 1.0,
        }
    }
}

impl BloomSettings {
    /// Set the number of blur pairs, clamped to `1..=MAX_ITERATIONS`
    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations.clamp(1, MAX_ITERATIONS);
    }

    /// Validate ranges
    pub fn validate(&self) -> Result<(), String> {
        if !is_non_negative(self.threshold) {
            return Err(format!("Bloom threshold must be non-negative: {}", self.threshold));
        }
        if !(0.0..=1.0).contains(&self.soft_knee) {
            return Err(format!("Bloom soft knee must be within [0, 1]: {}", self.soft_knee));
        }
        if !is_non_negative(self.intensity) {
            return Err(format!("Bloom intensity must be non-negative: {}", self.intensity));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(format!("Bloom iterations must be at most {MAX_ITERATIONS}: {}", self.iterations));
        }
        if !(is_non_negative(self.exposure) && self.exposure != 0.0) {
            return Err(format!("Bloom exposure must be positive: {}", self.exposure));
        }
        if !is_non_negative(self.alpha_scale) {
            return Err(format!("Bloom alpha scale must be non-negative: {}", self.alpha_scale));
        }
        Ok(())
    }
}

/// False for negative values and NaN
fn is_non_negative(value: f32) -> bool {
    value >= 0.0
}

/// Stage of the per-frame capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No capture in progress
    #[default]
    Idle,
    /// The scene target is bound and receiving the frame
    Capturing,
    /// The frame is captured and waiting for [`PostProcessor::process`]
    Captured,
}

#[derive(Debug, Clone, Copy)]
struct BloomPrograms {
    extract: ProgramHandle,
    blur: ProgramHandle,
    composite: ProgramHandle,
}

impl BloomPrograms {
    fn handles(self) -> [ProgramHandle; 3] {
        [self.extract, self.blur, self.composite]
    }
}

#[derive(Debug, Clone, Copy)]
struct BloomTargets {
    width: u32,
    height: u32,
    scene: TargetHandle,
    bright: TargetHandle,
    ping: TargetHandle,
    pong: TargetHandle,
}

impl BloomTargets {
    fn half_size(&self) -> (u32, u32) {
        half_resolution(self.width, self.height)
    }

    fn handles(&self) -> [TargetHandle; 4] {
        [self.scene, self.bright, self.ping, self.pong]
    }
}

fn half_resolution(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Bloom pipeline state machine
///
/// Per frame the host calls [`begin_capture`](Self::begin_capture), draws
/// its scene, then calls [`end_capture`](Self::end_capture) and
/// [`process`](Self::process). When the processor is disabled or failed to
/// initialize, all three are no-ops and the host draws straight into its
/// own framebuffer.
#[derive(Debug, Default)]
pub struct PostProcessor {
    settings: BloomSettings,
    programs: Option<BloomPrograms>,
    targets: Option<BloomTargets>,
    state: CaptureState,
    saved_binding: Option<FramebufferBinding>,
    saved_render_state: Option<RenderState>,
}

impl PostProcessor {
    /// Uninitialized processor with the given settings
    pub fn new(settings: BloomSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Compile the three bloom programs.
    ///
    /// Returns `false` if any program fails; the processor then stays
    /// disabled until initialized again.
    pub fn initialize(&mut self, backend: &mut dyn GpuBackend) -> bool {
        self.release_programs(backend);

        let mut compiled = Vec::with_capacity(3);
        for source in [shaders::extract_source(), shaders::blur_source(), shaders::composite_source()] {
            match backend.compile_program(&source) {
                Ok(program) => compiled.push(program),
                Err(error) => {
                    log::error!("Bloom disabled: {}", error);
                    for program in compiled {
                        backend.delete_program(program);
                    }
                    return false;
                }
            }
        }

        self.programs = Some(BloomPrograms {
            extract: compiled[0],
            blur: compiled[1],
            composite: compiled[2],
        });
        log::info!("Bloom post-processor initialized");
        true
    }

    /// Whether all programs compiled
    pub fn is_initialized(&self) -> bool {
        self.programs.is_some()
    }

    /// Whether the next frame will be captured
    pub fn is_active(&self) -> bool {
        self.settings.enabled && self.programs.is_some()
    }

    /// Current stage of the capture cycle
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Current settings
    pub fn settings(&self) -> &BloomSettings {
        &self.settings
    }

    /// Mutable settings, read at the next [`process`](Self::process)
    pub fn settings_mut(&mut self) -> &mut BloomSettings {
        &mut self.settings
    }

    /// Enable or disable capturing from the next frame on
    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    /// Set the bright-pass threshold
    pub fn set_threshold(&mut self, threshold: f32) {
        self.settings.threshold = threshold;
    }

    /// Set the soft knee
    pub fn set_soft_knee(&mut self, soft_knee: f32) {
        self.settings.soft_knee = soft_knee;
    }

    /// Set the bloom intensity
    pub fn set_intensity(&mut self, intensity: f32) {
        self.settings.intensity = intensity;
    }

    /// Set the number of blur pairs, clamped to `1..=MAX_ITERATIONS`
    pub fn set_iterations(&mut self, iterations: u32) {
        self.settings.set_iterations(iterations);
    }

    /// Set the exposure
    pub fn set_exposure(&mut self, exposure: f32) {
        self.settings.exposure = exposure;
    }

    /// Toggle tonemapping of the bloom term
    pub fn set_tonemap(&mut self, tonemap: bool) {
        self.settings.tonemap = tonemap;
    }

    /// Set the alpha scale
    pub fn set_alpha_scale(&mut self, alpha_scale: f32) {
        self.settings.alpha_scale = alpha_scale;
    }

    /// Resolution of the current scene target
    pub fn capture_size(&self) -> Option<(u32, u32)> {
        self.targets.map(|targets| (targets.width, targets.height))
    }

    /// Scene target the host renders into while capturing
    pub fn scene_target(&self) -> Option<TargetHandle> {
        self.targets.map(|targets| targets.scene)
    }

    /// Bind the scene target and clear it.
    ///
    /// Targets are (re)allocated when `width x height` differs from the
    /// previous capture. The framebuffer bound before the call is restored
    /// for the composite.
    pub fn begin_capture(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) -> RenderResult<()> {
        if !self.is_active() {
            return Ok(());
        }
        if self.state != CaptureState::Idle {
            log::warn!("begin_capture called in state {:?}, ignoring", self.state);
            return Ok(());
        }
        if width == 0 || height == 0 {
            log::warn!("Skipping bloom capture of empty surface {}x{}", width, height);
            return Ok(());
        }

        self.ensure_targets(backend, width, height)?;
        let scene = self
            .scene_target()
            .ok_or_else(|| RenderError::Backend("Bloom targets missing after allocation".to_string()))?;

        self.saved_binding = Some(backend.current_framebuffer());
        self.saved_render_state = Some(backend.render_state());

        backend.bind_target(Some(scene))?;
        backend.set_viewport(Viewport::full(width, height));
        backend.clear(TRANSPARENT, ClearMask::COLOR | ClearMask::DEPTH);
        self.state = CaptureState::Capturing;
        Ok(())
    }

    /// Stop capturing and rebind the host framebuffer
    pub fn end_capture(&mut self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        match self.state {
            CaptureState::Capturing => {
                self.restore_binding(backend)?;
                self.state = CaptureState::Captured;
                Ok(())
            }
            CaptureState::Idle if !self.is_active() => Ok(()),
            state => {
                log::warn!("end_capture called in state {:?}, ignoring", state);
                Ok(())
            }
        }
    }

    /// Run extract, blur and composite over the captured frame.
    ///
    /// The composite is drawn into the framebuffer that was bound when the
    /// capture began. On error the host binding is still restored.
    pub fn process(&mut self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        if self.state != CaptureState::Captured {
            if self.is_active() {
                log::warn!("process called in state {:?}, ignoring", self.state);
            }
            return Ok(());
        }
        self.state = CaptureState::Idle;

        let result = self.run_passes(backend);
        if let Err(error) = &result {
            log::error!("Bloom pass failed: {}", error);
            // Best effort; the original error is what the caller needs
            let _ = self.restore_binding(backend);
        }
        if let Some(state) = self.saved_render_state.take() {
            backend.set_render_state(state);
        }
        self.saved_binding = None;
        result
    }

    /// Abandon a capture in progress and rebind the host framebuffer
    pub fn abort_capture(&mut self, backend: &mut dyn GpuBackend) {
        if self.state == CaptureState::Idle {
            return;
        }
        log::warn!("Aborting bloom capture in state {:?}", self.state);
        if let Err(error) = self.restore_binding(backend) {
            log::error!("Failed to restore host framebuffer: {}", error);
        }
        if let Some(state) = self.saved_render_state.take() {
            backend.set_render_state(state);
        }
        self.saved_binding = None;
        self.state = CaptureState::Idle;
    }

    /// Reallocate targets for a new resolution if a capture size is known
    pub fn resize(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) -> RenderResult<()> {
        if self.targets.is_some() && width > 0 && height > 0 {
            self.ensure_targets(backend, width, height)?;
        }
        Ok(())
    }

    /// Delete every target; they are recreated by the next capture
    pub fn release_targets(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(targets) = self.targets.take() {
            for target in targets.handles() {
                backend.delete_target(target);
            }
            log::debug!("Released bloom targets {}x{}", targets.width, targets.height);
        }
    }

    /// Delete every GPU resource and return to the uninitialized state
    pub fn shutdown(&mut self, backend: &mut dyn GpuBackend) {
        self.abort_capture(backend);
        self.release_targets(backend);
        self.release_programs(backend);
        log::info!("Bloom post-processor shut down");
    }

    fn release_programs(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(programs) = self.programs.take() {
            for program in programs.handles() {
                backend.delete_program(program);
            }
        }
    }

    fn ensure_targets(&mut self, backend: &mut dyn GpuBackend, width: u32, height: u32) -> RenderResult<()> {
        if let Some(targets) = &self.targets {
            if targets.width == width && targets.height == height {
                return Ok(());
            }
            log::info!(
                "Bloom resolution changed {}x{} -> {}x{}",
                targets.width,
                targets.height,
                width,
                height
            );
        }
        self.release_targets(backend);

        let (half_width, half_height) = half_resolution(width, height);
        let mut created = Vec::with_capacity(4);
        let sizes = [(width, height), (half_width, half_height), (half_width, half_height), (half_width, half_height)];
        for (target_width, target_height) in sizes {
            match backend.create_target(target_width, target_height) {
                Ok(target) => created.push(target),
                Err(error) => {
                    for target in created {
                        backend.delete_target(target);
                    }
                    return Err(error);
                }
            }
        }

        self.targets = Some(BloomTargets {
            width,
            height,
            scene: created[0],
            bright: created[1],
            ping: created[2],
            pong: created[3],
        });
        log::debug!("Allocated bloom targets {}x{} (half {}x{})", width, height, half_width, half_height);
        Ok(())
    }

    fn restore_binding(&self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        if let Some(binding) = self.saved_binding {
            backend.bind_target(binding.target)?;
            backend.set_viewport(binding.viewport);
        }
        Ok(())
    }

    fn run_passes(&self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        let programs = self
            .programs
            .ok_or_else(|| RenderError::Backend("Bloom programs not initialized".to_string()))?;
        let targets = self
            .targets
            .ok_or_else(|| RenderError::Backend("Bloom targets not allocated".to_string()))?;
        let settings = &self.settings;
        let (half_width, half_height) = targets.half_size();
        let scene_texture = backend.color_texture(targets.scene)?;

        backend.set_render_state(RenderState::FULLSCREEN);

        // Extract
        backend.bind_target(Some(targets.bright))?;
        backend.set_viewport(Viewport::full(half_width, half_height));
        backend.use_program(programs.extract)?;
        backend.set_parameter("u_scene", ShaderValue::Sampler(0))?;
        backend.set_parameter("u_threshold", ShaderValue::Float(settings.threshold))?;
        backend.set_parameter("u_softKnee", ShaderValue::Float(settings.soft_knee))?;
        backend.bind_texture(0, scene_texture)?;
        backend.draw_fullscreen()?;

        // Blur, always writing the target not read from
        backend.use_program(programs.blur)?;
        backend.set_parameter("u_source", ShaderValue::Sampler(0))?;
        backend.set_parameter("u_weights", ShaderValue::FloatArray(gaussian_weights(BLUR_TAPS)))?;
        let texel = [1.0 / half_width as f32, 1.0 / half_height as f32];
        let mut source = targets.bright;
        for pass in 0..settings.iterations * 2 {
            let (destination, direction) = if pass % 2 == 0 {
                (targets.ping, [texel[0], 0.0])
            } else {
                (targets.pong, [0.0, texel[1]])
            };
            backend.bind_target(Some(destination))?;
            backend.set_parameter("u_direction", ShaderValue::Vec2(direction.into()))?;
            let source_texture = backend.color_texture(source)?;
            backend.bind_texture(0, source_texture)?;
            backend.draw_fullscreen()?;
            source = destination;
        }

        // Composite over the host framebuffer
        self.restore_binding(backend)?;
        backend.set_render_state(RenderState::OVERLAY);
        backend.use_program(programs.composite)?;
        backend.set_parameter("u_scene", ShaderValue::Sampler(0))?;
        backend.set_parameter("u_bloom", ShaderValue::Sampler(1))?;
        backend.set_parameter("u_intensity", ShaderValue::Float(settings.intensity))?;
        backend.set_parameter("u_exposure", ShaderValue::Float(settings.exposure))?;
        backend.set_parameter("u_tonemap", ShaderValue::Bool(settings.tonemap))?;
        backend.set_parameter("u_alphaScale", ShaderValue::Float(settings.alpha_scale))?;
        backend.bind_texture(0, scene_texture)?;
        let bloom_texture = backend.color_texture(source)?;
        backend.bind_texture(1, bloom_texture)?;
        backend.draw_fullscreen()?;

        log::trace!(
            "Bloom processed {}x{} with {} blur passes",
            targets.width,
            targets.height,
            settings.iterations * 2
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::TextureHandle;
    use crate::render::software::{BackendCommand, SoftwareBackend};
    use approx::assert_relative_eq;

    fn initialized(width: u32, height: u32, settings: BloomSettings) -> (SoftwareBackend, PostProcessor) {
        let mut backend = SoftwareBackend::new(width, height);
        let mut post = PostProcessor::new(settings);
        assert!(post.initialize(&mut backend));
        (backend, post)
    }

    fn run_frame(backend: &mut SoftwareBackend, post: &mut PostProcessor, draw: impl FnOnce(&mut SoftwareBackend)) {
        let (width, height) = backend.surface_size();
        post.begin_capture(backend, width, height).unwrap();
        draw(backend);
        post.end_capture(backend).unwrap();
        post.process(backend).unwrap();
    }

    fn fullscreen_draws(commands: &[BackendCommand]) -> Vec<(String, Option<TargetHandle>, Vec<TextureHandle>)> {
        commands
            .iter()
            .filter_map(|command| match command {
                BackendCommand::DrawFullscreen { program, target, inputs } => {
                    Some((program.clone(), *target, inputs.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_set_iterations_clamps() {
        let mut settings = BloomSettings::default();
        settings.set_iterations(0);
        assert_eq!(settings.iterations, 1);
        settings.set_iterations(100);
        assert_eq!(settings.iterations, MAX_ITERATIONS);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_pass_sequence() {
        let mut settings = BloomSettings::default();
        settings.set_iterations(2);
        let (mut backend, mut post) = initialized(8, 8, settings);
        backend.take_commands();

        run_frame(&mut backend, &mut post, |_| {});

        let draws = fullscreen_draws(backend.commands());
        let programs: Vec<_> = draws.iter().map(|(program, _, _)| program.as_str()).collect();
        assert_eq!(
            programs,
            vec![
                shaders::EXTRACT_PROGRAM,
                shaders::BLUR_PROGRAM,
                shaders::BLUR_PROGRAM,
                shaders::BLUR_PROGRAM,
                shaders::BLUR_PROGRAM,
                shaders::COMPOSITE_PROGRAM,
            ]
        );

        // Each blur reads the previous pass's output and never its own target
        for window in draws.windows(2).take(4) {
            let (_, written, _) = &window[0];
            let (_, next_target, next_inputs) = &window[1];
            let written = written.unwrap();
            assert_eq!(next_inputs[0].0, written.0);
            assert_ne!(next_target.map(|t| t.0), Some(written.0));
        }
        for (_, target, inputs) in &draws {
            if let Some(target) = target {
                assert!(inputs.iter().all(|input| input.0 != target.0));
            }
        }

        let (_, composite_target, composite_inputs) = draws.last().unwrap();
        assert_eq!(*composite_target, None);
        assert_eq!(composite_inputs[0].0, post.scene_target().unwrap().0);
        assert_eq!(post.state(), CaptureState::Idle);
        assert_eq!(backend.current_framebuffer().target, None);
    }

    #[test]
    fn test_shader_failure_disables_bloom() {
        let mut backend = SoftwareBackend::new(8, 8);
        backend.fail_program(shaders::COMPOSITE_PROGRAM);
        let mut post = PostProcessor::new(BloomSettings::default());

        assert!(!post.initialize(&mut backend));
        assert!(!post.is_active());

        run_frame(&mut backend, &mut post, |_| {});
        assert_eq!(post.state(), CaptureState::Idle);
        assert_eq!(backend.live_target_count(), 0);
        assert!(fullscreen_draws(backend.commands()).is_empty());
    }

    #[test]
    fn test_disabled_processor_is_passthrough() {
        let settings = BloomSettings {
            enabled: false,
            ..BloomSettings::default()
        };
        let (mut backend, mut post) = initialized(4, 4, settings);
        run_frame(&mut backend, &mut post, |_| {});
        assert_eq!(backend.live_target_count(), 0);
        assert!(fullscreen_draws(backend.commands()).is_empty());
    }

    #[test]
    fn test_resolution_change_reallocates_targets() {
        let (mut backend, mut post) = initialized(8, 8, BloomSettings::default());
        run_frame(&mut backend, &mut post, |_| {});
        assert_eq!(backend.live_target_count(), 4);

        backend.take_commands();
        run_frame(&mut backend, &mut post, |_| {});
        let created = backend
            .commands()
            .iter()
            .filter(|command| matches!(command, BackendCommand::CreateTarget { .. }))
            .count();
        assert_eq!(created, 0);

        backend.resize(16, 8);
        backend.take_commands();
        run_frame(&mut backend, &mut post, |_| {});
        let deleted = backend
            .commands()
            .iter()
            .filter(|command| matches!(command, BackendCommand::DeleteTarget(_)))
            .count();
        assert_eq!(deleted, 4);
        assert_eq!(backend.live_target_count(), 4);
        assert_eq!(post.capture_size(), Some((16, 8)));
    }

    #[test]
    fn test_zero_intensity_is_neutral() {
        let settings = BloomSettings {
            intensity: 0.0,
            ..BloomSettings::default()
        };
        let (mut backend, mut post) = initialized(8, 8, settings);
        backend.default_framebuffer_mut().fill([0.1, 0.2, 0.3, 1.0]);
        let mesh = backend.register_mesh([0.5, 0.25, 1.0, 1.0]);

        run_frame(&mut backend, &mut post, |backend| backend.draw_mesh(mesh).unwrap());

        for pixel in backend.default_framebuffer().pixels() {
            assert_relative_eq!(pixel[0], 0.5);
            assert_relative_eq!(pixel[1], 0.25);
            assert_relative_eq!(pixel[2], 1.0);
            assert_relative_eq!(pixel[3], 1.0);
        }
    }

    #[test]
    fn test_glow_spreads_into_transparent_background() {
        let (mut backend, mut post) = initialized(16, 16, BloomSettings::default());
        let mesh = backend.register_mesh_in_rect([4.0, 4.0, 4.0, 1.0], [0.375, 0.375, 0.625, 0.625]);

        run_frame(&mut backend, &mut post, |backend| backend.draw_mesh(mesh).unwrap());

        let outside = backend.default_framebuffer().pixel(4, 8);
        assert!(outside[0] > 0.0);
        assert!(outside[3] > 0.0);
        let inside = backend.default_framebuffer().pixel(8, 8);
        assert!(inside[0] >= 4.0);
    }

    #[test]
    fn test_composite_targets_host_framebuffer() {
        let (mut backend, mut post) = initialized(8, 8, BloomSettings::default());
        let host = backend.create_target(8, 8).unwrap();
        backend.bind_target(Some(host)).unwrap();
        backend.take_commands();

        run_frame(&mut backend, &mut post, |_| {});

        let draws = fullscreen_draws(backend.commands());
        assert_eq!(draws.last().unwrap().1, Some(host));
        assert_eq!(backend.current_framebuffer().target, Some(host));
    }

    #[test]
    fn test_out_of_order_calls_are_ignored() {
        let (mut backend, mut post) = initialized(4, 4, BloomSettings::default());
        post.process(&mut backend).unwrap();
        post.end_capture(&mut backend).unwrap();
        assert_eq!(post.state(), CaptureState::Idle);
        assert!(fullscreen_draws(backend.commands()).is_empty());

        post.begin_capture(&mut backend, 4, 4).unwrap();
        post.begin_capture(&mut backend, 4, 4).unwrap();
        assert_eq!(post.state(), CaptureState::Capturing);
    }

    #[test]
    fn test_abort_restores_host_binding() {
        let (mut backend, mut post) = initialized(4, 4, BloomSettings::default());
        post.begin_capture(&mut backend, 4, 4).unwrap();
        assert_eq!(backend.current_framebuffer().target, post.scene_target());

        post.abort_capture(&mut backend);
        assert_eq!(post.state(), CaptureState::Idle);
        assert_eq!(backend.current_framebuffer().target, None);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (mut backend, mut post) = initialized(4, 4, BloomSettings::default());
        run_frame(&mut backend, &mut post, |_| {});
        post.shutdown(&mut backend);
        assert_eq!(backend.live_target_count(), 0);
        assert!(!post.is_initialized());
    }
}
