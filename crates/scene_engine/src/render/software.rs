//! CPU reference backend
//!
//! `SoftwareBackend` implements [`GpuBackend`] with RGBA `f32` pixel
//! buffers. It records every call in a command log and executes the three
//! bloom programs with the CPU kernels in [`crate::postprocess::kernels`],
//! so the whole frame pipeline can run and be inspected without a GPU.
//!
//! Meshes are flat-coloured rectangles in normalized viewport coordinates.
//! Sampling is nearest-neighbour with clamp-to-edge addressing, and there is
//! no depth buffer.

use std::collections::{HashMap, HashSet};

use crate::foundation::math::Vec2;
use crate::postprocess::kernels::{self, CompositeParams};
use crate::postprocess::shaders::{BLUR_PROGRAM, COMPOSITE_PROGRAM, EXTRACT_PROGRAM};
use crate::render::backend::{
    BlendMode, ClearMask, FramebufferBinding, GpuBackend, MeshHandle, ProgramHandle, RenderError,
    RenderResult, RenderState, ShaderSource, ShaderValue, TargetHandle, TextureHandle, Viewport,
};

/// RGBA pixel buffer, row 0 at the bottom
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Image {
    /// Transparent black image
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; (width as usize) * (height as usize)],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All pixels, row by row from the bottom
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    /// Pixel at `(x, y)`; transparent black outside the image
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.index(x, y).map_or([0.0; 4], |index| self.pixels[index])
    }

    /// Overwrite one pixel; ignored outside the image
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [f32; 4]) {
        if let Some(index) = self.index(x, y) {
            self.pixels[index] = color;
        }
    }

    /// Overwrite every pixel
    pub fn fill(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    /// Nearest-neighbour sample with clamp-to-edge addressing
    pub fn sample_nearest(&self, uv: [f32; 2]) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 4];
        }
        let x = Self::texel(uv[0], self.width);
        let y = Self::texel(uv[1], self.height);
        self.pixel(x, y)
    }

    fn texel(coordinate: f32, size: u32) -> u32 {
        let scaled = (coordinate * size as f32).floor();
        scaled.clamp(0.0, (size - 1) as f32) as u32
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize) * (self.width as usize) + x as usize)
    }
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    /// Target allocated
    CreateTarget {
        /// New handle
        target: TargetHandle,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Target released
    DeleteTarget(TargetHandle),
    /// Framebuffer bound (`None` = default)
    BindTarget(Option<TargetHandle>),
    /// Viewport changed
    SetViewport(Viewport),
    /// Bound framebuffer cleared
    Clear {
        /// Cleared framebuffer
        target: Option<TargetHandle>,
        /// Clear colour
        color: [f32; 4],
        /// Cleared buffers
        mask: ClearMask,
    },
    /// Compilation attempted
    CompileProgram {
        /// Program name
        name: String,
        /// Whether it linked
        success: bool,
    },
    /// Program selected
    UseProgram(String),
    /// Parameter set on the current program
    SetParameter {
        /// Parameter name
        name: String,
        /// New value
        value: ShaderValue,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Sampler unit
        unit: u32,
        /// Bound texture
        texture: TextureHandle,
    },
    /// Depth/blend state applied
    SetRenderState(RenderState),
    /// Full-screen pass executed
    DrawFullscreen {
        /// Program name
        program: String,
        /// Written framebuffer
        target: Option<TargetHandle>,
        /// Sampled textures
        inputs: Vec<TextureHandle>,
    },
    /// Mesh drawn
    DrawMesh {
        /// Drawn mesh
        mesh: MeshHandle,
        /// Written framebuffer
        target: Option<TargetHandle>,
    },
    /// Uniform block uploaded
    UploadUniformBlock {
        /// Block name
        name: String,
        /// Size in bytes
        size: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgramKind {
    Extract,
    Blur,
    Composite,
    Flat,
}

impl ProgramKind {
    fn from_name(name: &str) -> Self {
        match name {
            EXTRACT_PROGRAM => Self::Extract,
            BLUR_PROGRAM => Self::Blur,
            COMPOSITE_PROGRAM => Self::Composite,
            _ => Self::Flat,
        }
    }

    /// Sampler parameters read by the program with their default units
    fn samplers(self) -> &'static [(&'static str, u32)] {
        match self {
            Self::Extract => &[("u_scene", 0)],
            Self::Blur => &[("u_source", 0)],
            Self::Composite => &[("u_scene", 0), ("u_bloom", 1)],
            Self::Flat => &[],
        }
    }
}

#[derive(Debug)]
struct SoftwareProgram {
    name: String,
    kind: ProgramKind,
    parameters: HashMap<String, ShaderValue>,
}

impl SoftwareProgram {
    fn float(&self, name: &str, default: f32) -> f32 {
        self.parameters.get(name).and_then(ShaderValue::as_float).unwrap_or(default)
    }
}

#[derive(Debug, Clone, Copy)]
struct SoftwareMesh {
    color: [f32; 4],
    /// `[x0, y0, x1, y1]` in normalized viewport coordinates
    rect: [f32; 4],
}

/// CPU implementation of [`GpuBackend`]
#[derive(Debug)]
pub struct SoftwareBackend {
    default_framebuffer: Image,
    targets: HashMap<TargetHandle, Image>,
    programs: HashMap<ProgramHandle, SoftwareProgram>,
    meshes: HashMap<MeshHandle, SoftwareMesh>,
    texture_units: HashMap<u32, TextureHandle>,
    bound_target: Option<TargetHandle>,
    viewport: Viewport,
    state: RenderState,
    current_program: Option<ProgramHandle>,
    failing_programs: HashSet<String>,
    uniform_blocks: HashMap<String, Vec<u8>>,
    commands: Vec<BackendCommand>,
    next_handle: u64,
}

impl SoftwareBackend {
    /// Backend with a `width x height` default framebuffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            default_framebuffer: Image::new(width, height),
            targets: HashMap::new(),
            programs: HashMap::new(),
            meshes: HashMap::new(),
            texture_units: HashMap::new(),
            bound_target: None,
            viewport: Viewport::full(width, height),
            state: RenderState::default(),
            current_program: None,
            failing_programs: HashSet::new(),
            uniform_blocks: HashMap::new(),
            commands: Vec::new(),
            next_handle: 1,
        }
    }

    /// Resize the default framebuffer (contents are cleared)
    pub fn resize(&mut self, width: u32, height: u32) {
        self.default_framebuffer = Image::new(width, height);
        if self.bound_target.is_none() {
            self.viewport = Viewport::full(width, height);
        }
        log::info!("Software surface resized to {}x{}", width, height);
    }

    /// Make every later compilation of `name` fail
    pub fn fail_program(&mut self, name: impl Into<String>) {
        self.failing_programs.insert(name.into());
    }

    /// Register a mesh that fills the whole viewport with a flat colour
    pub fn register_mesh(&mut self, color: [f32; 4]) -> MeshHandle {
        self.register_mesh_in_rect(color, [0.0, 0.0, 1.0, 1.0])
    }

    /// Register a mesh covering `[x0, y0, x1, y1]` of the viewport
    pub fn register_mesh_in_rect(&mut self, color: [f32; 4], rect: [f32; 4]) -> MeshHandle {
        let handle = MeshHandle(self.allocate_handle());
        self.meshes.insert(handle, SoftwareMesh { color, rect });
        handle
    }

    /// Pixels of a framebuffer (`None` = default)
    pub fn image(&self, target: Option<TargetHandle>) -> Option<&Image> {
        match target {
            Some(target) => self.targets.get(&target),
            None => Some(&self.default_framebuffer),
        }
    }

    /// Default framebuffer pixels
    pub fn default_framebuffer(&self) -> &Image {
        &self.default_framebuffer
    }

    /// Mutable default framebuffer, e.g. to stand in for host content
    pub fn default_framebuffer_mut(&mut self) -> &mut Image {
        &mut self.default_framebuffer
    }

    /// Every call recorded so far
    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Last value set for a program parameter
    pub fn program_parameter(&self, program: ProgramHandle, name: &str) -> Option<&ShaderValue> {
        self.programs.get(&program)?.parameters.get(name)
    }

    /// Number of live off-screen targets
    pub fn live_target_count(&self) -> usize {
        self.targets.len()
    }

    /// Bytes of an uploaded uniform block
    pub fn uniform_block(&self, name: &str) -> Option<&[u8]> {
        self.uniform_blocks.get(name).map(Vec::as_slice)
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn bound_image_mut(&mut self) -> RenderResult<&mut Image> {
        match self.bound_target {
            Some(target) => self
                .targets
                .get_mut(&target)
                .ok_or_else(|| RenderError::InvalidHandle(format!("{target:?}"))),
            None => Ok(&mut self.default_framebuffer),
        }
    }

    fn texture_image(&self, texture: TextureHandle) -> RenderResult<&Image> {
        self.targets
            .get(&TargetHandle(texture.0))
            .ok_or_else(|| RenderError::InvalidHandle(format!("{texture:?}")))
    }

    /// Texture sampled by a program sampler parameter
    fn sampler_texture(&self, program: &SoftwareProgram, sampler: &str, default_unit: u32) -> RenderResult<TextureHandle> {
        let unit = match program.parameters.get(sampler) {
            Some(ShaderValue::Sampler(unit)) => *unit,
            _ => default_unit,
        };
        self.texture_units.get(&unit).copied().ok_or_else(|| {
            RenderError::Backend(format!("'{}' samples unit {unit} with no texture bound", program.name))
        })
    }

    /// Pixel rectangle of the viewport clipped to a `width x height` surface
    fn clipped_viewport(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let viewport = self.viewport;
        let x_end = (viewport.x + viewport.width).min(width);
        let y_end = (viewport.y + viewport.height).min(height);
        (viewport.x.min(x_end), viewport.y.min(y_end), x_end, y_end)
    }

    fn shade_fullscreen(&self, program: &SoftwareProgram, inputs: &[TextureHandle]) -> RenderResult<Vec<(u32, u32, [f32; 4])>> {
        let images = inputs
            .iter()
            .map(|&texture| self.texture_image(texture))
            .collect::<RenderResult<Vec<_>>>()?;
        let (width, height) = self.surface_of(self.bound_target);
        let (x0, y0, x1, y1) = self.clipped_viewport(width, height);
        let viewport = self.viewport;

        let weights = match program.parameters.get("u_weights") {
            Some(ShaderValue::FloatArray(weights)) => weights.clone(),
            _ => kernels::gaussian_weights(kernels::BLUR_TAPS),
        };
        let direction = match program.parameters.get("u_direction") {
            Some(ShaderValue::Vec2(direction)) => *direction,
            _ => Vec2::zeros(),
        };
        let composite = CompositeParams {
            intensity: program.float("u_intensity", 1.0),
            exposure: program.float("u_exposure", 1.0),
            tonemap: program.parameters.get("u_tonemap").and_then(ShaderValue::as_bool).unwrap_or(false),
            alpha_scale: program.float("u_alphaScale", 1.0),
        };
        let color = match program.parameters.get("u_color") {
            Some(ShaderValue::Vec4(color)) => [color.x, color.y, color.z, color.w],
            _ => [1.0; 4],
        };

        let mut output = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for y in y0..y1 {
            for x in x0..x1 {
                let uv = [
                    ((x - viewport.x) as f32 + 0.5) / viewport.width as f32,
                    ((y - viewport.y) as f32 + 0.5) / viewport.height as f32,
                ];
                let shaded = match program.kind {
                    ProgramKind::Extract => kernels::bright_pass(
                        images[0].sample_nearest(uv),
                        program.float("u_threshold", 1.0),
                        program.float("u_softKnee", 0.0),
                    ),
                    ProgramKind::Blur => kernels::blur(
                        |at| images[0].sample_nearest(at),
                        uv,
                        [direction.x, direction.y],
                        &weights,
                    ),
                    ProgramKind::Composite => {
                        kernels::composite(images[0].sample_nearest(uv), images[1].sample_nearest(uv), &composite)
                    }
                    ProgramKind::Flat => color,
                };
                output.push((x, y, shaded));
            }
        }
        Ok(output)
    }

    fn surface_of(&self, target: Option<TargetHandle>) -> (u32, u32) {
        self.image(target).map_or((0, 0), |image| (image.width, image.height))
    }

    fn write_blended(&mut self, fragments: Vec<(u32, u32, [f32; 4])>) -> RenderResult<()> {
        let blend = self.state.blend;
        let image = self.bound_image_mut()?;
        for (x, y, source) in fragments {
            let destination = image.pixel(x, y);
            image.set_pixel(x, y, blend_fragment(blend, source, destination));
        }
        Ok(())
    }
}

/// Apply the blend equation to one fragment
fn blend_fragment(mode: BlendMode, source: [f32; 4], destination: [f32; 4]) -> [f32; 4] {
    match mode {
        BlendMode::Disabled => source,
        BlendMode::Alpha => {
            let alpha = source[3];
            [
                source[0] * alpha + destination[0] * (1.0 - alpha),
                source[1] * alpha + destination[1] * (1.0 - alpha),
                source[2] * alpha + destination[2] * (1.0 - alpha),
                alpha + destination[3] * (1.0 - alpha),
            ]
        }
        BlendMode::Additive => [
            source[0] + destination[0],
            source[1] + destination[1],
            source[2] + destination[2],
            (source[3] + destination[3]).min(1.0),
        ],
    }
}

impl GpuBackend for SoftwareBackend {
    fn surface_size(&self) -> (u32, u32) {
        (self.default_framebuffer.width, self.default_framebuffer.height)
    }

    fn create_target(&mut self, width: u32, height: u32) -> RenderResult<TargetHandle> {
        if width == 0 || height == 0 {
            return Err(RenderError::ResourceCreation(format!("Zero-sized target {width}x{height}")));
        }
        let target = TargetHandle(self.allocate_handle());
        self.targets.insert(target, Image::new(width, height));
        self.commands.push(BackendCommand::CreateTarget { target, width, height });
        Ok(target)
    }

    fn delete_target(&mut self, target: TargetHandle) {
        if self.targets.remove(&target).is_some() {
            if self.bound_target == Some(target) {
                self.bound_target = None;
            }
            self.texture_units.retain(|_, texture| texture.0 != target.0);
            self.commands.push(BackendCommand::DeleteTarget(target));
        }
    }

    fn bind_target(&mut self, target: Option<TargetHandle>) -> RenderResult<()> {
        if let Some(handle) = target {
            if !self.targets.contains_key(&handle) {
                return Err(RenderError::InvalidHandle(format!("{handle:?}")));
            }
        }
        self.bound_target = target;
        self.commands.push(BackendCommand::BindTarget(target));
        Ok(())
    }

    fn color_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle> {
        if self.targets.contains_key(&target) {
            Ok(TextureHandle(target.0))
        } else {
            Err(RenderError::InvalidHandle(format!("{target:?}")))
        }
    }

    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|image| (image.width, image.height))
    }

    fn current_framebuffer(&self) -> FramebufferBinding {
        FramebufferBinding {
            target: self.bound_target,
            viewport: self.viewport,
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.commands.push(BackendCommand::SetViewport(viewport));
    }

    fn clear(&mut self, color: [f32; 4], mask: ClearMask) {
        let target = self.bound_target;
        if mask.contains(ClearMask::COLOR) {
            if let Ok(image) = self.bound_image_mut() {
                image.fill(color);
            }
        }
        self.commands.push(BackendCommand::Clear { target, color, mask });
    }

    fn compile_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle> {
        let failure = if self.failing_programs.contains(&source.name) {
            Some("injected failure".to_string())
        } else if source.vertex.trim().is_empty() || source.fragment.trim().is_empty() {
            Some("empty shader stage".to_string())
        } else {
            None
        };

        self.commands.push(BackendCommand::CompileProgram {
            name: source.name.clone(),
            success: failure.is_none(),
        });
        if let Some(reason) = failure {
            return Err(RenderError::ShaderCompilation {
                program: source.name.clone(),
                reason,
            });
        }

        let program = ProgramHandle(self.allocate_handle());
        self.programs.insert(
            program,
            SoftwareProgram {
                name: source.name.clone(),
                kind: ProgramKind::from_name(&source.name),
                parameters: HashMap::new(),
            },
        );
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn is_program_valid(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program)
    }

    fn use_program(&mut self, program: ProgramHandle) -> RenderResult<()> {
        let name = self
            .programs
            .get(&program)
            .map(|p| p.name.clone())
            .ok_or_else(|| RenderError::InvalidHandle(format!("{program:?}")))?;
        self.current_program = Some(program);
        self.commands.push(BackendCommand::UseProgram(name));
        Ok(())
    }

    fn set_parameter(&mut self, name: &str, value: ShaderValue) -> RenderResult<()> {
        let program = self
            .current_program
            .and_then(|handle| self.programs.get_mut(&handle))
            .ok_or_else(|| RenderError::Backend(format!("Parameter '{name}' set with no program in use")))?;
        program.parameters.insert(name.to_string(), value.clone());
        self.commands.push(BackendCommand::SetParameter {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> RenderResult<()> {
        self.texture_image(texture)?;
        self.texture_units.insert(unit, texture);
        self.commands.push(BackendCommand::BindTexture { unit, texture });
        Ok(())
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
        self.commands.push(BackendCommand::SetRenderState(state));
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn draw_fullscreen(&mut self) -> RenderResult<()> {
        let handle = self
            .current_program
            .ok_or_else(|| RenderError::Backend("Full-screen draw with no program in use".to_string()))?;
        let program = self
            .programs
            .get(&handle)
            .ok_or_else(|| RenderError::InvalidHandle(format!("{handle:?}")))?;

        let inputs = program
            .kind
            .samplers()
            .iter()
            .map(|(sampler, unit)| self.sampler_texture(program, sampler, *unit))
            .collect::<RenderResult<Vec<_>>>()?;

        if let Some(target) = self.bound_target {
            if inputs.iter().any(|texture| texture.0 == target.0) {
                return Err(RenderError::Backend(format!(
                    "'{}' samples {:?} while writing to it",
                    program.name, target
                )));
            }
        }

        let fragments = self.shade_fullscreen(program, &inputs)?;
        let name = program.name.clone();
        self.write_blended(fragments)?;
        self.commands.push(BackendCommand::DrawFullscreen {
            program: name,
            target: self.bound_target,
            inputs,
        });
        Ok(())
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()> {
        let SoftwareMesh { color, rect } = *self
            .meshes
            .get(&mesh)
            .ok_or_else(|| RenderError::InvalidHandle(format!("{mesh:?}")))?;
        // Flat programs tint the mesh colour with u_color
        let tint = match self
            .current_program
            .and_then(|handle| self.programs.get(&handle))
            .and_then(|program| program.parameters.get("u_color"))
        {
            Some(ShaderValue::Vec4(tint)) => [tint.x, tint.y, tint.z, tint.w],
            _ => [1.0; 4],
        };
        let color = [color[0] * tint[0], color[1] * tint[1], color[2] * tint[2], color[3] * tint[3]];

        let (width, height) = self.surface_of(self.bound_target);
        let (x0, y0, x1, y1) = self.clipped_viewport(width, height);
        let viewport = self.viewport;
        let to_pixel = |fraction: f32, origin: u32, extent: u32| origin + (fraction.clamp(0.0, 1.0) * extent as f32).round() as u32;
        let (rx0, rx1) = (to_pixel(rect[0], viewport.x, viewport.width), to_pixel(rect[2], viewport.x, viewport.width));
        let (ry0, ry1) = (to_pixel(rect[1], viewport.y, viewport.height), to_pixel(rect[3], viewport.y, viewport.height));

        let mut fragments = Vec::new();
        for y in ry0.max(y0)..ry1.min(y1) {
            for x in rx0.max(x0)..rx1.min(x1) {
                fragments.push((x, y, color));
            }
        }
        self.write_blended(fragments)?;
        self.commands.push(BackendCommand::DrawMesh {
            mesh,
            target: self.bound_target,
        });
        Ok(())
    }

    fn upload_uniform_block(&mut self, name: &str, bytes: &[u8]) -> RenderResult<()> {
        self.uniform_blocks.insert(name.to_string(), bytes.to_vec());
        self.commands.push(BackendCommand::UploadUniformBlock {
            name: name.to_string(),
            size: bytes.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::shaders;

    #[test]
    fn test_nearest_sampling_clamps_to_edge() {
        let mut image = Image::new(2, 2);
        image.set_pixel(0, 0, [1.0, 0.0, 0.0, 1.0]);
        image.set_pixel(1, 1, [0.0, 1.0, 0.0, 1.0]);

        assert_eq!(image.sample_nearest([0.1, 0.1]), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(image.sample_nearest([-3.0, -3.0]), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(image.sample_nearest([0.9, 0.9]), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(image.sample_nearest([5.0, 5.0]), [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_injected_compile_failure() {
        let mut backend = SoftwareBackend::new(4, 4);
        backend.fail_program(shaders::BLUR_PROGRAM);

        assert!(backend.compile_program(&shaders::extract_source()).is_ok());
        let error = backend.compile_program(&shaders::blur_source()).unwrap_err();
        assert!(matches!(error, RenderError::ShaderCompilation { ref program, .. } if program == "bloom_blur"));
    }

    #[test]
    fn test_mesh_fills_its_rect() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mesh = backend.register_mesh_in_rect([1.0, 1.0, 1.0, 1.0], [0.0, 0.0, 0.5, 0.5]);
        backend.draw_mesh(mesh).unwrap();

        let image = backend.default_framebuffer();
        assert_eq!(image.pixel(0, 0), [1.0; 4]);
        assert_eq!(image.pixel(1, 1), [1.0; 4]);
        assert_eq!(image.pixel(2, 2), [0.0; 4]);
    }

    #[test]
    fn test_alpha_blend_overlays_destination() {
        let mut backend = SoftwareBackend::new(1, 1);
        backend.default_framebuffer_mut().fill([0.0, 0.0, 1.0, 1.0]);
        let mesh = backend.register_mesh([1.0, 0.0, 0.0, 0.25]);

        backend.set_render_state(RenderState::OVERLAY);
        backend.draw_mesh(mesh).unwrap();

        let pixel = backend.default_framebuffer().pixel(0, 0);
        assert!((pixel[0] - 0.25).abs() < 1e-6);
        assert!((pixel[2] - 0.75).abs() < 1e-6);
        assert!((pixel[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sampling_bound_target_is_rejected() {
        let mut backend = SoftwareBackend::new(4, 4);
        let target = backend.create_target(4, 4).unwrap();
        let program = backend.compile_program(&shaders::blur_source()).unwrap();

        backend.bind_target(Some(target)).unwrap();
        backend.use_program(program).unwrap();
        backend.bind_texture(0, backend.color_texture(target).unwrap()).unwrap();

        assert!(matches!(backend.draw_fullscreen(), Err(RenderError::Backend(_))));
    }

    #[test]
    fn test_deleted_target_is_unbound() {
        let mut backend = SoftwareBackend::new(4, 4);
        let target = backend.create_target(2, 2).unwrap();
        backend.bind_target(Some(target)).unwrap();
        backend.delete_target(target);

        assert_eq!(backend.current_framebuffer().target, None);
        assert_eq!(backend.live_target_count(), 0);
        assert!(backend.bind_target(Some(target)).is_err());
    }
}
