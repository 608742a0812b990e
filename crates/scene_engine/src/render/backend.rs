//! Backend abstraction for GPU resources
//!
//! The scene core never talks to a graphics API directly. Everything it
//! needs from the GPU goes through [`GpuBackend`]: render targets,
//! shader programs with named parameters, texture binding, fixed-function
//! state and two kinds of draw call (full-screen pass and mesh).
//!
//! Resources are referred to by opaque handle newtypes. Whoever creates a
//! handle owns it and must delete it; there is no reference counting.

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};

/// Rendering system errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A shader program failed to compile or link
    #[error("Shader program '{program}' failed to compile: {reason}")]
    ShaderCompilation {
        /// Program name
        program: String,
        /// Backend diagnostic
        reason: String,
    },

    /// A GPU resource could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// A handle does not refer to a live resource
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for backend operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Handle to an off-screen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(pub u64);

/// Handle to a texture that can be sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

/// Handle to a mesh resource stored in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Pixel rectangle of the bound target that draws cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge
    pub x: u32,
    /// Bottom edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Viewport covering a whole `width x height` surface
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Bound framebuffer and viewport, saved and restored around off-screen work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferBinding {
    /// Bound target; `None` is the default framebuffer
    pub target: Option<TargetHandle>,
    /// Active viewport
    pub viewport: Viewport,
}

bitflags! {
    /// Buffers affected by [`GpuBackend::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Colour attachment
        const COLOR = 0b01;
        /// Depth attachment
        const DEPTH = 0b10;
    }
}

/// Blend equation applied to fragment output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Overwrite the destination
    #[default]
    Disabled,
    /// `src * src_alpha + dst * (1 - src_alpha)`
    Alpha,
    /// `src + dst`
    Additive,
}

/// Fixed-function state relevant to the scene core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    /// Depth testing enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Blend equation
    pub blend: BlendMode,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

impl RenderState {
    /// Depth-tested opaque geometry
    pub const OPAQUE: Self = Self {
        depth_test: true,
        depth_write: true,
        blend: BlendMode::Disabled,
    };

    /// Full-screen overlay: no depth, alpha blended
    pub const OVERLAY: Self = Self {
        depth_test: false,
        depth_write: false,
        blend: BlendMode::Alpha,
    };

    /// Full-screen pass that overwrites its target
    pub const FULLSCREEN: Self = Self {
        depth_test: false,
        depth_write: false,
        blend: BlendMode::Disabled,
    };
}

/// Typed value of a named shader parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderValue {
    /// `float`
    Float(f32),
    /// `int`
    Int(i32),
    /// `bool`
    Bool(bool),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat4`
    Mat4(Mat4),
    /// `float[]`
    FloatArray(Vec<f32>),
    /// `sampler2D` bound to a texture unit
    Sampler(u32),
}

impl ShaderValue {
    /// The value as a float, if it is one
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a bool, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

/// Source of a shader program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Program name used in diagnostics
    pub name: String,
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
}

impl ShaderSource {
    /// Create a program source
    pub fn new(name: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// GPU resource backend
///
/// Implementations execute commands immediately and in order. Parameters
/// set with [`GpuBackend::set_parameter`] apply to the program selected by
/// the last [`GpuBackend::use_program`] and persist on that program.
pub trait GpuBackend {
    /// Size of the default framebuffer
    fn surface_size(&self) -> (u32, u32);

    /// Create an off-screen colour target
    fn create_target(&mut self, width: u32, height: u32) -> RenderResult<TargetHandle>;

    /// Release a target. Deleting an unknown handle is a no-op.
    fn delete_target(&mut self, target: TargetHandle);

    /// Bind a target for drawing; `None` binds the default framebuffer
    fn bind_target(&mut self, target: Option<TargetHandle>) -> RenderResult<()>;

    /// Sampleable colour attachment of a target
    fn color_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle>;

    /// Size of a live target
    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)>;

    /// Currently bound framebuffer and viewport
    fn current_framebuffer(&self) -> FramebufferBinding;

    /// Set the viewport of the bound framebuffer
    fn set_viewport(&mut self, viewport: Viewport);

    /// Clear the viewport of the bound framebuffer
    fn clear(&mut self, color: [f32; 4], mask: ClearMask);

    /// Compile and link a program
    fn compile_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle>;

    /// Release a program
    fn delete_program(&mut self, program: ProgramHandle);

    /// Whether a program handle refers to a linked program
    fn is_program_valid(&self, program: ProgramHandle) -> bool;

    /// Select the program used by subsequent draws
    fn use_program(&mut self, program: ProgramHandle) -> RenderResult<()>;

    /// Set a named parameter on the current program
    fn set_parameter(&mut self, name: &str, value: ShaderValue) -> RenderResult<()>;

    /// Bind a texture to a sampler unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> RenderResult<()>;

    /// Apply depth and blend state
    fn set_render_state(&mut self, state: RenderState);

    /// Current depth and blend state
    fn render_state(&self) -> RenderState;

    /// Draw a full-screen triangle with the current program
    fn draw_fullscreen(&mut self) -> RenderResult<()>;

    /// Draw a mesh with the current program
    fn draw_mesh(&mut self, mesh: MeshHandle) -> RenderResult<()>;

    /// Upload a raw uniform block shared by all programs
    fn upload_uniform_block(&mut self, name: &str, bytes: &[u8]) -> RenderResult<()>;
}
