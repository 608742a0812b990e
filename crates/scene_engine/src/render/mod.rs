//! # Rendering
//!
//! Backend-agnostic rendering layer. Everything above this module talks to
//! the GPU through the [`GpuBackend`] trait; [`SoftwareBackend`] implements
//! it on the CPU for headless runs and tests.
//!
//! ## Layout
//!
//! - **backend**: handles, render state, shader values and the backend trait
//! - **camera**: view and projection with lazily rebuilt matrices and frustum
//! - **material**: shader programs with render modes and parameters
//! - **context**: per-frame uniforms and draw-list dispatch
//! - **software**: CPU rasterizer used by tests and the headless demo

pub mod backend;
pub mod camera;
pub mod context;
pub mod material;
pub mod software;

pub use backend::{
    BlendMode, ClearMask, FramebufferBinding, GpuBackend, MeshHandle, ProgramHandle, RenderError, RenderResult,
    RenderState, ShaderSource, ShaderValue, TargetHandle, TextureHandle, Viewport,
};
pub use camera::{Camera, Projection};
pub use context::{CameraUniforms, DrawStats, GlobalUniforms, RenderBatch, RenderContext, RenderQueue};
pub use material::{Material, MaterialId, MaterialLibrary, RenderMode};
pub use software::{BackendCommand, Image, SoftwareBackend};
