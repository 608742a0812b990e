//! # Scene Engine
//!
//! The scene and rendering core of a real-time 3D engine, independent of
//! any windowing layer or graphics API.
//!
//! ## Features
//!
//! - **Scene Graph**: Hierarchical transforms with cached world matrices
//! - **Visibility**: Frustum culling and distance or coverage based LOD
//! - **ECS Architecture**: Entities, type-keyed components and prioritized systems
//! - **Bloom**: Capture, bright pass, ping-pong blur and composite
//! - **Backend Agnostic**: Rendering goes through the [`render::GpuBackend`] trait;
//!   a CPU [`render::SoftwareBackend`] ships for headless runs and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let mut backend = SoftwareBackend::new(320, 180);
//!     let mut engine = Engine::new(EngineConfig::default())?;
//!     engine.initialize(&mut backend)?;
//!
//!     let mesh = backend.register_mesh([1.0, 0.5, 0.2, 1.0]);
//!     let node = engine.scene_mut().create_node("crate");
//!     engine.scene_mut().set_renderable(
//!         node,
//!         Box::new(MeshRenderer::new(mesh, None, AABB::from_center_half_extents(Vec3::zeros(), Vec3::repeat(0.5)))),
//!     )?;
//!
//!     engine.camera_mut().look_at(Vec3::new(0.0, 1.0, 6.0), Vec3::zeros());
//!     let stats = engine.run_frame(&mut backend, 1.0 / 60.0, 320, 180)?;
//!     println!("{} objects drawn", stats.draws.draw_calls);
//!
//!     engine.shutdown(&mut backend);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

// Core engine modules
pub mod config;
pub mod core;
pub mod foundation;

// Scene and rendering
pub mod postprocess;
pub mod render;
pub mod scene;

pub mod ecs;

mod engine;

pub use engine::{Engine, EngineError, EngineResult, FrameStats};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{CameraConfig, Config, CullingConfig, EngineConfig},
        ecs::{Component, EntityId, GameSystem, SystemResult, TransformComponent, TransformSystem, World},
        foundation::{
            math::{Mat4, Quat, Vec3},
            time::{FrameClock, Stopwatch},
        },
        postprocess::{BloomSettings, PostProcessor},
        render::{Camera, GpuBackend, Material, MaterialId, RenderMode, SoftwareBackend},
        scene::{LodGroup, MeshRenderer, NodeId, Renderable, Scene, Transform, AABB},
        Engine, EngineError, EngineResult, FrameStats,
    };
}
