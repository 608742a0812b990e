//! # Post-processing
//!
//! Full-screen effects applied after the scene is drawn. Bloom is the only
//! effect: the host's frame is captured into an off-screen target, bright
//! regions are extracted and blurred, and the result is composited back.
//!
//! [`kernels`] holds CPU versions of the shading functions in [`shaders`];
//! the software backend runs them when it executes the bloom programs.

pub mod bloom;
pub mod kernels;
pub mod shaders;

pub use bloom::{BloomSettings, CaptureState, PostProcessor, MAX_ITERATIONS};
pub use kernels::{CompositeParams, BLUR_TAPS};
