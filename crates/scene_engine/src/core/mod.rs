//! # Core Engine Module
//!
//! Shared configuration for the subsystems of the scene core.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration document for all engine subsystems

pub mod config;

// Re-export commonly used config types
pub use config::{CameraConfig, Config, ConfigError, CullingConfig, EngineConfig};
