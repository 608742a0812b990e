//! # Engine Configuration
//!
//! Consolidates the settings blocks of the scene core into a single
//! serializable document. Every block has sensible defaults and can be
//! loaded from TOML or RON through the [`Config`] trait.
//!
//! ## Configuration Categories
//!
//! - **Camera Config**: default projection parameters
//! - **Culling Config**: frustum culling and level-of-detail switches
//! - **Bloom Settings**: post-processing knobs, adjustable between frames

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};
pub use crate::postprocess::BloomSettings;

/// # Camera Configuration
///
/// Default perspective parameters applied to the engine camera at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Distance to the near clipping plane
    pub near: f32,
    /// Distance to the far clipping plane
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 70.0,
            near: 0.05,
            far: 512.0,
        }
    }
}

/// # Culling Configuration
///
/// Switches for the visibility traversal. Disabling frustum culling makes
/// every active node visible; disabling LOD draws every renderable with its
/// base mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Test node bounds against the camera frustum
    pub frustum_culling: bool,
    /// Run level-of-detail selection during traversal
    pub lod: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            frustum_culling: true,
            lod: true,
        }
    }
}

/// # Engine Configuration
///
/// Root configuration document for the scene core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level filter used by [`EngineConfig::log_level_filter`]
    pub log_level: String,
    /// Camera defaults
    pub camera: CameraConfig,
    /// Visibility traversal switches
    pub culling: CullingConfig,
    /// Bloom post-processing knobs
    pub bloom: BloomSettings,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            camera: CameraConfig::default(),
            culling: CullingConfig::default(),
            bloom: BloomSettings::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the bloom settings
    pub fn with_bloom(mut self, bloom: BloomSettings) -> Self {
        self.bloom = bloom;
        self
    }

    /// Replace the culling switches
    pub fn with_culling(mut self, culling: CullingConfig) -> Self {
        self.culling = culling;
        self
    }

    /// Parse the configured log level, falling back to `Info`
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level '{}', falling back to info", self.log_level);
            log::LevelFilter::Info
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.near <= 0.0 || self.camera.far <= self.camera.near {
            return Err(format!(
                "Camera clip range must satisfy 0 < near < far (near = {}, far = {})",
                self.camera.near, self.camera.far
            ));
        }
        if !(0.0..180.0).contains(&self.camera.fov_degrees) || self.camera.fov_degrees == 0.0 {
            return Err(format!("Camera field of view out of range: {}", self.camera.fov_degrees));
        }
        self.bloom.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}
