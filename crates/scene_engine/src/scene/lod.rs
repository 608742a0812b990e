//! Level of detail selection
//!
//! A [`LodGroup`] holds an ordered list of mesh levels, each valid over a
//! squared-distance range `[min², max²)`. Selection works on squared
//! distances so the traversal never needs a square root.
//!
//! Levels can be authored in plain distances ([`LodGroup::add_level`]) or
//! directly in squared units ([`LodGroup::add_level_sq`]).
//!
//! Levels are kept sorted by ascending minimum distance after every
//! insertion; selection relies on that order.

use serde::{Deserialize, Serialize};

use crate::render::backend::MeshHandle;

/// One detail level of a [`LodGroup`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodLevel {
    /// Mesh drawn while this level is selected
    pub mesh: MeshHandle,
    /// Squared lower bound of the level's range (inclusive)
    pub min_distance_sq: f32,
    /// Squared upper bound of the level's range (exclusive)
    pub max_distance_sq: f32,
}

impl LodLevel {
    /// Whether a squared distance falls inside `[min², max²)`
    pub fn contains(&self, distance_sq: f32) -> bool {
        distance_sq >= self.min_distance_sq && distance_sq < self.max_distance_sq
    }
}

/// How the selection distance is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LodMode {
    /// Raw camera distance to the bounds centre
    #[default]
    Distance,
    /// Projected screen coverage, converted to the distance at which a
    /// unit-radius object would cover the same fraction of the screen.
    /// Level ranges are authored for a unit-radius object.
    ScreenCoverage,
}

/// Distance-based level of detail group
#[derive(Debug, Clone, PartialEq)]
pub struct LodGroup {
    levels: Vec<LodLevel>,
    enabled: bool,
    bias: f32,
    forced_level: Option<usize>,
    cull_distance_sq: f32,
    hysteresis: f32,
    mode: LodMode,
    current: Option<usize>,
}

impl Default for LodGroup {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            enabled: true,
            bias: 0.0,
            forced_level: None,
            cull_distance_sq: f32::INFINITY,
            hysteresis: 0.0,
            mode: LodMode::Distance,
            current: None,
        }
    }
}

impl LodGroup {
    /// Create an empty group with no cull distance
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a level covering `[min_distance, max_distance)`.
    ///
    /// Distances are plain (not squared); the group stores their squares.
    pub fn add_level(&mut self, mesh: MeshHandle, min_distance: f32, max_distance: f32) -> &mut Self {
        self.add_level_sq(mesh, min_distance * min_distance, max_distance * max_distance)
    }

    /// Add a level covering the squared range `[min_distance_sq, max_distance_sq)`
    pub fn add_level_sq(&mut self, mesh: MeshHandle, min_distance_sq: f32, max_distance_sq: f32) -> &mut Self {
        let level = LodLevel {
            mesh,
            min_distance_sq,
            max_distance_sq,
        };
        let index = self
            .levels
            .partition_point(|existing| existing.min_distance_sq <= level.min_distance_sq);
        self.levels.insert(index, level);
        self.current = None;
        self
    }

    /// Builder form of [`Self::add_level`]
    pub fn with_level(mut self, mesh: MeshHandle, min_distance: f32, max_distance: f32) -> Self {
        self.add_level(mesh, min_distance, max_distance);
        self
    }

    /// Builder form of [`Self::add_level_sq`]
    pub fn with_level_sq(mut self, mesh: MeshHandle, min_distance_sq: f32, max_distance_sq: f32) -> Self {
        self.add_level_sq(mesh, min_distance_sq, max_distance_sq);
        self
    }

    /// Builder form of [`Self::set_cull_distance`]
    pub fn with_cull_distance(mut self, distance: f32) -> Self {
        self.set_cull_distance(distance);
        self
    }

    /// Builder form of [`Self::set_cull_distance_sq`]
    pub fn with_cull_distance_sq(mut self, distance_sq: f32) -> Self {
        self.set_cull_distance_sq(distance_sq);
        self
    }

    /// Levels in ascending minimum-distance order
    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    /// Level by index
    pub fn level(&self, index: usize) -> Option<&LodLevel> {
        self.levels.get(index)
    }

    /// Enable or disable selection; a disabled group always picks level 0
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether selection is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Detail bias; positive values select higher detail at the same distance
    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    /// Current bias
    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Force a level regardless of distance. Out-of-range indices are ignored.
    pub fn set_forced_level(&mut self, level: Option<usize>) {
        self.forced_level = level;
    }

    /// Forced level, if any
    pub fn forced_level(&self) -> Option<usize> {
        self.forced_level
    }

    /// Hard cull distance (plain, not squared); beyond it nothing is drawn
    pub fn set_cull_distance(&mut self, distance: f32) {
        self.cull_distance_sq = distance * distance;
    }

    /// Hard cull distance in squared units
    pub fn set_cull_distance_sq(&mut self, distance_sq: f32) {
        self.cull_distance_sq = distance_sq;
    }

    /// Squared cull distance
    pub fn cull_distance_sq(&self) -> f32 {
        self.cull_distance_sq
    }

    /// Fraction by which the distance must leave the current level's range
    /// before [`Self::update`] switches away from it
    pub fn set_hysteresis(&mut self, hysteresis: f32) {
        self.hysteresis = hysteresis.max(0.0);
    }

    /// Current hysteresis fraction
    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    /// Change how the selection distance is derived
    pub fn set_mode(&mut self, mode: LodMode) {
        self.mode = mode;
    }

    /// Selection mode
    pub fn mode(&self) -> LodMode {
        self.mode
    }

    /// Level chosen by the last [`Self::update`]
    pub fn current_level(&self) -> Option<usize> {
        self.current
    }

    /// Mesh of a level index
    pub fn mesh_at(&self, index: usize) -> Option<MeshHandle> {
        self.levels.get(index).map(|level| level.mesh)
    }

    /// Select a level for a squared camera distance.
    ///
    /// Returns `None` when the object should not be drawn.
    pub fn select_lod(&self, distance_sq: f32) -> Option<usize> {
        if !self.enabled || self.levels.is_empty() {
            return if self.levels.is_empty() { None } else { Some(0) };
        }
        if distance_sq >= self.cull_distance_sq {
            return None;
        }
        if let Some(forced) = self.forced_level.filter(|&index| index < self.levels.len()) {
            return Some(forced);
        }

        let adjusted = self.biased_distance_sq(distance_sq);
        if let Some(index) = self.levels.iter().position(|level| level.contains(adjusted)) {
            return Some(index);
        }

        // Fall back to the coarsest level while still inside its range end
        let last = self.levels.len() - 1;
        (adjusted < self.levels[last].max_distance_sq).then_some(last)
    }

    /// Stateful selection with hysteresis, used by scene traversal.
    ///
    /// Keeps the current level while the adjusted distance stays within the
    /// current level's range widened by the hysteresis fraction. The cull
    /// distance and forced level always apply immediately.
    pub fn update(&mut self, distance_sq: f32) -> Option<usize> {
        let target = self.select_lod(distance_sq);

        let keep_current = match (self.current, target) {
            (Some(current), Some(target))
                if current != target
                    && self.hysteresis > 0.0
                    && self.enabled
                    && self.forced_level.is_none() =>
            {
                self.levels.get(current).is_some_and(|level| {
                    let adjusted = self.biased_distance_sq(distance_sq);
                    let lower = (1.0 - self.hysteresis).max(0.0);
                    let upper = 1.0 + self.hysteresis;
                    adjusted >= level.min_distance_sq * lower * lower
                        && adjusted < level.max_distance_sq * upper * upper
                })
            }
            _ => false,
        };

        if !keep_current {
            if self.current != target {
                log::trace!("LOD switch {:?} -> {:?}", self.current, target);
            }
            self.current = target;
        }
        self.current
    }

    /// Squared distance fed to selection for an object of the given bounding
    /// radius, taking the group's [`LodMode`] into account
    pub fn selection_distance_sq(&self, distance_sq: f32, bounds_radius: f32, fov_y: f32) -> f32 {
        match self.mode {
            LodMode::Distance => distance_sq,
            LodMode::ScreenCoverage => {
                let coverage = Self::screen_coverage(distance_sq, bounds_radius, fov_y);
                Self::coverage_to_distance_sq(coverage, fov_y)
            }
        }
    }

    /// Fraction of the vertical screen extent covered by a sphere of
    /// `radius` at squared distance `distance_sq`
    pub fn screen_coverage(distance_sq: f32, radius: f32, fov_y: f32) -> f32 {
        let distance = distance_sq.sqrt();
        let half_height = distance * (fov_y * 0.5).tan();
        if half_height <= f32::EPSILON {
            return f32::INFINITY;
        }
        radius / half_height
    }

    /// Squared distance at which a unit-radius sphere covers `coverage`
    pub fn coverage_to_distance_sq(coverage: f32, fov_y: f32) -> f32 {
        let tan_half = (fov_y * 0.5).tan();
        if coverage <= 0.0 || tan_half <= f32::EPSILON {
            return f32::INFINITY;
        }
        let distance = 1.0 / (coverage * tan_half);
        distance * distance
    }

    fn biased_distance_sq(&self, distance_sq: f32) -> f32 {
        let factor = 1.0 - self.bias * 0.1;
        if factor > 0.0 {
            distance_sq * factor * factor
        } else {
            distance_sq
        }
    }
}
