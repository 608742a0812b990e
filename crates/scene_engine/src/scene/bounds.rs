//! Bounding volumes for culling and spatial queries

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Axis-Aligned Bounding Box
///
/// The empty box is `min = +inf, max = -inf`. Expanding it by any sequence
/// of points gives the same result regardless of order or repetition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create the empty (invalid) box
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Create an AABB centered at a point with given half extents
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest box containing every point
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand_to_include(point);
        }
        aabb
    }

    /// Reset to the empty box
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// True when min <= max on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the half extents of the AABB
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full size along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grow the box to contain a point
    pub fn expand_to_include(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Grow the box to contain another box. Invalid boxes are ignored.
    pub fn expand_to_include_aabb(&mut self, other: &AABB) {
        if other.is_valid() {
            self.min = self.min.inf(&other.min);
            self.max = self.max.sup(&other.max);
        }
    }

    /// Union of two boxes
    pub fn union(&self, other: &AABB) -> AABB {
        let mut result = *self;
        result.expand_to_include_aabb(other);
        result
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Transform the box and re-fit an axis-aligned box around it.
    ///
    /// All eight corners are transformed, so rotated boxes stay fully
    /// enclosed. An invalid box stays invalid.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        if !self.is_valid() {
            return Self::empty();
        }
        let mut result = Self::empty();
        for corner in &self.corners() {
            result.expand_to_include(&matrix.transform_point3(corner));
        }
        result
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::empty()
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl Sphere {
    /// Create a new sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere enclosing a box
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.half_extents().norm(),
        }
    }

    /// Check if a point is inside
    pub fn contains_point(&self, point: &Vec3) -> bool {
        (point - self.center).norm_squared() <= self.radius * self.radius
    }

    /// Transform the sphere; non-uniform scale is covered by the largest axis scale
    pub fn transformed(&self, matrix: &Mat4) -> Sphere {
        let center = matrix.transform_point3(&self.center);
        let max_scale = (0..3)
            .map(|axis| matrix.fixed_view::<3, 1>(0, axis).norm())
            .fold(0.0_f32, f32::max);
        Self {
            center,
            radius: self.radius * max_scale,
        }
    }
}
