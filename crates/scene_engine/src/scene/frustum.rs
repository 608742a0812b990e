//! View-frustum planes and culling tests
//!
//! Planes are extracted from a combined `projection * view` matrix with the
//! Gribb-Hartmann method. Every plane is normalized and its normal points
//! into the frustum, so `distance_to_point` is a true signed distance with
//! positive values on the visible side.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::scene::bounds::{Sphere, AABB};

/// Plane `ax + by + cz + d = 0` stored as unit normal and offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized, pointing into the frustum)
    pub normal: Vec3,
    /// Offset `d` of the plane equation
    pub distance: f32,
}

impl Plane {
    /// Create a plane, normalizing normal and offset together
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let length = normal.norm();
        if length > f32::EPSILON {
            Self {
                normal: normal / length,
                distance: distance / length,
            }
        } else {
            Self { normal, distance }
        }
    }

    /// Plane through a point with the given normal
    pub fn from_point_normal(point: &Vec3, normal: &Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    /// Plane from raw coefficients `(a, b, c, d)`
    fn from_coefficients(coefficients: &Vec4) -> Self {
        Self::new(Vec3::new(coefficients.x, coefficients.y, coefficients.z), coefficients.w)
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Box corner furthest along the normal
    fn positive_vertex(&self, aabb: &AABB) -> Vec3 {
        Vec3::new(
            if self.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
            if self.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
            if self.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
        )
    }

    /// Box corner furthest against the normal
    fn negative_vertex(&self, aabb: &AABB) -> Vec3 {
        Vec3::new(
            if self.normal.x >= 0.0 { aabb.min.x } else { aabb.max.x },
            if self.normal.y >= 0.0 { aabb.min.y } else { aabb.max.y },
            if self.normal.z >= 0.0 { aabb.min.z } else { aabb.max.z },
        )
    }
}

/// Identifies one of the six frustum planes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumSide {
    /// Near clipping plane
    Near = 0,
    /// Far clipping plane
    Far = 1,
    /// Left side
    Left = 2,
    /// Right side
    Right = 3,
    /// Top side
    Top = 4,
    /// Bottom side
    Bottom = 5,
}

/// Result of a precise containment test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumTest {
    /// Completely outside at least one plane
    Outside,
    /// Straddles at least one plane
    Intersect,
    /// Completely inside all planes
    Inside,
}

impl FrustumTest {
    /// True unless the volume is outside
    pub fn is_visible(self) -> bool {
        self != Self::Outside
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes ordered as [`FrustumSide`]: near, far, left, right, top, bottom
    planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes ordered as [`FrustumSide`]
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Uses the Gribb-Hartmann method on `M = projection * view` with
    /// column vectors, so each plane is a sum or difference of matrix rows:
    /// left = r3 + r0, right = r3 - r0, bottom = r3 + r1, top = r3 - r1,
    /// near = r3 + r2, far = r3 - r2.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let row = |index: usize| -> Vec4 { view_projection.row(index).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_coefficients(&(r3 + r2)),
                Plane::from_coefficients(&(r3 - r2)),
                Plane::from_coefficients(&(r3 + r0)),
                Plane::from_coefficients(&(r3 - r0)),
                Plane::from_coefficients(&(r3 - r1)),
                Plane::from_coefficients(&(r3 + r1)),
            ],
        }
    }

    /// All six planes
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// One plane by side
    pub fn plane(&self, side: FrustumSide) -> &Plane {
        &self.planes[side as usize]
    }

    /// True iff the point is on the inner side of every plane
    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Conservative sphere test; partially inside counts as intersecting
    pub fn intersects_sphere(&self, center: &Vec3, radius: f32) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// Precise three-state sphere test
    pub fn test_sphere(&self, sphere: &Sphere) -> FrustumTest {
        let mut result = FrustumTest::Inside;
        for plane in &self.planes {
            let distance = plane.distance_to_point(&sphere.center);
            if distance < -sphere.radius {
                return FrustumTest::Outside;
            }
            if distance < sphere.radius {
                result = FrustumTest::Intersect;
            }
        }
        result
    }

    /// Fast conservative box test using the positive vertex of each plane.
    ///
    /// Never rejects a box that is actually visible; may accept a box that
    /// is outside near a frustum corner.
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        for plane in &self.planes {
            // If the corner most aligned with the normal is outside, the whole box is
            if plane.distance_to_point(&plane.positive_vertex(aabb)) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Precise three-state box test (positive and negative vertex per plane)
    pub fn test_aabb(&self, aabb: &AABB) -> FrustumTest {
        let mut result = FrustumTest::Inside;
        for plane in &self.planes {
            if plane.distance_to_point(&plane.positive_vertex(aabb)) < 0.0 {
                return FrustumTest::Outside;
            }
            if plane.distance_to_point(&plane.negative_vertex(aabb)) < 0.0 {
                result = FrustumTest::Intersect;
            }
        }
        result
    }
}
