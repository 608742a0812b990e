//! # 3D Camera System
//!
//! Camera with cached view, projection, view-projection matrices and a
//! cached culling [`Frustum`].
//!
//! ## Caching
//! View and projection have independent dirty flags. A setter only marks
//! what depends on it: moving the camera never rebuilds the projection, and
//! changing the field of view never rebuilds the view. The combined matrix
//! and the frustum are rebuilt lazily when either input changed.
//!
//! ## Coordinate System
//! Right-handed, Y-up view space with the camera looking down -Z. Clip-space
//! depth maps to [-1, 1].

use crate::core::config::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::scene::frustum::Frustum;

/// Projection kind and parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Width / height
        aspect: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },
    /// Orthographic projection centred on the view axis
    Orthographic {
        /// Visible width in world units
        width: f32,
        /// Visible height in world units
        height: f32,
        /// Near clip distance
        near: f32,
        /// Far clip distance
        far: f32,
    },
}

impl Projection {
    fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, aspect, near, far } => Mat4::perspective_gl(fov_y, aspect, near, far),
            Self::Orthographic { width, height, near, far } => Mat4::orthographic_gl(width, height, near, far),
        }
    }

    /// Near and far clip distances
    pub fn clip_range(&self) -> (f32, f32) {
        match *self {
            Self::Perspective { near, far, .. } | Self::Orthographic { near, far, .. } => (near, far),
        }
    }
}

/// 3D camera for perspective and orthographic projections
///
/// Preconditions such as `0 < near < far` and a positive aspect ratio are
/// the caller's responsibility; violating them yields meaningless matrices,
/// not errors.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    position: Vec3,
    target: Vec3,
    up: Vec3,

    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,

    view_dirty: bool,
    projection_dirty: bool,
    derived_dirty: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 16.0 / 9.0)
    }
}

impl Camera {
    /// Default camera at the origin looking down -Z
    pub fn new() -> Self {
        Self::default()
    }

    /// Perspective camera built from configuration defaults
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            projection: Projection::Perspective {
                fov_y: utils::deg_to_rad(config.fov_degrees),
                aspect,
                near: config.near,
                far: config.far,
            },
            position: Vec3::zeros(),
            target: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::y(),
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
            view_projection_matrix: Mat4::identity(),
            frustum: Frustum::from_view_projection(&Mat4::identity()),
            view_dirty: true,
            projection_dirty: true,
            derived_dirty: true,
        }
    }

    /// Switch to a perspective projection
    ///
    /// # Arguments
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Width / height of the viewport
    /// * `near` - Near clip distance (must be > 0)
    /// * `far` - Far clip distance (must be > near)
    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov_y: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        };
        self.mark_projection_dirty();
        log::trace!("Camera perspective: fov {fov_degrees}°, aspect {aspect:.3}, clip [{near}, {far}]");
    }

    /// Switch to an orthographic projection of `width x height` world units
    pub fn set_orthographic(&mut self, width: f32, height: f32, near: f32, far: f32) {
        self.projection = Projection::Orthographic { width, height, near, far };
        self.mark_projection_dirty();
        log::trace!("Camera orthographic: {width}x{height}, clip [{near}, {far}]");
    }

    /// Update the aspect ratio after a viewport change.
    ///
    /// Orthographic cameras keep their height and widen or narrow.
    pub fn set_aspect_ratio(&mut self, new_aspect: f32) {
        match &mut self.projection {
            Projection::Perspective { aspect, .. } => {
                if (*aspect - new_aspect).abs() <= f32::EPSILON {
                    return;
                }
                *aspect = new_aspect;
            }
            Projection::Orthographic { width, height, .. } => {
                let new_width = *height * new_aspect;
                if (*width - new_width).abs() <= f32::EPSILON {
                    return;
                }
                *width = new_width;
            }
        }
        self.mark_projection_dirty();
        log::debug!("Camera aspect ratio changed to {new_aspect:.3}");
    }

    /// Place the camera at `eye` looking at `target`
    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.position = eye;
        self.target = target;
        self.mark_view_dirty();
        log::trace!("Camera look_at: eye {:?}, target {:?}", eye, target);
    }

    /// Move the camera, keeping its target
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_view_dirty();
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Change the look-at point
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.mark_view_dirty();
        log::trace!("Camera target updated to: {:?}", target);
    }

    /// Change the up hint (re-orthogonalized against the view direction)
    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
        self.mark_view_dirty();
    }

    /// Eye position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Look-at point
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Up hint
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
    }

    /// Projection parameters
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Near clip distance
    pub fn near(&self) -> f32 {
        self.projection.clip_range().0
    }

    /// Far clip distance
    pub fn far(&self) -> f32 {
        self.projection.clip_range().1
    }

    /// Vertical field of view in radians, `None` for orthographic cameras
    pub fn vertical_fov(&self) -> Option<f32> {
        match self.projection {
            Projection::Perspective { fov_y, .. } => Some(fov_y),
            Projection::Orthographic { .. } => None,
        }
    }

    /// World-to-view matrix
    pub fn view_matrix(&mut self) -> Mat4 {
        if self.view_dirty {
            self.view_matrix = Mat4::look_at(&self.position, &self.target, &self.up);
            self.view_dirty = false;
        }
        self.view_matrix
    }

    /// View-to-clip matrix
    pub fn projection_matrix(&mut self) -> Mat4 {
        if self.projection_dirty {
            self.projection_matrix = self.projection.matrix();
            self.projection_dirty = false;
        }
        self.projection_matrix
    }

    /// `projection * view`
    pub fn view_projection_matrix(&mut self) -> Mat4 {
        self.refresh_derived();
        self.view_projection_matrix
    }

    /// Culling frustum, re-extracted only when view or projection changed
    pub fn frustum(&mut self) -> &Frustum {
        self.refresh_derived();
        &self.frustum
    }

    /// Whether the view matrix will be rebuilt on next access
    pub fn is_view_dirty(&self) -> bool {
        self.view_dirty
    }

    /// Whether the projection matrix will be rebuilt on next access
    pub fn is_projection_dirty(&self) -> bool {
        self.projection_dirty
    }

    /// Whether the frustum will be re-extracted on next access
    pub fn is_frustum_dirty(&self) -> bool {
        self.derived_dirty
    }

    fn refresh_derived(&mut self) {
        if self.derived_dirty {
            let view = self.view_matrix();
            let projection = self.projection_matrix();
            self.view_projection_matrix = projection * view;
            self.frustum = Frustum::from_view_projection(&self.view_projection_matrix);
            self.derived_dirty = false;
        }
    }

    fn mark_view_dirty(&mut self) {
        self.view_dirty = true;
        self.derived_dirty = true;
    }

    fn mark_projection_dirty(&mut self) {
        self.projection_dirty = true;
        self.derived_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use crate::scene::bounds::AABB;
    use crate::scene::frustum::FrustumTest;
    use approx::assert_relative_eq;

    #[test]
    fn test_setters_dirty_only_dependents() {
        let mut camera = Camera::new();
        camera.view_projection_matrix();
        assert!(!camera.is_view_dirty() && !camera.is_projection_dirty() && !camera.is_frustum_dirty());

        camera.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(camera.is_view_dirty());
        assert!(!camera.is_projection_dirty());
        assert!(camera.is_frustum_dirty());

        camera.frustum();
        camera.set_perspective(60.0, 1.0, 0.1, 10.0);
        assert!(!camera.is_view_dirty());
        assert!(camera.is_projection_dirty());
        assert!(camera.is_frustum_dirty());
    }

    #[test]
    fn test_view_projection_is_product() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::new(3.0, 4.0, 5.0), Vec3::zeros());
        let expected = camera.projection_matrix() * camera.view_matrix();
        assert_relative_eq!(camera.view_projection_matrix(), expected);
    }

    #[test]
    fn test_perspective_uses_vertical_fov() {
        let mut camera = Camera::new();
        camera.set_perspective(90.0, 2.0, 0.1, 100.0);
        let projection = camera.projection_matrix();
        // tan(45°) = 1, so the y scale is 1 and the x scale is 1 / aspect
        assert_relative_eq!(projection[(1, 1)], 1.0, epsilon = 1e-5);
        assert_relative_eq!(projection[(0, 0)], 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_target_projects_to_screen_centre() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::new(10.0, 5.0, -3.0), Vec3::new(-2.0, 1.0, 4.0));
        let clip = camera.view_projection_matrix() * Vec4::new(-2.0, 1.0, 4.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-4);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_frustum_follows_camera_movement() {
        let mut camera = Camera::new();
        camera.set_perspective(90.0, 1.0, 0.1, 100.0);
        let target_box = AABB::from_center_half_extents(Vec3::new(0.0, 0.0, -5.0), Vec3::repeat(1.0));
        assert_eq!(camera.frustum().test_aabb(&target_box), FrustumTest::Inside);

        // Turn around: the box is now behind the camera
        camera.set_target(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(camera.frustum().test_aabb(&target_box), FrustumTest::Outside);
    }

    #[test]
    fn test_orthographic_aspect_keeps_height() {
        let mut camera = Camera::new();
        camera.set_orthographic(10.0, 10.0, 0.1, 50.0);
        camera.set_aspect_ratio(2.0);
        assert_eq!(
            *camera.projection(),
            Projection::Orthographic {
                width: 20.0,
                height: 10.0,
                near: 0.1,
                far: 50.0
            }
        );
        assert_eq!(camera.vertical_fov(), None);
    }
}
