//! Transform with cached local and world matrices
//!
//! A `Transform` stores position, rotation and scale plus two cached
//! matrices gated by dirty flags. It does not own its parent link: the
//! hierarchy lives in the arena that owns the transforms (the scene graph
//! or the ECS world), which passes the parent's world matrix in when the
//! world matrix has to be resolved.
//!
//! Invariants:
//! - `local_dirty` implies `world_dirty`.
//! - A new transform starts with its world matrix dirty; it has never
//!   been composed onto a parent.
//! - After [`Transform::resolve_world`], the world matrix equals
//!   `parent_world * local` for a child and `local` for a root.

use crate::foundation::math::{Mat4, Mat4Ext, Quat, Vec3};

/// Position, rotation and scale with lazily rebuilt matrices
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    local_matrix: Mat4,
    world_matrix: Mat4,
    local_dirty: bool,
    world_dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            local_dirty: false,
            world_dirty: true,
        }
    }
}

impl Transform {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        let mut transform = Self::default();
        transform.set_position(position);
        transform
    }

    /// Create from position, rotation and scale
    pub fn from_parts(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let mut transform = Self::default();
        transform.position = position;
        transform.rotation = rotation;
        transform.scale = scale;
        transform.mark_local_dirty();
        transform
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set local position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_local_dirty();
    }

    /// Set local rotation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.mark_local_dirty();
    }

    /// Set local (possibly non-uniform) scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.mark_local_dirty();
    }

    /// Move by a local-space offset
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.mark_local_dirty();
    }

    /// Apply an extra rotation after the current one
    pub fn rotate(&mut self, delta: Quat) {
        self.rotation = delta * self.rotation;
        self.mark_local_dirty();
    }

    /// Orient so that local -Z points at `target` (in parent space)
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = target - self.position;
        if forward.norm_squared() <= f32::EPSILON {
            return;
        }
        // face_towards aligns +Z with the direction, so aim it away from the target
        self.rotation = Quat::face_towards(&-forward, &up);
        self.mark_local_dirty();
    }

    /// Copy position, rotation and scale from another transform.
    ///
    /// Cached matrices are not copied; they are rebuilt on next access.
    pub fn copy_from(&mut self, other: &Transform) {
        self.position = other.position;
        self.rotation = other.rotation;
        self.scale = other.scale;
        self.mark_local_dirty();
    }

    /// Local matrix T * R * S, rebuilt if dirty
    pub fn local_matrix(&mut self) -> Mat4 {
        if self.local_dirty {
            self.local_matrix = Mat4::trs(&self.position, &self.rotation, &self.scale);
            self.local_dirty = false;
        }
        self.local_matrix
    }

    /// Resolve and cache the world matrix given the parent's world matrix.
    ///
    /// Recomputes only when the world matrix is dirty.
    pub fn resolve_world(&mut self, parent_world: Option<&Mat4>) -> Mat4 {
        if self.world_dirty || self.local_dirty {
            let local = self.local_matrix();
            self.world_matrix = match parent_world {
                Some(parent) => parent * local,
                None => local,
            };
            self.world_dirty = false;
        }
        self.world_matrix
    }

    /// Last resolved world matrix (may be stale if [`Self::is_world_dirty`])
    pub fn cached_world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// Mark the local matrix stale (also stales the world matrix)
    pub fn mark_local_dirty(&mut self) {
        self.local_dirty = true;
        self.world_dirty = true;
    }

    /// Mark only the world matrix stale, e.g. after a parent moved
    pub fn mark_world_dirty(&mut self) {
        self.world_dirty = true;
    }

    /// Whether the local matrix needs rebuilding
    pub fn is_local_dirty(&self) -> bool {
        self.local_dirty
    }

    /// Whether the world matrix needs rebuilding
    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty
    }

    /// World-space position from the cached world matrix
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.translation_part()
    }

    /// World-space forward (-Z) direction from the cached world matrix
    pub fn forward(&self) -> Vec3 {
        -self.world_axis(2)
    }

    /// World-space right (+X) direction from the cached world matrix
    pub fn right(&self) -> Vec3 {
        self.world_axis(0)
    }

    /// World-space up (+Y) direction from the cached world matrix
    pub fn up(&self) -> Vec3 {
        self.world_axis(1)
    }

    fn world_axis(&self, column: usize) -> Vec3 {
        self.world_matrix
            .fixed_view::<3, 1>(0, column)
            .into_owned()
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_transform_is_identity() {
        let mut transform = Transform::identity();
        assert!(!transform.is_local_dirty());
        assert!(transform.is_world_dirty());
        assert_eq!(transform.resolve_world(None), Mat4::identity());
        assert!(!transform.is_world_dirty());
    }

    #[test]
    fn test_new_transform_composes_onto_parent() {
        let parent = Mat4::new_translation(&Vec3::new(0.0, 0.0, -20.0));
        let mut transform = Transform::identity();
        assert_eq!(transform.resolve_world(Some(&parent)), parent);
    }

    #[test]
    fn test_setters_mark_both_flags() {
        let mut transform = Transform::identity();
        transform.set_scale(Vec3::new(2.0, 2.0, 2.0));
        assert!(transform.is_local_dirty());
        assert!(transform.is_world_dirty());

        transform.resolve_world(None);
        assert!(!transform.is_local_dirty());
        assert!(!transform.is_world_dirty());
    }

    #[test]
    fn test_root_world_equals_local() {
        let mut transform = Transform::from_parts(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_euler_angles(0.1, 0.2, 0.3),
            Vec3::new(1.0, 2.0, 0.5),
        );
        let local = transform.local_matrix();
        assert_relative_eq!(transform.resolve_world(None), local);
    }

    #[test]
    fn test_child_world_is_parent_times_local() {
        let mut parent = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        let mut child = Transform::from_position(Vec3::new(5.0, 0.0, 0.0));

        let parent_world = parent.resolve_world(None);
        let child_world = child.resolve_world(Some(&parent_world));

        assert_relative_eq!(child_world, parent_world * child.local_matrix());
        assert_relative_eq!(child.world_position(), Vec3::new(15.0, 0.0, 0.0));
    }

    #[test]
    fn test_world_dirty_recomputes_with_new_parent() {
        let mut child = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        child.resolve_world(Some(&Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0))));

        // Clean cache ignores a different parent until marked dirty
        let stale = child.resolve_world(Some(&Mat4::identity()));
        assert_relative_eq!(stale.translation_part(), Vec3::new(2.0, 0.0, 0.0));

        child.mark_world_dirty();
        let fresh = child.resolve_world(Some(&Mat4::identity()));
        assert_relative_eq!(fresh.translation_part(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_copy_from_reproduces_world_matrix() {
        let parent_world = Mat4::new_translation(&Vec3::new(-3.0, 4.0, 1.0))
            * Quat::from_euler_angles(0.0, 0.7, 0.0).to_homogeneous();
        let mut source = Transform::from_parts(
            Vec3::new(0.5, 1.5, -2.0),
            Quat::from_euler_angles(0.4, -0.2, 0.9),
            Vec3::new(1.0, 3.0, 2.0),
        );
        let mut restored = Transform::identity();
        restored.copy_from(&source);

        assert_eq!(
            restored.resolve_world(Some(&parent_world)),
            source.resolve_world(Some(&parent_world))
        );
    }

    #[test]
    fn test_look_at_points_forward_at_target() {
        let mut transform = Transform::from_position(Vec3::new(0.0, 0.0, 5.0));
        transform.look_at(Vec3::zeros(), Vec3::y());
        transform.resolve_world(None);
        assert_relative_eq!(transform.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);

        transform.look_at(Vec3::new(10.0, 0.0, 5.0), Vec3::y());
        transform.resolve_world(None);
        assert_relative_eq!(transform.forward(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
    }
}
