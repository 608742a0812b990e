//! Math utilities and types
//!
//! Provides the fundamental math types for the scene core. Matrices follow
//! nalgebra's column-vector convention: a point is transformed as `M * p`,
//! and composite transforms read right-to-left (`parent * local`,
//! `projection * view`).

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Unit quaternion type for rotations
pub type Quat = nalgebra::UnitQuaternion<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Relative luminance of a linear RGB triple (Rec. 709 weights)
    pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }
}

/// Extension trait for Mat4 with the constructors the scene core needs
pub trait Mat4Ext {
    /// Compose translation * rotation * scale.
    ///
    /// The scale is folded into the rotation matrix by scaling its columns,
    /// so no separate scale matrix product is performed.
    fn trs(position: &Vec3, rotation: &Quat, scale: &Vec3) -> Mat4;

    /// OpenGL-style perspective projection.
    ///
    /// `fov_y` is the vertical field of view in radians, `aspect` is
    /// width / height. Clip-space depth maps to [-1, 1].
    ///
    /// Preconditions (not validated): `0 < near < far`, `aspect > 0`.
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// OpenGL-style orthographic projection centred on the view axis.
    fn orthographic_gl(width: f32, height: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix.
    ///
    /// The up vector does not need to be perpendicular to the view
    /// direction; it is re-orthogonalized against it.
    fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4;

    /// Translation column of an affine matrix
    fn translation_part(&self) -> Vec3;

    /// Transform a point (w = 1) and return the 3D result
    fn transform_point3(&self, point: &Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn trs(position: &Vec3, rotation: &Quat, scale: &Vec3) -> Mat4 {
        let rotation_matrix = rotation.to_rotation_matrix();
        let r = rotation_matrix.matrix();

        let mut result = Mat4::identity();
        for col in 0..3 {
            let s = scale[col];
            for row in 0..3 {
                result[(row, col)] = r[(row, col)] * s;
            }
        }
        result[(0, 3)] = position.x;
        result[(1, 3)] = position.y;
        result[(2, 3)] = position.z;
        result
    }

    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let f = 1.0 / (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = f / aspect;
        result[(1, 1)] = f;
        result[(2, 2)] = (far + near) / (near - far);
        result[(2, 3)] = (2.0 * far * near) / (near - far);
        result[(3, 2)] = -1.0;
        result
    }

    fn orthographic_gl(width: f32, height: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / width;
        result[(1, 1)] = 2.0 / height;
        result[(2, 2)] = -2.0 / (far - near);
        result[(2, 3)] = -(far + near) / (far - near);
        result
    }

    fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }

    fn transform_point3(&self, point: &Vec3) -> Vec3 {
        self.transform_point(&Point3::from(*point)).coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_trs_matches_separate_products() {
        let position = Vec3::new(1.0, -2.0, 3.0);
        let rotation = Quat::from_euler_angles(0.3, 1.1, -0.4);
        let scale = Vec3::new(2.0, 0.5, 3.0);

        let expected = Mat4::new_translation(&position)
            * rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&scale);

        assert_relative_eq!(Mat4::trs(&position, &rotation, &scale), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_maps_target_onto_negative_z() {
        let view = Mat4::look_at(&Vec3::new(0.0, 0.0, 5.0), &Vec3::zeros(), &Vec3::y());
        let target_in_view = view.transform_point3(&Vec3::zeros());
        assert_relative_eq!(target_in_view, Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_reorthogonalizes_up() {
        // Up tilted towards the view direction still yields an orthonormal basis
        let view = Mat4::look_at(&Vec3::zeros(), &Vec3::new(0.0, 0.0, -1.0), &Vec3::new(0.0, 1.0, -0.5));
        let rotation = view.fixed_view::<3, 3>(0, 0).into_owned();
        assert_relative_eq!(rotation * rotation.transpose(), Mat3::identity(), epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_depth_range() {
        let projection = Mat4::perspective_gl(utils::deg_to_rad(90.0), 1.0, 1.0, 10.0);
        let near = projection * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -10.0, 1.0);
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_edges() {
        let projection = Mat4::orthographic_gl(20.0, 10.0, 1.0, 11.0);
        let corner = projection * Vec4::new(10.0, 5.0, -11.0, 1.0);
        assert_relative_eq!(corner, Vec4::new(1.0, 1.0, 1.0, 1.0), epsilon = 1e-5);
    }
}
