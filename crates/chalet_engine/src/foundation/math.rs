//! Math utilities and types
//!
//! nalgebra aliases plus the projection helpers Vulkan's clip space needs.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Rotation of `angle` radians about the Z axis as a homogeneous matrix
pub fn rotation_z(angle: f32) -> Mat4 {
    Mat4::from_axis_angle(&Vec3::z_axis(), angle)
}

/// Right-handed look-at view matrix
pub fn look_at(eye: Point3, target: Point3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(&eye, &target, &up)
}

/// Right-handed perspective projection mapping depth to `[0, 1]`
///
/// nalgebra's own perspective maps depth to `[-1, 1]`, which Vulkan clips
/// against incorrectly. The Y axis is left in OpenGL orientation; callers
/// negate `(1, 1)` for Vulkan's downward Y.
pub fn perspective_zo(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fovy * 0.5).tan();
    let fn_inv = 1.0 / (near - far);

    let mut m = Mat4::zeros();
    m[(0, 0)] = f / aspect;
    m[(1, 1)] = f;
    m[(2, 2)] = far * fn_inv;
    m[(3, 2)] = -1.0;
    m[(2, 3)] = near * far * fn_inv;
    m
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Largest power-of-two exponent not above `value` (`floor(log2(value))`)
    ///
    /// Returns 0 for 0.
    pub fn floor_log2(value: u32) -> u32 {
        value.checked_ilog2().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_perspective_zo_depth_range() {
        let proj = perspective_zo(utils::deg_to_rad(45.0), 4.0 / 3.0, 0.1, 10.0);

        // A point on the near plane lands at depth 0, far plane at depth 1
        let near = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -10.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let rot = rotation_z(std::f32::consts::FRAC_PI_2);
        let v = rot * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(v, Vec4::new(0.0, 1.0, 0.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Point3::new(2.0, 2.0, 2.0);
        let view = look_at(eye, Point3::origin(), Vec3::z());
        let transformed = view * eye.to_homogeneous();
        assert_relative_eq!(transformed, Vec4::new(0.0, 0.0, 0.0, 1.0), epsilon = 1e-5);

        // The target sits straight ahead on -Z
        let target = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.z, -(12.0f32).sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_floor_log2() {
        assert_eq!(utils::floor_log2(0), 0);
        assert_eq!(utils::floor_log2(1), 0);
        assert_eq!(utils::floor_log2(512), 9);
        assert_eq!(utils::floor_log2(1023), 9);
        assert_eq!(utils::floor_log2(1024), 10);
    }
}
