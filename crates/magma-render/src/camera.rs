//! Camera and model transforms.
//!
//! Rotations are expressed in turns (1.0 = a full revolution); input code
//! maps "drag across the window" to a fraction of a turn directly.

use glam::{Mat4, Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};

/// A rotation of `turns` revolutions about `axis`.
pub fn quat_from_turns(axis: Vec3, turns: f32) -> Quat {
    Quat::from_axis_angle(axis, turns * TAU)
}

/// First-person camera.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            // Slight downward pitch so a model at the origin sits in view.
            orientation: Quat::from_axis_angle(Vec3::X, 0.065),
        }
    }
}

impl Camera {
    /// Rotate by `pitch` and `yaw` turns.
    ///
    /// Yaw composes on the right, then pitch about the world horizontal axis
    /// brought into camera space via the conjugate.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.orientation = (self.orientation * quat_from_turns(Vec3::Y, yaw)).normalize();
        let horizontal_axis = self.orientation.conjugate() * Vec3::NEG_X;
        self.orientation = (self.orientation * quat_from_turns(horizontal_axis, pitch)).normalize();
    }

    /// World-to-view matrix: the inverse of the camera's world transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }
}

/// Position and orientation of a displayed model.
#[derive(Debug, Clone, Copy)]
pub struct ModelTransform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl ModelTransform {
    /// Model-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Spin the model by `pitch` and `yaw` turns (drag-to-spin).
    pub fn spin(&mut self, pitch: f32, yaw: f32) {
        self.orientation =
            (self.orientation * quat_from_turns(Vec3::X, pitch) * quat_from_turns(Vec3::Y, yaw))
                .normalize();
    }
}

/// The fixed projection: 90 degree vertical field of view, square aspect,
/// near 15, far 1000, left-handed with depth 0..1.
pub fn projection_matrix() -> Mat4 {
    Mat4::perspective_lh(FRAC_PI_2, 1.0, 15.0, 1000.0)
}

/// Per-frame transform block, laid out exactly as the vertex shader's
/// uniform buffer expects (three column-major mat4s).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl TransformUniforms {
    /// Build the block from the current model and camera state.
    pub fn new(model: &ModelTransform, camera: &Camera) -> Self {
        Self {
            model: model.matrix().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            projection: projection_matrix().to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quarter_turn_yaw_maps_forward_to_x() {
        let mut camera = Camera {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        };
        camera.rotate(0.0, 0.25);

        let forward = camera.orientation * Vec3::Z;
        assert_relative_eq!(forward.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn view_matrix_inverts_camera_transform() {
        let mut camera = Camera {
            position: Vec3::new(3.0, -2.0, 7.5),
            orientation: Quat::IDENTITY,
        };
        camera.rotate(0.1, -0.3);

        let world = Mat4::from_rotation_translation(camera.orientation, camera.position);
        let product = camera.view_matrix() * world;

        for (col, expected) in product
            .to_cols_array()
            .iter()
            .zip(Mat4::IDENTITY.to_cols_array())
        {
            assert_relative_eq!(*col, expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn pitch_tilts_forward_vertically() {
        let mut camera = Camera {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        };
        camera.rotate(0.12, 0.0);

        let forward = camera.orientation * Vec3::Z;
        assert_relative_eq!(forward.y, (0.12 * TAU).sin(), epsilon = 1e-5);
        assert_relative_eq!(forward.z, (0.12 * TAU).cos(), epsilon = 1e-5);
    }

    #[test]
    fn model_spin_composes_on_the_right() {
        let mut transform = ModelTransform::default();
        transform.spin(0.25, 0.0);

        let up = transform.orientation * Vec3::Y;
        assert_relative_eq!(up.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn projection_is_square_symmetric() {
        let m = projection_matrix();
        // 90 degree FoV at aspect 1 means both focal terms are 1.
        assert_relative_eq!(m.col(0).x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(m.col(1).y, 1.0, epsilon = 1e-6);
    }
}
