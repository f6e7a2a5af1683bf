//! Fly-through camera and the fixed matrices around it.

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

pub const FOV_Y_DEGREES: f32 = 45.0;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;

const PITCH_LIMIT: f32 = 89.0;

/// Input accumulated since the previous frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    /// x: right, y: up, z: forward; each component in [-1, 1].
    pub movement: Vec3,
    /// Arrow keys: x yaw, y pitch; each component in [-1, 1].
    pub look: glam::Vec2,
    /// Dragged pixels since last frame.
    pub drag: glam::Vec2,
}

impl CameraInput {
    pub fn is_idle(&self) -> bool {
        self.movement == Vec3::ZERO && self.look == glam::Vec2::ZERO && self.drag == glam::Vec2::ZERO
    }
}

/// Position plus yaw/pitch in degrees. Yaw 0 looks down -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for CameraState {
    /// Eye at (0, 1, 2) looking at the origin.
    fn default() -> Self {
        Self::looking_at(Vec3::new(0.0, 1.0, 2.0), Vec3::ZERO)
    }
}

impl CameraState {
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        let dir = (target - eye).normalize_or_zero();
        let pitch = dir.y.clamp(-1.0, 1.0).asin().to_degrees();
        let yaw = dir.x.atan2(-dir.z).to_degrees();
        Self {
            position: eye,
            yaw,
            pitch,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.sin() * pitch.cos(), pitch.sin(), -yaw.cos() * pitch.cos())
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    /// Advance by `dt` seconds of held input.
    pub fn apply(&mut self, input: &CameraInput, cfg: &CameraConfig, dt: f32) {
        self.yaw += input.look.x * cfg.look_speed * dt + input.drag.x * cfg.drag_sensitivity;
        self.pitch += input.look.y * cfg.look_speed * dt - input.drag.y * cfg.drag_sensitivity;
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let step = cfg.move_speed * dt;
        self.position += self.right() * input.movement.x * step;
        self.position += Vec3::Y * input.movement.y * step;
        self.position += self.forward() * input.movement.z * step;
    }
}

pub fn projection(width: u32, height: u32) -> Mat4 {
    Mat4::perspective_rh_gl(FOV_Y_DEGREES.to_radians(), aspect_ratio(width, height), Z_NEAR, Z_FAR)
}

/// `width / height`, or 1 for a zero-height viewport.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Model matrix: rotate X, Y, Z (degrees), then scale, then translate, right-multiplied in
/// that order.
pub fn model_matrix(offset: Vec3, scale: Vec3, rotation: Vec3) -> Mat4 {
    Mat4::from_rotation_x(rotation.x.to_radians())
        * Mat4::from_rotation_y(rotation.y.to_radians())
        * Mat4::from_rotation_z(rotation.z.to_radians())
        * Mat4::from_scale(scale)
        * Mat4::from_translation(offset)
}

/// The per-frame matrix set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub model: Mat4,
    pub model_view: Mat4,
    pub mvp: Mat4,
}

impl Matrices {
    pub fn new(view: Mat4, projection: Mat4, model: Mat4) -> Self {
        let model_view = view * model;
        Self {
            view,
            projection,
            model,
            model_view,
            mvp: projection * model_view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_view_matches_look_at_origin() {
        let cam = CameraState::default();
        let expected = Mat4::look_at_rh(Vec3::new(0.0, 1.0, 2.0), Vec3::ZERO, Vec3::Y);
        assert!(cam.view().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn forward_movement_follows_view_direction() {
        let mut cam = CameraState::looking_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let cfg = CameraConfig::default();
        let input = CameraInput {
            movement: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        cam.apply(&input, &cfg, 0.5);
        assert!(close(cam.position, Vec3::new(0.0, 0.0, -cfg.move_speed * 0.5)));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = CameraState::default();
        let input = CameraInput {
            drag: glam::Vec2::new(0.0, -10_000.0),
            ..Default::default()
        };
        cam.apply(&input, &CameraConfig::default(), 0.016);
        assert_eq!(cam.pitch, PITCH_LIMIT);
    }

    #[test]
    fn aspect_handles_zero_height() {
        assert_eq!(aspect_ratio(800, 0), 1.0);
        assert_eq!(aspect_ratio(800, 400), 2.0);
    }

    #[test]
    fn model_matrix_scales_before_rotating_and_translates_first() {
        let m = model_matrix(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(2.0), Vec3::new(0.0, 0.0, 90.0));
        // T then S then Rz(90): (0,0,0) -> (1,0,0) -> (2,0,0) -> (0,2,0)
        let p = m.transform_point3(Vec3::ZERO);
        assert!(close(p, Vec3::new(0.0, 2.0, 0.0)), "{p:?}");
    }

    #[test]
    fn matrices_compose() {
        let v = Mat4::from_translation(Vec3::X);
        let p = Mat4::from_scale(Vec3::splat(2.0));
        let m = Mat4::from_rotation_y(1.0);
        let mats = Matrices::new(v, p, m);
        assert!(mats.mvp.abs_diff_eq(p * v * m, 1e-6));
    }
}
