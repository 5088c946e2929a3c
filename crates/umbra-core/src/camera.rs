use glam::{Mat4, Vec3};

/// First-person camera. Yaw 0 / pitch 0 looks down world +Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect_ratio: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

impl Camera {
    pub fn new_perspective(position: Vec3, fov_y: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            fov_y,
            aspect_ratio,
            near_plane: near,
            far_plane: far,
        }
    }

    /// The demo camera: five units back from the origin, 90 degree fov.
    pub fn demo(width: u32, height: u32) -> Self {
        let mut camera = Self::new_perspective(
            Vec3::new(0.0, 0.0, -5.0),
            90f32.to_radians(),
            1.0,
            0.001,
            1000.0,
        );
        camera.set_viewport(width, height);
        camera
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect_ratio = width as f32 / height.max(1) as f32;
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    /// Applies a mouse-look delta, keeping pitch short of the poles.
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        let limit = 89f32.to_radians();
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-limit, limit);
    }

    /// Moves relative to the current orientation; `x` strafes, `z` advances.
    pub fn translate_local(&mut self, delta: Vec3) {
        let forward = self.forward();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        self.position += right * delta.x + Vec3::Y * delta.y + forward * delta.z;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Right-handed perspective with wgpu's [0, 1] depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect_ratio, self.near_plane, self.far_plane)
    }

    pub fn inverse_projection(&self) -> Mat4 {
        self.projection_matrix().inverse()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4Swizzles;

    #[test]
    fn demo_camera_looks_at_origin() {
        let camera = Camera::demo(1920, 1080);
        assert_relative_eq!(camera.aspect_ratio, 1920.0 / 1080.0);
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin, Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);

        let clip = camera.view_projection() * Vec3::ZERO.extend(1.0);
        let ndc = clip.xyz() / clip.w;
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn aspect_uses_float_division() {
        let mut camera = Camera::demo(4, 3);
        assert_relative_eq!(camera.aspect_ratio, 4.0 / 3.0);
        camera.set_viewport(1280, 1024);
        assert_relative_eq!(camera.aspect_ratio, 1.25);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::demo(1, 1);
        camera.rotate(0.0, 10.0);
        assert!(camera.forward().y < 1.0);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
    }
}
