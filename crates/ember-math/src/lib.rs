// SPDX-License-Identifier: CEPL-1.0
pub use glam::{Mat4, Vec3, Vec4};

/// Look-at camera producing matrices for Vulkan clip space
/// (right-handed, Y pointing down, depth in `[0, 1]`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view, radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far);
        // Vulkan's framebuffer Y axis points down.
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    /// Column-major matrix as consumed by the pipeline's push constant.
    pub fn transform(&self, aspect: f32) -> [[f32; 4]; 4] {
        self.view_projection(aspect).to_cols_array_2d()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(cam: &Camera, p: Vec3) -> Vec3 {
        let clip = cam.view_projection(1.0) * p.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn target_lands_in_the_middle() {
        let cam = Camera::default();
        let ndc = project(&cam, cam.target);
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn up_is_negative_y_in_clip_space() {
        let cam = Camera::default();
        let ndc = project(&cam, Vec3::new(0.0, 0.5, 0.0));
        assert!(ndc.y < 0.0, "expected flipped y, got {}", ndc.y);
    }

    #[test]
    fn depth_grows_with_distance() {
        let cam = Camera::default();
        let near = project(&cam, Vec3::new(0.0, 0.0, 1.0));
        let far = project(&cam, Vec3::new(0.0, 0.0, -10.0));
        assert!(near.z < far.z);
        assert!(far.z <= 1.0);
    }

    #[test]
    fn transform_is_column_major() {
        let cam = Camera::default();
        let cols = cam.transform(1.5);
        assert_eq!(Mat4::from_cols_array_2d(&cols), cam.view_projection(1.5));
    }
}
