use glam::{Mat4, Vec3};

use crate::{config::CameraConfig, transform::Transform};

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov: 45.0f32.to_radians(),
            aspect_ratio: 16.0 / 9.0, // Standard monitor
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn from_config(config: &CameraConfig, aspect_ratio: f32) -> Self {
        Self {
            fov: config.fov_y_degrees.to_radians(),
            aspect_ratio,
            near: config.near,
            far: config.far,
        }
    }

    /// Computes the "Projection Matrix" (View -> Clip), wgpu depth range [0, 1]
    pub fn compute_projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Keeps the projection in sync with the surface.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }
}

/// The camera together with where it sits in the world.
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub camera: Camera,
    pub transform: Transform,
}

impl CameraRig {
    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        let aspect = if height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };
        let transform = Transform::from_xyz(config.position[0], config.position[1], config.position[2])
            .looking_at(Vec3::from_array(config.target), Vec3::Y);

        Self {
            camera: Camera::from_config(config, aspect),
            transform,
        }
    }

    /// World -> View. The camera looks down -Z.
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.transform.translation;
        Mat4::look_at_rh(eye, eye + self.transform.forward(), self.transform.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.camera.compute_projection_matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn view_matrix_puts_target_on_negative_z() {
        let config = CameraConfig {
            position: [0.0, 0.0, 10.0],
            target: [0.0, 0.0, 0.0],
            ..Default::default()
        };
        let rig = CameraRig::from_config(&config, 800, 600);
        let target_view = rig.view_matrix().transform_point3(Vec3::ZERO);
        assert_relative_eq!(target_view.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(target_view.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(target_view.z, -10.0, epsilon = 1e-4);
    }

    #[test]
    fn projection_maps_near_and_far_to_zero_and_one() {
        let camera = Camera::default();
        let proj = camera.compute_projection_matrix();
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -camera.near));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -camera.far));
        assert_relative_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_sized_viewport_keeps_previous_aspect() {
        let mut camera = Camera::default();
        let before = camera.aspect_ratio;
        camera.set_viewport(0, 600);
        assert_eq!(camera.aspect_ratio, before);
        camera.set_viewport(1000, 500);
        assert_eq!(camera.aspect_ratio, 2.0);
    }
}
