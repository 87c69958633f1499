use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rotates the object around the Y axis (Global Up)
    pub fn rotate_y(&mut self, angle_radians: f32) {
        self.rotation = Quat::from_rotation_y(angle_radians) * self.rotation;
    }

    /// Rotates around the X axis (Local Right)
    pub fn rotate_local_x(&mut self, angle_radians: f32) {
        self.rotation *= Quat::from_rotation_x(angle_radians);
    }

    /// Points -Z at `target`.
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        // look_at moves the world, the object rotation is its inverse
        let mat = Mat4::look_at_rh(self.translation, target, up);
        self.rotation = Quat::from_mat4(&mat.inverse()).normalize();
        self
    }

    /// Local -> World
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn looking_at_aims_forward_at_target() {
        let t = Transform::from_xyz(0.0, 0.0, 5.0).looking_at(Vec3::new(5.0, 0.0, 5.0), Vec3::Y);
        let f = t.forward();
        assert_relative_eq!(f.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(f.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(f.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn compute_matrix_applies_scale_then_translation() {
        let t = Transform::from_xyz(1.0, 2.0, 3.0).with_scale(Vec3::splat(2.0));
        let p = t.compute_matrix().transform_point3(Vec3::ONE);
        assert_relative_eq!(p.x, 3.0);
        assert_relative_eq!(p.y, 4.0);
        assert_relative_eq!(p.z, 5.0);
    }
}
