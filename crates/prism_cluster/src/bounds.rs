use glam::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Squared distance from `p` to the closest point of the box (0 inside).
    pub fn distance_squared(&self, p: Vec3) -> f32 {
        let closest = p.clamp(self.min, self.max);
        closest.distance_squared(p)
    }
}

/// A light's influence volume in view space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        aabb.distance_squared(self.center) <= self.radius * self.radius
    }
}
