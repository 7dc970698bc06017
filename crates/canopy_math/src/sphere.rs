use crate::DVec3;

/// Bounding sphere grown incrementally as points are added.
///
/// Each point outside the sphere moves the center toward it just far enough
/// to enclose both the old sphere and the point. The result encloses every
/// point seen but is not the minimal enclosing sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
    initialized: bool,
}

impl BoundingSphere {
    pub const EMPTY: BoundingSphere = BoundingSphere {
        center: DVec3::ZERO,
        radius: 0.0,
        initialized: false,
    };

    /// Grow the sphere to enclose `p`.
    pub fn include_point(&mut self, p: DVec3) {
        if !self.initialized {
            self.center = p;
            self.radius = 0.0;
            self.initialized = true;
            return;
        }

        let offset = p - self.center;
        let dist = offset.length();
        if dist <= self.radius {
            return;
        }

        let new_radius = 0.5 * (self.radius + dist);
        self.center += offset * ((new_radius - self.radius) / dist);
        self.radius = new_radius;
    }

    pub fn is_empty(&self) -> bool {
        !self.initialized
    }

    pub fn contains(&self, p: DVec3, tolerance: f64) -> bool {
        (p - self.center).length() <= self.radius + tolerance
    }
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::EMPTY
    }
}
