use crate::{DVec3, Interval};

/// Axis-Aligned Bounding Box used by the scene grid.
///
/// An AABB is defined by three intervals (one per axis) that bound a 3D volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Smallest box containing every point of `points`.
    pub fn from_slice(points: &[DVec3]) -> Self {
        points
            .iter()
            .fold(Aabb::EMPTY, |acc, p| acc.include_point(*p))
    }

    /// Grow the box so it contains `p`.
    pub fn include_point(&self, p: DVec3) -> Self {
        Self {
            x: self.x.include(p.x),
            y: self.y.include(p.y),
            z: self.z.include(p.z),
        }
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Replace the interval of one axis.
    pub fn set_axis_interval(&mut self, n: usize, interval: Interval) {
        match n {
            0 => self.x = interval,
            1 => self.y = interval,
            _ => self.z = interval,
        }
    }

    pub fn min(&self) -> DVec3 {
        DVec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> DVec3 {
        DVec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Extent along each axis.
    pub fn size(&self) -> DVec3 {
        self.max() - self.min()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// True when `p` lies inside the box (boundary included).
    pub fn contains(&self, p: DVec3) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
    }

    /// Clip a ray against the box with the slab method.
    ///
    /// Returns the parametric entry and exit distances, clipped to `ray_t`,
    /// or `None` when the ray misses the box. Axes with a zero direction
    /// component only pass when the origin lies within that slab.
    pub fn clip(&self, origin: DVec3, direction: DVec3, mut ray_t: Interval) -> Option<(f64, f64)> {
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let o = origin[axis];
            let d = direction[axis];

            if d == 0.0 {
                if o < slab.min || o > slab.max {
                    return None;
                }
                continue;
            }

            let adinv = 1.0 / d;
            let mut t0 = (slab.min - o) * adinv;
            let mut t1 = (slab.max - o) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.max < ray_t.min {
                return None;
            }
        }

        Some((ray_t.min, ray_t.max))
    }

    /// Static constants
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}
