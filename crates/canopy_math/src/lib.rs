// Re-export glam for convenience
pub use glam::*;

// Canopy math types
mod aabb;
mod frame;
mod interval;
mod sphere;

pub use aabb::Aabb;
pub use frame::Frame;
pub use interval::Interval;
pub use sphere::BoundingSphere;

/// Index of the largest component of `v` by absolute value (0=X, 1=Y, 2=Z).
#[inline]
pub fn dominant_axis(v: DVec3) -> usize {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}
