use crate::DVec3;

/// Right-handed orthonormal basis with `w` as the principal axis.
///
/// Used to turn local lobe samples (around +w) into world directions and
/// to span disks perpendicular to a light direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub u: DVec3,
    pub v: DVec3,
    pub w: DVec3,
}

impl Frame {
    /// Build a frame around the (unit) vector `w`.
    pub fn from_w(w: DVec3) -> Self {
        let (u, v) = w.any_orthonormal_pair();
        Self { u, v, w }
    }

    /// Map local coordinates to world space.
    #[inline]
    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.u * local.x + self.v * local.y + self.w * local.z
    }

    /// Direction at polar angle `acos(cos_theta)` from `w` and azimuth `phi`.
    pub fn direction(&self, cos_theta: f64, phi: f64) -> DVec3 {
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        self.to_world(DVec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta))
    }
}
