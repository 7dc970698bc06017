//! Ray type for light transport.
//!
//! A ray carries one intensity per spectral band and the signature of the
//! traversal it belongs to. It is mutated in place from bounce to bounce.

use canopy_math::DVec3;

#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    /// Origin point of the ray
    origin: DVec3,
    /// Unit direction
    direction: DVec3,
    /// Flux carried per band
    pub intensity: Vec<f64>,
    /// Id of the current traversal, used to skip primitives already tested
    pub signature: u64,
    /// Number of surfaces scattered from so far
    pub depth: u32,
    /// Primitive the ray is leaving, never intersected by this segment
    pub origin_primitive: Option<usize>,
}

impl Ray {
    /// Create a new ray; `direction` is normalized.
    pub fn new(origin: DVec3, direction: DVec3, intensity: Vec<f64>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            intensity,
            signature: 0,
            depth: 0,
            origin_primitive: None,
        }
    }

    #[inline]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> DVec3 {
        self.direction
    }

    /// Compute a point along the ray at parameter t.
    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + t * self.direction
    }

    pub fn set_origin(&mut self, origin: DVec3) {
        self.origin = origin;
    }

    /// Start a new segment from `origin` along `direction` (normalized here).
    pub fn redirect(&mut self, origin: DVec3, direction: DVec3, from: Option<usize>) {
        self.origin = origin;
        self.direction = direction.normalize();
        self.origin_primitive = from;
    }

    /// Mean intensity over the given bands.
    pub fn mean_intensity(&self, bands: &[usize]) -> f64 {
        if bands.is_empty() {
            return 0.0;
        }
        bands.iter().map(|&b| self.intensity[b]).sum::<f64>() / bands.len() as f64
    }
}
