//! Local scattering models.
//!
//! Every model draws a reflected direction on the side the ray came from.
//! Transmission uses the same lobe mirrored through the surface plane, which
//! turns the ideal reflection into the unrefracted straight-through direction
//! and the cosine lobe about the normal into one about the opposite normal.

use std::f64::consts::TAU;

use canopy_core::ReflectanceModel;
use canopy_math::{DVec3, Frame};

/// Mirror `d` about the plane with normal `n`.
#[inline]
pub fn reflect(d: DVec3, n: DVec3) -> DVec3 {
    d - 2.0 * d.dot(n) * n
}

/// Flip a direction that ended up on the wrong side of the surface back
/// into the hemisphere around `side`.
#[inline]
fn keep_on_side(d: DVec3, side: DVec3) -> DVec3 {
    if d.dot(side) < 0.0 {
        reflect(d, side)
    } else {
        d
    }
}

/// Cosine-weighted direction around `axis`.
pub fn sample_cosine(axis: DVec3, u1: f64, u2: f64) -> DVec3 {
    Frame::from_w(axis).direction(u1.sqrt(), TAU * u2)
}

/// Direction in a Phong lobe `cos^exponent` around `axis`.
pub fn sample_phong_lobe(axis: DVec3, exponent: f64, u1: f64, u2: f64) -> DVec3 {
    let cos_theta = u1.powf(1.0 / (exponent.max(0.0) + 1.0));
    Frame::from_w(axis).direction(cos_theta, TAU * u2)
}

/// Outgoing direction after scattering `incoming` at a surface with normal
/// `normal` (either orientation).
pub fn scatter(
    model: ReflectanceModel,
    incoming: DVec3,
    normal: DVec3,
    exponent: f64,
    transmit: bool,
    u1: f64,
    u2: f64,
) -> DVec3 {
    // Normal on the side the ray arrived from
    let side = if normal.dot(incoming) < 0.0 { normal } else { -normal };

    let reflected = match model {
        ReflectanceModel::Lambertian => sample_cosine(side, u1, u2),
        ReflectanceModel::Phong => {
            let ideal = reflect(incoming, side);
            keep_on_side(sample_phong_lobe(ideal, exponent, u1, u2), side)
        }
        ReflectanceModel::BlinnPhong => {
            let half = sample_phong_lobe(side, exponent, u1, u2);
            keep_on_side(reflect(incoming, half), side)
        }
    };

    let out = if transmit {
        reflect(reflected, side)
    } else {
        reflected
    };
    out.normalize()
}
