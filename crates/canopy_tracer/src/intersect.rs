//! Ray / planar polygon intersection.

use canopy_core::Primitive;

use crate::ray::Ray;

/// Hits closer than this to the ray origin are ignored.
pub const INTERSECT_EPSILON: f64 = 1e-9;

/// Distance along `ray` to `primitive` if it is hit before `best`.
///
/// Each primitive is tested at most once per ray signature: the first test
/// stamps it, and later tests from other cells return `None` at once.
pub fn is_intersection(primitive: &mut Primitive, ray: &Ray, best: f64) -> Option<f64> {
    if primitive.signature == ray.signature {
        return None;
    }
    primitive.signature = ray.signature;

    let denom = primitive.normal.dot(ray.direction());
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (primitive.plane_d - primitive.normal.dot(ray.origin())) / denom;
    if t < INTERSECT_EPSILON || t >= best {
        return None;
    }

    // Drop the axis the normal is most aligned with
    let (a, b) = match primitive.projection_axis {
        0 => (1, 2),
        1 => (2, 0),
        _ => (0, 1),
    };
    let hit = ray.at(t);
    let (px, py) = (hit[a], hit[b]);

    // Inside when every edge sees the point on the same side
    let vertices = primitive.vertices();
    let n = vertices.len();
    let mut sign = 0.0;
    for i in 0..n {
        let v0 = vertices[i];
        let v1 = vertices[(i + 1) % n];
        let cross = (v1[a] - v0[a]) * (py - v0[b]) - (v1[b] - v0[b]) * (px - v0[a]);
        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross;
        } else if (cross > 0.0) != (sign > 0.0) {
            return None;
        }
    }

    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_math::DVec3;

    fn floor_quad() -> Primitive {
        let verts = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 2.0),
            DVec3::new(0.0, 0.0, 2.0),
        ];
        Primitive::new(&verts, 0, 0, None, DVec3::Y, 1).unwrap()
    }

    fn slanted_triangle() -> Primitive {
        let verts = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        Primitive::new(&verts, 0, 0, None, DVec3::Y, 1).unwrap()
    }

    fn ray_down(x: f64, z: f64, signature: u64) -> Ray {
        let mut ray = Ray::new(DVec3::new(x, 5.0, z), DVec3::NEG_Y, vec![1.0]);
        ray.signature = signature;
        ray
    }

    #[test]
    fn test_quad_hit_and_miss() {
        let mut quad = floor_quad();
        assert_eq!(is_intersection(&mut quad, &ray_down(1.0, 1.0, 1), f64::INFINITY), Some(5.0));
        assert_eq!(is_intersection(&mut quad, &ray_down(2.5, 1.0, 2), f64::INFINITY), None);
        assert_eq!(is_intersection(&mut quad, &ray_down(1.0, -0.1, 3), f64::INFINITY), None);
    }

    #[test]
    fn test_signature_prevents_retest() {
        let mut quad = floor_quad();
        let ray = ray_down(1.0, 1.0, 7);
        assert!(is_intersection(&mut quad, &ray, f64::INFINITY).is_some());
        assert_eq!(quad.signature, 7);
        assert!(is_intersection(&mut quad, &ray, f64::INFINITY).is_none());
    }

    #[test]
    fn test_rejects_outside_distance_range() {
        let mut quad = floor_quad();
        // Farther than the current best
        assert_eq!(is_intersection(&mut quad, &ray_down(1.0, 1.0, 1), 4.0), None);

        // Behind the origin
        let mut up = Ray::new(DVec3::new(1.0, 5.0, 1.0), DVec3::Y, vec![1.0]);
        up.signature = 2;
        assert_eq!(is_intersection(&mut quad, &up, f64::INFINITY), None);

        // Parallel to the plane
        let mut flat = Ray::new(DVec3::new(-1.0, 0.0, 1.0), DVec3::X, vec![1.0]);
        flat.signature = 3;
        assert_eq!(is_intersection(&mut quad, &flat, f64::INFINITY), None);
    }

    #[test]
    fn test_slanted_triangle_projection() {
        let mut tri = slanted_triangle();
        assert_eq!(tri.projection_axis, 0);

        // Point (0.5, 0.5, 0.25) lies inside the triangle
        let mut ray = Ray::new(DVec3::new(-1.0, 0.5, 0.25), DVec3::X, vec![1.0]);
        ray.signature = 1;
        let t = is_intersection(&mut tri, &ray, f64::INFINITY).unwrap();
        assert!((t - 1.5).abs() < 1e-12);

        // (0.5, 0.5, 0.9) is past the hypotenuse
        let mut ray = Ray::new(DVec3::new(-1.0, 0.5, 0.9), DVec3::X, vec![1.0]);
        ray.signature = 2;
        assert_eq!(is_intersection(&mut tri, &ray, f64::INFINITY), None);
    }

    #[test]
    fn test_hit_on_either_side() {
        let mut quad = floor_quad();
        let mut from_below = Ray::new(DVec3::new(0.5, -2.0, 0.5), DVec3::Y, vec![1.0]);
        from_below.signature = 1;
        assert_eq!(is_intersection(&mut quad, &from_below, f64::INFINITY), Some(2.0));
    }
}
