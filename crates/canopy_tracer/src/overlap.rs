//! Triangle / axis-aligned box overlap by the separating axis theorem.
//!
//! Tests the 9 cross products of triangle edges with box axes, the 3 box
//! axes, and the triangle's plane (Akenine-Möller). Touching counts as
//! overlapping.

use canopy_math::DVec3;

/// Projection of the triangle onto `axis` misses the box's projection.
#[inline]
fn separated_on(axis: DVec3, v: &[DVec3; 3], half: DVec3) -> bool {
    // Parallel edge and box axis give a zero axis, which separates nothing
    if axis.length_squared() < 1e-30 {
        return false;
    }
    let p0 = axis.dot(v[0]);
    let p1 = axis.dot(v[1]);
    let p2 = axis.dot(v[2]);
    let min = p0.min(p1).min(p2);
    let max = p0.max(p1).max(p2);
    let r = half.dot(axis.abs());
    min > r || max < -r
}

/// Plane through `vertex` with `normal` touches the box `[-half, half]`.
fn plane_box_overlap(normal: DVec3, vertex: DVec3, half: DVec3) -> bool {
    let mut vmin = DVec3::ZERO;
    let mut vmax = DVec3::ZERO;
    for q in 0..3 {
        if normal[q] > 0.0 {
            vmin[q] = -half[q] - vertex[q];
            vmax[q] = half[q] - vertex[q];
        } else {
            vmin[q] = half[q] - vertex[q];
            vmax[q] = -half[q] - vertex[q];
        }
    }
    if normal.dot(vmin) > 0.0 {
        return false;
    }
    normal.dot(vmax) >= 0.0
}

/// True if the triangle touches the box with the given center and half size.
pub fn tri_box_overlap(center: DVec3, half: DVec3, triangle: &[DVec3; 3]) -> bool {
    // Move the box to the origin
    let v = [
        triangle[0] - center,
        triangle[1] - center,
        triangle[2] - center,
    ];

    // Box axes: compare the triangle's bounds with the box
    for axis in 0..3 {
        let min = v[0][axis].min(v[1][axis]).min(v[2][axis]);
        let max = v[0][axis].max(v[1][axis]).max(v[2][axis]);
        if min > half[axis] || max < -half[axis] {
            return false;
        }
    }

    // Edge x box-axis cross products
    let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];
    for edge in edges {
        for unit in [DVec3::X, DVec3::Y, DVec3::Z] {
            if separated_on(unit.cross(edge), &v, half) {
                return false;
            }
        }
    }

    // Triangle plane
    let normal = edges[0].cross(edges[1]);
    plane_box_overlap(normal, v[0], half)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF: DVec3 = DVec3::ONE;

    #[test]
    fn test_triangle_outside_on_one_axis() {
        let tri = [
            DVec3::new(2.0, -1.0, -1.0),
            DVec3::new(3.0, 1.0, 0.0),
            DVec3::new(2.5, 0.0, 1.0),
        ];
        assert!(!tri_box_overlap(DVec3::ZERO, HALF, &tri));
    }

    #[test]
    fn test_vertex_inside_box() {
        let tri = [
            DVec3::new(0.5, 0.5, 0.5),
            DVec3::new(5.0, 6.0, 7.0),
            DVec3::new(-4.0, 8.0, 2.0),
        ];
        assert!(tri_box_overlap(DVec3::ZERO, HALF, &tri));
    }

    #[test]
    fn test_large_triangle_spanning_box() {
        // No vertex inside, but the triangle slices straight through
        let tri = [
            DVec3::new(-10.0, 0.0, -10.0),
            DVec3::new(10.0, 0.0, -10.0),
            DVec3::new(0.0, 0.0, 10.0),
        ];
        assert!(tri_box_overlap(DVec3::ZERO, HALF, &tri));
    }

    #[test]
    fn test_plane_misses_corner() {
        // Bounds overlap the box, but the plane x + y + z = 4 passes beyond the corner
        let tri = [
            DVec3::new(4.0, 0.0, 0.0),
            DVec3::new(0.0, 4.0, 0.0),
            DVec3::new(0.0, 0.0, 4.0),
        ];
        assert!(!tri_box_overlap(DVec3::ZERO, HALF, &tri));
    }

    #[test]
    fn test_edge_axis_separates() {
        // Beyond the (1, 1) corner in the z = 0 plane: bounds and plane
        // overlap, only the hypotenuse's cross product with Z separates
        let tri = [
            DVec3::new(2.0, 0.5, 0.0),
            DVec3::new(0.5, 2.0, 0.0),
            DVec3::new(2.0, 2.0, 0.0),
        ];
        assert!(!tri_box_overlap(DVec3::ZERO, HALF, &tri));
    }

    #[test]
    fn test_touching_face_counts() {
        let tri = [
            DVec3::new(1.0, -0.5, -0.5),
            DVec3::new(1.0, 0.5, -0.5),
            DVec3::new(1.0, 0.0, 0.5),
        ];
        assert!(tri_box_overlap(DVec3::ZERO, HALF, &tri));
    }
}
