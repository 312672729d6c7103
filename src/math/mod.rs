/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Tolerance used by the contour coplanarity predicate.
///
/// Both the parallel-normal check and the in-plane displacement check
/// compare their dot products against this bound.
pub const COPLANARITY_TOLERANCE: f64 = 1e-3;

/// Computes the normal of a planar point loop using Newell's method.
///
/// The result is normalized when the loop spans a non-degenerate area;
/// degenerate loops (fewer than three points, or collinear points) yield
/// the raw Newell vector, which may be zero. Callers are expected to
/// supply valid closed polygon loops.
#[must_use]
pub fn polygon_normal(points: &[Point3]) -> Vector3 {
    let n = points.len();
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    if n < 3 {
        return normal;
    }
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    let len = normal.norm();
    if len > TOLERANCE {
        normal /= len;
    }
    normal
}
