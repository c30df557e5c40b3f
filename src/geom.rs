//! Shared geometry utilities.

use kurbo::{Point, Vec2};

/// Twice the signed area of a closed lattice polygon (shoelace formula).
///
/// The closing edge from the last point back to the first is implied.
pub fn lattice_area2(points: &[(i32, i32)]) -> i64 {
    let n = points.len();
    if n < 3 {
        return 0;
    }
    (0..n)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
        })
        .sum()
}

/// Even-odd containment of a point in a closed lattice polygon.
pub fn lattice_contains(points: &[(i32, i32)], p: Point) -> bool {
    let n = points.len();
    let mut inside = false;
    for i in 0..n {
        let (ax, ay) = (points[i].0 as f64, points[i].1 as f64);
        let (bx, by) = (points[(i + 1) % n].0 as f64, points[(i + 1) % n].1 as f64);
        if (ay > p.y) != (by > p.y) {
            let x = ax + (p.y - ay) * (bx - ax) / (by - ay);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Sign function for f64: -1, 0 or 1.
pub fn fsign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Twice the signed area of triangle (p0, p1, p2).
pub fn dpara(p0: Point, p1: Point, p2: Point) -> f64 {
    (p1 - p0).cross(p2 - p0)
}

/// Denominator of the alpha ratio: the max-norm distance scale of the
/// chord p0 → p2, using its direction snapped to the nearest diagonal.
pub fn ddenom(p0: Point, p2: Point) -> f64 {
    let rx = -fsign(p2.y - p0.y);
    let ry = fsign(p2.x - p0.x);
    ry * (p2.x - p0.x) - rx * (p2.y - p0.y)
}

/// Point at fraction `t` along a → b.
pub fn interval(t: f64, a: Point, b: Point) -> Point {
    a.lerp(b, t)
}

/// Unit vector, or `None` when the input has (almost) no length.
pub fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    if len < 1e-12 {
        None
    } else {
        Some(v / len)
    }
}
