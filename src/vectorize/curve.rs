//! Corner detection and Bezier generation from an optimal polygon.
//!
//! Every polygon vertex becomes either a sharp corner (two lines meeting at
//! the vertex) or one cubic Bezier running from the midpoint of the incoming
//! edge to the midpoint of the outgoing edge. Neighbouring segments share
//! those midpoints exactly, and smooth segments are tangent-continuous there.

use kurbo::Point;

use super::polygon::Polygon;
use crate::geom::{ddenom, dpara, interval};
use crate::path::Segment;

/// Alpha assigned when the chord between the neighbours has no extent.
const ALPHA_DEGENERATE: f64 = 4.0 / 3.0;

/// Control-point alpha is clamped to this range for smooth vertices.
const ALPHA_MIN: f64 = 0.55;
const ALPHA_MAX: f64 = 1.0;

/// Convert a polygon into segments, classifying each vertex.
///
/// Vertex j is a corner when `alpha(j) >= corner_threshold`; a threshold
/// of 0 makes every vertex a corner, 4/3 none. Segments are emitted in
/// vertex order starting with vertex 0, so the first segment starts at the
/// midpoint of the closing edge.
pub fn fit(polygon: &Polygon, corner_threshold: f64) -> Vec<Segment> {
    let v = &polygon.vertices;
    let m = v.len();
    if m < 3 {
        return Vec::new();
    }

    // mid[j] lies on edge j → j+1; computed once so joints match bit for bit.
    let mid: Vec<Point> = (0..m).map(|j| v[j].midpoint(v[(j + 1) % m])).collect();

    let mut segments = Vec::with_capacity(2 * m);
    for j in 0..m {
        let i = (j + m - 1) % m;
        let k = (j + 1) % m;
        let start = mid[i];
        let end = mid[j];

        let a = alpha(v[i], v[j], v[k]);
        if a >= corner_threshold {
            segments.push(Segment::Line { a: start, b: v[j] });
            segments.push(Segment::Line { a: v[j], b: end });
        } else {
            let a = a.clamp(ALPHA_MIN, ALPHA_MAX);
            let t = 0.5 + 0.5 * a;
            segments.push(Segment::Curve {
                a: start,
                c1: interval(t, v[i], v[j]),
                c2: interval(t, v[k], v[j]),
                b: end,
            });
        }
    }
    segments
}

/// Smoothness of vertex `vj` between neighbours `vi` and `vk`.
///
/// Ratio of the vertex's distance from the chord vi → vk to the max-norm
/// extent of that chord, mapped so that 0 is a straight continuation and
/// 4/3 the sharpest possible turn:
///
/// ```text
///   dd    = |dpara(vi, vj, vk) / ddenom(vi, vk)|
///   alpha = (1 - 1/dd) / 0.75      (dd > 1)
///         = 0                      (dd <= 1)
/// ```
pub fn alpha(vi: Point, vj: Point, vk: Point) -> f64 {
    let denom = ddenom(vi, vk);
    if denom == 0.0 {
        return ALPHA_DEGENERATE;
    }
    let dd = (dpara(vi, vj, vk) / denom).abs();
    let alpha = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
    alpha / 0.75
}
