//! Greedy tolerance-bounded merging of consecutive curve segments.
//!
//! Runs of smooth curves are joined into fewer, longer cubics. A candidate
//! span keeps its outer endpoints and end tangents; only the two handle
//! lengths are solved for. Spans grow one segment at a time and are
//! committed on the first failure, so each restart window is linear in the
//! number of segments it covers.

use kurbo::{CubicBez, ParamCurve, ParamCurveDeriv, ParamCurveNearest, Point, Vec2};

use crate::geom::unit;
use crate::path::{Segment, SegmentKind};

/// Sample points taken from each constituent segment (excluding its start).
const SAMPLES_PER_SEGMENT: usize = 8;

/// Accuracy passed to the nearest-point query.
const NEAREST_ACCURACY: f64 = 1e-9;

/// Merge runs of curves in a closed segment list.
///
/// Lines are passed through. Every merged curve deviates from the segments
/// it replaces by at most `opt_tolerance` at the sampled points.
pub fn optimize(segments: Vec<Segment>, opt_tolerance: f64) -> Vec<Segment> {
    let n = segments.len();
    if n < 2 {
        return segments;
    }

    // Start right after a line so no curve run straddles the seam.
    let start = (0..n)
        .find(|&i| {
            segments[(i + n - 1) % n].kind() == SegmentKind::Line
                && segments[i].kind() == SegmentKind::Curve
        })
        .unwrap_or(0);
    let mut segs = segments;
    segs.rotate_left(start);

    let mut out = Vec::with_capacity(n);
    let mut i = 0;
    while i < n {
        if segs[i].kind() == SegmentKind::Line {
            out.push(segs[i]);
            i += 1;
            continue;
        }

        let mut committed: Option<(usize, Segment)> = None;
        let mut span = Span::new(&segs[i]);
        let mut j = i + 1;
        while j < n && segs[j].kind() == SegmentKind::Curve {
            if !span.extend(&segs[j]) {
                tracing::trace!("merge: span {}..={} not admissible", i, j);
                break;
            }
            match fit_span(&segs[i..=j], opt_tolerance) {
                Some(merged) => committed = Some((j + 1, merged)),
                None => {
                    tracing::trace!("merge: span {}..={} exceeds tolerance", i, j);
                    break;
                }
            }
            j += 1;
        }

        match committed {
            Some((next, merged)) => {
                tracing::trace!("merge: {} curves → 1", next - i);
                out.push(merged);
                i = next;
            }
            // Even the two-segment span failed: keep the segment as it is.
            None => {
                out.push(segs[i]);
                i += 1;
            }
        }
    }
    out
}

/// Running admissibility state of a candidate span.
///
/// A span may only contain turns of one sign, and its total turning must
/// stay below half a revolution.
struct Span {
    direction: f64,
    total: f64,
    tangent: Vec2,
}

impl Span {
    fn new(first: &Segment) -> Self {
        let (d0, d1) = end_tangents(first);
        let mut span = Span { direction: 0.0, total: 0.0, tangent: d0 };
        span.turn(d1);
        span
    }

    /// Add the next segment. False if the span stops being admissible.
    fn extend(&mut self, seg: &Segment) -> bool {
        let (d0, d1) = end_tangents(seg);
        self.turn(d0) && self.turn(d1)
    }

    fn turn(&mut self, to: Vec2) -> bool {
        let angle = self.tangent.cross(to).atan2(self.tangent.dot(to));
        self.tangent = to;
        if angle != 0.0 {
            let sign = angle.signum();
            if self.direction == 0.0 {
                self.direction = sign;
            } else if sign != self.direction {
                return false;
            }
        }
        self.total += angle.abs();
        self.total < std::f64::consts::PI
    }
}

/// Start and end tangents of a segment (not normalized).
fn end_tangents(seg: &Segment) -> (Vec2, Vec2) {
    match *seg {
        Segment::Line { a, b } => (b - a, b - a),
        Segment::Curve { a, c1, c2, b } => {
            let d0 = if c1 != a { c1 - a } else { c2 - a };
            let d1 = if b != c2 { b - c2 } else { b - c1 };
            (d0, d1)
        }
    }
}

/// Fit one cubic to a run of segments, or `None` if no cubic with the
/// run's end tangents stays within `tolerance`.
fn fit_span(run: &[Segment], tolerance: f64) -> Option<Segment> {
    let first = run.first()?;
    let last = run.last()?;
    let p0 = first.start();
    let p3 = last.end();
    let d0 = unit(end_tangents(first).0)?;
    let d3 = unit(end_tangents(last).1)?;

    let samples = sample_run(run);
    let mut params = chord_length_params(&samples)?;

    let (alpha, beta) = solve_handles(p0, d0, p3, d3, &samples, &params)?;
    let cubic = constrained_cubic(p0, d0, p3, d3, alpha, beta);
    reparameterize(&cubic, &samples, &mut params);
    let (alpha, beta) = solve_handles(p0, d0, p3, d3, &samples, &params)?;
    let cubic = constrained_cubic(p0, d0, p3, d3, alpha, beta);

    if max_error(&cubic, &samples) > tolerance {
        return None;
    }
    Some(Segment::Curve { a: cubic.p0, c1: cubic.p1, c2: cubic.p2, b: cubic.p3 })
}

/// P1 = p0 + alpha * d0, P2 = p3 - beta * d3.
fn constrained_cubic(p0: Point, d0: Vec2, p3: Point, d3: Vec2, alpha: f64, beta: f64) -> CubicBez {
    CubicBez::new(p0, p0 + d0 * alpha, p3 - d3 * beta, p3)
}

/// Points along the run: its start, then evenly in parameter per segment.
fn sample_run(run: &[Segment]) -> Vec<Point> {
    let mut samples = Vec::with_capacity(run.len() * SAMPLES_PER_SEGMENT + 1);
    samples.push(run[0].start());
    for seg in run {
        for k in 1..=SAMPLES_PER_SEGMENT {
            samples.push(seg.eval(k as f64 / SAMPLES_PER_SEGMENT as f64));
        }
    }
    samples
}

/// Cumulative chord length, normalized to [0, 1].
fn chord_length_params(samples: &[Point]) -> Option<Vec<f64>> {
    let mut u = Vec::with_capacity(samples.len());
    let mut acc = 0.0;
    u.push(0.0);
    for w in samples.windows(2) {
        acc += w[0].distance(w[1]);
        u.push(acc);
    }
    if acc <= 0.0 {
        return None;
    }
    Some(u.into_iter().map(|d| d / acc).collect())
}

/// Least-squares handle lengths for fixed endpoints and tangents.
///
/// Minimizes `Σ |B(u_i) - s_i|²` over (alpha, beta), a 2×2 linear system.
/// Handles that come out non-positive are rejected.
fn solve_handles(
    p0: Point,
    d0: Vec2,
    p3: Point,
    d3: Vec2,
    samples: &[Point],
    params: &[f64],
) -> Option<(f64, f64)> {
    let mut c = [[0.0f64; 2]; 2];
    let mut x = [0.0f64; 2];

    for (&s, &u) in samples.iter().zip(params) {
        let mu = 1.0 - u;
        let b0 = mu * mu * mu;
        let b1 = 3.0 * u * mu * mu;
        let b2 = 3.0 * u * u * mu;
        let b3 = u * u * u;

        let a1 = d0 * b1;
        let a2 = -d3 * b2;
        c[0][0] += a1.dot(a1);
        c[0][1] += a1.dot(a2);
        c[1][1] += a2.dot(a2);

        let base = p0.to_vec2() * (b0 + b1) + p3.to_vec2() * (b2 + b3);
        let rest = s.to_vec2() - base;
        x[0] += a1.dot(rest);
        x[1] += a2.dot(rest);
    }
    c[1][0] = c[0][1];

    let det = c[0][0] * c[1][1] - c[0][1] * c[1][0];
    if det.abs() < 1e-12 {
        return None;
    }
    let alpha = (x[0] * c[1][1] - x[1] * c[0][1]) / det;
    let beta = (c[0][0] * x[1] - c[1][0] * x[0]) / det;
    if !(alpha > 0.0 && beta > 0.0) {
        return None;
    }
    Some((alpha, beta))
}

/// One Newton-Raphson step on each sample's parameter, moving it toward
/// the closest point of `cubic`.
fn reparameterize(cubic: &CubicBez, samples: &[Point], params: &mut [f64]) {
    let d1 = cubic.deriv();
    let d2 = d1.deriv();
    for (s, u) in samples.iter().zip(params.iter_mut()) {
        let diff = cubic.eval(*u) - *s;
        let q1 = d1.eval(*u).to_vec2();
        let q2 = d2.eval(*u).to_vec2();
        let numerator = diff.dot(q1);
        let denominator = q1.dot(q1) + diff.dot(q2);
        if denominator.abs() > 1e-12 {
            *u = (*u - numerator / denominator).clamp(0.0, 1.0);
        }
    }
}

/// Max distance from any sample to the nearest point on the cubic.
fn max_error(cubic: &CubicBez, samples: &[Point]) -> f64 {
    samples
        .iter()
        .map(|&s| cubic.nearest(s, NEAREST_ACCURACY).distance_sq)
        .fold(0.0f64, f64::max)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorize::curve::fit;
    use crate::vectorize::polygon::Polygon;

    /// Regular polygon approximating a circle, as smooth curves.
    fn circle_segments(vertices: usize, radius: f64) -> Vec<Segment> {
        let points: Vec<Point> = (0..vertices)
            .map(|i| {
                let t = i as f64 * std::f64::consts::TAU / vertices as f64;
                Point::new(50.0 + radius * t.cos(), 50.0 + radius * t.sin())
            })
            .collect();
        let polygon = Polygon { indices: (0..vertices).collect(), vertices: points };
        fit(&polygon, 1.0)
    }

    fn distance_to(segments: &[Segment], p: Point) -> f64 {
        segments
            .iter()
            .map(|s| s.to_path_seg().nearest(p, NEAREST_ACCURACY).distance_sq.sqrt())
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn circle_curves_merge() {
        let segs = circle_segments(24, 30.0);
        assert!(segs.iter().all(|s| s.kind() == SegmentKind::Curve));
        let merged = optimize(segs.clone(), 0.2);
        assert!(merged.len() < segs.len());
        // Half-turn limit: a full circle needs at least three spans.
        assert!(merged.len() >= 3);
    }

    #[test]
    fn merged_curves_stay_within_tolerance() {
        let segs = circle_segments(24, 30.0);
        let tolerance = 0.2;
        let merged = optimize(segs.clone(), tolerance);
        for seg in &segs {
            for k in 0..=SAMPLES_PER_SEGMENT {
                let p = seg.eval(k as f64 / SAMPLES_PER_SEGMENT as f64);
                assert!(distance_to(&merged, p) <= tolerance + 1e-9);
            }
        }
    }

    #[test]
    fn merged_path_stays_continuous() {
        let merged = optimize(circle_segments(24, 30.0), 0.2);
        let n = merged.len();
        for i in 0..n {
            assert_eq!(merged[i].end(), merged[(i + 1) % n].start());
        }
    }

    #[test]
    fn larger_tolerance_never_adds_segments() {
        let segs = circle_segments(32, 40.0);
        let counts: Vec<usize> = [0.01, 0.05, 0.2, 0.5, 1.0]
            .iter()
            .map(|&t| optimize(segs.clone(), t).len())
            .collect();
        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{:?}", counts);
    }

    #[test]
    fn lines_pass_through_untouched() {
        let square = Polygon {
            indices: vec![0, 1, 2, 3],
            vertices: vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 4.0),
                Point::new(4.0, 4.0),
                Point::new(4.0, 0.0),
            ],
        };
        let segs = fit(&square, 1.0);
        assert_eq!(optimize(segs.clone(), 1.0), segs);
    }

    #[test]
    fn opposite_turns_are_not_merged() {
        let s_curve = [
            Segment::Curve {
                a: Point::new(0.0, 0.0),
                c1: Point::new(1.0, 1.0),
                c2: Point::new(2.0, 1.0),
                b: Point::new(3.0, 1.0),
            },
            Segment::Curve {
                a: Point::new(3.0, 1.0),
                c1: Point::new(4.0, 1.0),
                c2: Point::new(5.0, 1.0),
                b: Point::new(6.0, 0.0),
            },
            Segment::Curve {
                a: Point::new(6.0, 0.0),
                c1: Point::new(7.0, -1.0),
                c2: Point::new(8.0, -1.0),
                b: Point::new(9.0, -1.0),
            },
        ];
        let mut span = Span::new(&s_curve[0]);
        assert!(span.extend(&s_curve[1]));
        assert!(!span.extend(&s_curve[2]));
    }
}
