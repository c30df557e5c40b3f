//! Closing segment lists into continuous paths.

use kurbo::Point;

use crate::path::{Path, Polarity, Segment};

/// Joints closer than this are coalesced; wider gaps get a closing line.
pub const JOINT_EPSILON: f64 = 1e-9;

/// Relative cross-product bound under which two lines count as collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;

/// Build a closed path from a cyclic segment list.
///
/// Every joint, including the one from the last segment back to the first,
/// ends up exact: the next segment's start is snapped onto the previous end
/// when the gap is at most [`JOINT_EPSILON`], otherwise a line bridging the
/// gap is inserted. Consecutive collinear lines are then merged, across the
/// seam as well.
pub fn assemble(
    segments: Vec<Segment>,
    polarity: Polarity,
    area: u64,
    parent: Option<usize>,
) -> Path {
    let segments = merge_collinear(close_gaps(segments));
    Path { polarity, area, parent, segments }
}

fn close_gaps(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len() + 1);
    for seg in segments {
        let seg = match out.last() {
            Some(prev) => {
                let end = prev.end();
                if end.distance(seg.start()) <= JOINT_EPSILON {
                    seg.with_start(end)
                } else {
                    tracing::debug!("assemble: bridging gap at {:?}", end);
                    out.push(Segment::Line { a: end, b: seg.start() });
                    seg
                }
            }
            None => seg,
        };
        out.push(seg);
    }

    // Seam.
    if let (Some(first), Some(last)) = (out.first().copied(), out.last().copied()) {
        let end = last.end();
        if end.distance(first.start()) <= JOINT_EPSILON {
            out[0] = first.with_start(end);
        } else {
            tracing::debug!("assemble: bridging seam at {:?}", end);
            out.push(Segment::Line { a: end, b: first.start() });
        }
    }
    out
}

fn merge_collinear(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        if let Some(prev) = out.last_mut() {
            if let Some(joined) = join_lines(*prev, seg) {
                *prev = joined;
                continue;
            }
        }
        out.push(seg);
    }

    if out.len() > 2 {
        if let Some(joined) = join_lines(out[out.len() - 1], out[0]) {
            out[0] = joined;
            out.pop();
        }
    }
    out
}

/// `first` followed by `second` as one line, if both are lines running in
/// the same direction.
fn join_lines(first: Segment, second: Segment) -> Option<Segment> {
    let (Segment::Line { a, b }, Segment::Line { a: b2, b: c }) = (first, second) else {
        return None;
    };
    if b != b2 || !same_direction(a, b, c) {
        return None;
    }
    Some(Segment::Line { a, b: c })
}

fn same_direction(a: Point, b: Point, c: Point) -> bool {
    let u = b - a;
    let v = c - b;
    let scale = u.hypot() * v.hypot();
    if scale == 0.0 {
        return false;
    }
    u.cross(v).abs() <= COLLINEAR_EPSILON * scale && u.dot(v) > 0.0
}
