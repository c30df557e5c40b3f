//! Traced outline geometry: segments, closed paths and path sets.
//!
//! Everything is in source pixel space: origin at the top-left corner of
//! the image, x to the right, y down. Consumers apply their own flip,
//! scaling or unit conversion (see [`PathSet::to_bezpaths`]).

use kurbo::{Affine, BezPath, CubicBez, Line, ParamCurve, PathSeg, Point};

/// Whether a path bounds a foreground region or a hole inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Outer,
    Hole,
}

impl Polarity {
    /// +1 for outer boundaries, -1 for holes.
    pub fn sign(self) -> i8 {
        match self {
            Polarity::Outer => 1,
            Polarity::Hole => -1,
        }
    }
}

/// Kind tag of a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Line,
    Curve,
}

/// One piece of an outline: a straight line or a cubic Bezier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line { a: Point, b: Point },
    Curve { a: Point, c1: Point, c2: Point, b: Point },
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::Line { .. } => SegmentKind::Line,
            Segment::Curve { .. } => SegmentKind::Curve,
        }
    }

    pub fn start(&self) -> Point {
        match *self {
            Segment::Line { a, .. } | Segment::Curve { a, .. } => a,
        }
    }

    pub fn end(&self) -> Point {
        match *self {
            Segment::Line { b, .. } | Segment::Curve { b, .. } => b,
        }
    }

    /// All control points in order: 2 for a line, 4 for a curve.
    pub fn points(&self) -> Vec<Point> {
        match *self {
            Segment::Line { a, b } => vec![a, b],
            Segment::Curve { a, c1, c2, b } => vec![a, c1, c2, b],
        }
    }

    pub(crate) fn with_start(self, p: Point) -> Segment {
        match self {
            Segment::Line { b, .. } => Segment::Line { a: p, b },
            Segment::Curve { c1, c2, b, .. } => Segment::Curve { a: p, c1, c2, b },
        }
    }

    /// Evaluate the segment at parameter `t` in [0, 1].
    pub fn eval(&self, t: f64) -> Point {
        self.to_path_seg().eval(t)
    }

    pub fn to_path_seg(&self) -> PathSeg {
        match *self {
            Segment::Line { a, b } => PathSeg::Line(Line::new(a, b)),
            Segment::Curve { a, c1, c2, b } => PathSeg::Cubic(CubicBez::new(a, c1, c2, b)),
        }
    }
}

/// One closed outline. Owns its segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub polarity: Polarity,
    /// Number of pixels enclosed by the source contour.
    pub area: u64,
    /// Index (within the same [`PathSet`]) of the innermost enclosing path.
    pub parent: Option<usize>,
    /// Cyclic: the last segment ends where the first begins.
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn count(&self, kind: SegmentKind) -> usize {
        self.segments.iter().filter(|s| s.kind() == kind).count()
    }

    /// Closed kurbo path (MoveTo, LineTo/CurveTo…, ClosePath).
    pub fn to_bezpath(&self) -> BezPath {
        let mut path = BezPath::new();
        let Some(first) = self.segments.first() else {
            return path;
        };
        path.move_to(first.start());
        for seg in &self.segments {
            match *seg {
                Segment::Line { b, .. } => path.line_to(b),
                Segment::Curve { c1, c2, b, .. } => path.curve_to(c1, c2, b),
            }
        }
        path.close_path();
        path
    }
}

/// Ordered result of one tracing run, in contour discovery (raster) order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathSet {
    pub paths: Vec<Path>,
}

impl PathSet {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Path> {
        self.paths.iter()
    }

    /// Total (curves, lines) over all paths.
    pub fn segment_counts(&self) -> (usize, usize) {
        self.paths.iter().fold((0, 0), |(c, l), p| {
            (c + p.count(SegmentKind::Curve), l + p.count(SegmentKind::Line))
        })
    }

    /// Prepend the image frame `(0,0)-(width,height)` as path 0.
    ///
    /// Caller policy for consumers that treat the first path as a border:
    /// parents of the traced paths shift by one, top-level paths get the
    /// border as parent.
    pub fn with_border(self, width: u32, height: u32) -> PathSet {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(0.0, h),
            Point::new(w, h),
            Point::new(w, 0.0),
        ];
        let border = Path {
            polarity: Polarity::Outer,
            area: width as u64 * height as u64,
            parent: None,
            segments: (0..4)
                .map(|i| Segment::Line { a: corners[i], b: corners[(i + 1) % 4] })
                .collect(),
        };
        let mut paths = Vec::with_capacity(self.paths.len() + 1);
        paths.push(border);
        paths.extend(self.paths.into_iter().map(|mut p| {
            p.parent = Some(p.parent.map_or(0, |i| i + 1));
            p
        }));
        PathSet { paths }
    }

    /// Kurbo paths with `transform` applied (e.g. scale to document units,
    /// flip y). Order is preserved.
    pub fn to_bezpaths(&self, transform: Affine) -> Vec<BezPath> {
        self.paths
            .iter()
            .map(|p| {
                let mut bez = p.to_bezpath();
                bez.apply_affine(transform);
                bez
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}
