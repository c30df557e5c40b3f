//! Optimal polygon approximation via dynamic programming.
//!
//! Given a closed pixel-edge contour, finds the polygon with the fewest
//! vertices whose edges stay within half a pixel of the original path,
//! e.g. a 200-point circle becomes about 20 vertices.
//!
//! ## Algorithm
//!
//! 1. **Prefix sums** (`calc_sums`): O(1) line-fit statistics for any
//!    sub-range of the path.
//! 2. **Longest straight subpath** (`calc_lon`): for each vertex, find
//!    the farthest reachable vertex where the path stays within ±0.5
//!    of a straight line (using constraint propagation).
//! 3. **DP optimal polygon** (`best_polygon`): among the polygons with the
//!    minimum number of segments, pick the one with the least line-fit
//!    penalty.
//! 4. **Vertex refinement** (`adjust_vertices`): shift each polygon vertex
//!    to the sub-pixel position that minimizes squared distance to the
//!    two adjacent best-fit lines (constrained to ±0.5 of the pixel corner).

use kurbo::{Point, Vec2};

use super::decompose::Contour;
use crate::error::TraceError;

/// Prefix sum accumulator for O(1) line-fit statistics.
#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    x: f64,
    y: f64,
    x2: f64,
    xy: f64,
    y2: f64,
}

/// Optimal polygon derived from a contour.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Indices into the contour's points: a strictly increasing cyclic
    /// subsequence starting at 0.
    pub indices: Vec<usize>,
    /// Sub-pixel refined vertex positions, one per index.
    pub vertices: Vec<Point>,
}

/// Compute the optimal polygon for a contour.
///
/// `index` is the contour's position in discovery order, used to report
/// a [`TraceError::DegenerateContour`] when fewer than 3 vertices result.
pub fn optimal_polygon(contour: &Contour, index: usize) -> Result<Polygon, TraceError> {
    let pt = &contour.points;
    let n = pt.len();
    let degenerate = TraceError::DegenerateContour { index, points: n };
    if n < 3 {
        return Err(degenerate);
    }

    let sums = calc_sums(pt);
    let lon = calc_lon(pt);
    let indices = best_polygon(pt, &lon, &sums);
    if indices.len() < 3 {
        return Err(degenerate);
    }
    let vertices = adjust_vertices(pt, &indices, &sums);

    Ok(Polygon { indices, vertices })
}

// ── Prefix sums ──────────────────────────────────────────

/// Prefix sums of x, y, x², xy, y² relative to the first point.
///
/// For any sub-range [i..j] the sums are `sums[j+1] - sums[i]`, plus
/// `sums[n]` per wrap-around for cyclic ranges.
fn calc_sums(pt: &[(i32, i32)]) -> Vec<Sums> {
    let n = pt.len();
    let (x0, y0) = pt[0];

    let mut sums = vec![Sums::default(); n + 1];
    for i in 0..n {
        let x = (pt[i].0 - x0) as f64;
        let y = (pt[i].1 - y0) as f64;
        sums[i + 1] = Sums {
            x: sums[i].x + x,
            y: sums[i].y + y,
            x2: sums[i].x2 + x * x,
            xy: sums[i].xy + x * y,
            y2: sums[i].y2 + y * y,
        };
    }
    sums
}

/// Sums over the cyclic point range [i..=j] with `i < n` and `i <= j`;
/// `j >= n` wraps past the start. Returns the sums and the point count.
fn range_sums(sums: &[Sums], i: usize, j: usize) -> (Sums, f64) {
    let n = sums.len() - 1;
    let r = (j / n) as f64;
    let jn = j % n;
    let s = Sums {
        x: sums[jn + 1].x - sums[i].x + r * sums[n].x,
        y: sums[jn + 1].y - sums[i].y + r * sums[n].y,
        x2: sums[jn + 1].x2 - sums[i].x2 + r * sums[n].x2,
        xy: sums[jn + 1].xy - sums[i].xy + r * sums[n].xy,
        y2: sums[jn + 1].y2 - sums[i].y2 + r * sums[n].y2,
    };
    (s, (j + 1 - i) as f64)
}

// ── Longest straight subpath ─────────────────────────────

/// For each vertex i, the farthest vertex reachable by a straight line
/// that stays within the half-pixel corridor around all intermediate
/// points.
///
/// ## Algorithm: constraint propagation
///
/// Starting from vertex `i`, walk forward through the corners of the path
/// while maintaining two constraint vectors that bound the directions a
/// line from `i` may take. Stop when:
/// 1. the path has moved in all 4 cardinal directions, or
/// 2. the current corner falls outside the corridor (cross products
///    against the two constraint vectors).
///
/// ### Direction index formula
///
/// ```text
///   (dx, dy) → (3 + 3*dx + dy) / 2
///   (-1,  0) → 0      ( 0, -1) → 1
///   ( 0,  1) → 2      ( 1,  0) → 3
/// ```
#[allow(clippy::needless_range_loop)]
fn calc_lon(pt: &[(i32, i32)]) -> Vec<usize> {
    let n = pt.len();

    // nc[i]: the next corner (change of both coordinates) after i.
    let mut nc = vec![0usize; n];
    {
        let mut k = 0usize;
        for i in (0..n).rev() {
            if pt[i].0 != pt[k].0 && pt[i].1 != pt[k].1 {
                k = i + 1;
            }
            nc[i] = k;
        }
    }

    let mut pivk = vec![0usize; n];

    for i in (0..n).rev() {
        let mut ct = [0i32; 4];
        let mut constraint = [(0i32, 0i32); 2];

        let i1 = (i + 1) % n;
        let dir0 = ((3 + 3 * (pt[i1].0 - pt[i].0) + (pt[i1].1 - pt[i].1)) / 2) as usize;
        ct[dir0] += 1;

        let mut k = nc[i];
        let mut k1 = i;

        pivk[i] = loop {
            let dir = ((3 + 3 * sign(pt[k].0 - pt[k1].0) + sign(pt[k].1 - pt[k1].1)) / 2) as usize;
            ct[dir] += 1;

            // All four directions: no straight line fits any more.
            if ct.iter().all(|&c| c != 0) {
                break k1;
            }

            let cur = (pt[k].0 - pt[i].0, pt[k].1 - pt[i].1);

            if xprod(constraint[0], cur) < 0 || xprod(constraint[1], cur) > 0 {
                break pivot_at_violation(pt, &constraint, k, k1, i);
            }

            // |cur| <= 1 imposes no constraint.
            if cur.0.abs() > 1 || cur.1.abs() > 1 {
                let off0 = (
                    cur.0 + if cur.1 >= 0 && (cur.1 > 0 || cur.0 < 0) { 1 } else { -1 },
                    cur.1 + if cur.0 <= 0 && (cur.0 < 0 || cur.1 < 0) { 1 } else { -1 },
                );
                if xprod(constraint[0], off0) >= 0 {
                    constraint[0] = off0;
                }

                let off1 = (
                    cur.0 + if cur.1 <= 0 && (cur.1 < 0 || cur.0 < 0) { 1 } else { -1 },
                    cur.1 + if cur.0 >= 0 && (cur.0 > 0 || cur.1 < 0) { 1 } else { -1 },
                );
                if xprod(constraint[1], off1) <= 0 {
                    constraint[1] = off1;
                }
            }

            k1 = k;
            k = nc[k1];
            if !cyclic(k, i, k1) {
                break pivot_at_violation(pt, &constraint, k, k1, i);
            }
        };
    }

    // lon[i]: the largest k such that for all i <= i' < k, i' < k <= pivk[i'].
    let mut lon = vec![0usize; n];
    let mut j = pivk[n - 1];
    lon[n - 1] = j;
    for i in (0..n - 1).rev() {
        if cyclic(i + 1, pivk[i], j) {
            j = pivk[i];
        }
        lon[i] = j;
    }

    let mut i = n - 1;
    while cyclic((i + 1) % n, j, lon[i]) {
        lon[i] = j;
        if i == 0 {
            break;
        }
        i -= 1;
    }

    lon
}

/// Last point along k1..k that still satisfies the constraint.
///
/// Finds the largest integer `j` with `a + j*b >= 0` and `c + j*d <= 0`,
/// using the bilinearity of the cross product.
fn pivot_at_violation(
    pt: &[(i32, i32)],
    constraint: &[(i32, i32); 2],
    k: usize,
    k1: usize,
    i: usize,
) -> usize {
    let n = pt.len();
    let dk = (sign(pt[k].0 - pt[k1].0), sign(pt[k].1 - pt[k1].1));
    let cur = (pt[k1].0 - pt[i].0, pt[k1].1 - pt[i].1);
    let a = xprod(constraint[0], cur);
    let b = xprod(constraint[0], dk);
    let c = xprod(constraint[1], cur);
    let d = xprod(constraint[1], dk);

    let mut j = i64::from(i32::MAX);
    if b < 0 {
        j = floordiv(a, -b);
    }
    if d > 0 {
        j = j.min(floordiv(-c, d));
    }
    (k1 as i64 + j).rem_euclid(n as i64) as usize
}

// ── Dynamic programming optimal polygon ──────────────────

/// Shortest path over admissible chords, returning polygon vertex indices.
///
/// First the minimum segment count `m` is found by a greedy forward walk
/// over the clipped longest-run table; then a DP over `penalty3` picks the
/// cheapest polygon with exactly `m` segments. Exact penalty ties go to the
/// lowest predecessor index.
#[allow(clippy::needless_range_loop)]
fn best_polygon(pt: &[(i32, i32)], lon: &[usize], sums: &[Sums]) -> Vec<usize> {
    let n = pt.len();

    // clip0[i]: farthest vertex reachable from i, non-cyclic.
    let mut clip0 = vec![0usize; n];
    for i in 0..n {
        let prev_i = (i + n - 1) % n;
        let mut c = (lon[prev_i] + n - 1) % n;
        if c == i {
            c = (i + 1) % n;
        }
        clip0[i] = if c < i { n } else { c };
    }

    // clip1[j]: earliest vertex from which j is reachable.
    let mut clip1 = vec![0usize; n + 1];
    {
        let mut j = 1usize;
        for i in 0..n {
            while j <= clip0[i] {
                clip1[j] = i;
                j += 1;
            }
        }
    }

    // seg0[j]: farthest vertex reachable from 0 with j segments.
    let mut seg0 = vec![0usize; n + 1];
    let m = {
        let mut i = 0usize;
        let mut j = 0usize;
        while i < n {
            seg0[j] = i;
            i = clip0[i];
            j += 1;
        }
        seg0[j] = n;
        j
    };

    // seg1[j]: earliest vertex from which n is reachable with m - j segments.
    let mut seg1 = vec![0usize; m + 1];
    {
        let mut i = n;
        for j in (1..=m).rev() {
            seg1[j] = i;
            i = clip1[i];
        }
    }

    let mut pen = vec![f64::INFINITY; n + 1];
    let mut prev = vec![0usize; n + 1];
    pen[0] = 0.0;

    for j in 1..=m {
        for i in seg1[j]..=seg0[j] {
            let mut best = f64::INFINITY;
            if clip1[i] <= seg0[j - 1] {
                for k in clip1[i]..=seg0[j - 1] {
                    if !pen[k].is_finite() {
                        continue;
                    }
                    let this = penalty3(pt, sums, k, i) + pen[k];
                    if this < best {
                        prev[i] = k;
                        best = this;
                    }
                }
            }
            pen[i] = best;
        }
    }

    let mut po = vec![0usize; m];
    let mut i = n;
    for j in (0..m).rev() {
        i = prev[i];
        po[j] = i;
    }
    po
}

/// Penalty for approximating path segment [i..j] with a straight line.
///
/// RMS-style distance of all points from the chord through pt[i] and
/// pt[j], computed in O(1) from prefix sums:
///
/// ```text
///   px, py  = midpoint of (pt[i], pt[j])
///   ex, ey  = chord normal: (-(j.y - i.y), j.x - i.x)
///   a       = E[x²] - 2·E[x]·px + px²
///   b       = E[xy] - E[x]·py - E[y]·px + px·py
///   c       = E[y²] - 2·E[y]·py + py²
///   penalty = sqrt(ex²·a + 2·ex·ey·b + ey²·c)
/// ```
fn penalty3(pt: &[(i32, i32)], sums: &[Sums], i: usize, j: usize) -> f64 {
    let n = pt.len();
    let jn = j % n;
    let (s, k) = range_sums(sums, i, j);

    let (x0, y0) = pt[0];
    let px = (pt[i].0 + pt[jn].0) as f64 / 2.0 - x0 as f64;
    let py = (pt[i].1 + pt[jn].1) as f64 / 2.0 - y0 as f64;
    let ey = (pt[jn].0 - pt[i].0) as f64;
    let ex = -(pt[jn].1 - pt[i].1) as f64;

    let a = (s.x2 - 2.0 * s.x * px) / k + px * px;
    let b = (s.xy - s.x * py - s.y * px) / k + px * py;
    let c = (s.y2 - 2.0 * s.y * py) / k + py * py;

    let q = ex * ex * a + 2.0 * ex * ey * b + ey * ey * c;
    q.max(0.0).sqrt()
}

// ── Vertex adjustment ────────────────────────────────────

type QuadForm = [[f64; 3]; 3];

/// Refine each polygon vertex to its optimal sub-pixel position.
///
/// Each polygon edge gets a best-fit line (`point_slope`), expressed as a
/// quadratic form Q with `dist²(x, y) = [x, y, 1] · Q · [x, y, 1]ᵀ`. Vertex
/// i minimizes the sum of the forms of its two edges; if the minimum lies
/// outside the unit square around the lattice corner, the minimum on that
/// square's boundary is taken instead.
fn adjust_vertices(pt: &[(i32, i32)], po: &[usize], sums: &[Sums]) -> Vec<Point> {
    let n = pt.len();
    let m = po.len();
    let (x0, y0) = pt[0];

    // Edge i runs from po[i] to po[i + 1] (cyclically).
    let q: Vec<QuadForm> = (0..m)
        .map(|i| {
            let j = po[(i + 1) % m];
            let j = (j + n - po[i]) % n + po[i];
            let (ctr, dir) = point_slope(sums, po[i], j);
            make_quadform(ctr, dir)
        })
        .collect();

    (0..m)
        .map(|i| {
            let s = Point::new((pt[po[i]].0 - x0) as f64, (pt[po[i]].1 - y0) as f64);
            let mut qf = add_quadform(&q[(i + m - 1) % m], &q[i]);
            let w = minimize(&mut qf, s);
            let v = if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
                w
            } else {
                constrain_to_box(&qf, s)
            };
            Point::new(v.x + x0 as f64, v.y + y0 as f64)
        })
        .collect()
}

/// Unconstrained minimum of a quadratic form.
///
/// When the two lines are parallel the form is singular; an orthogonal
/// axis through `s` is added until it is not.
fn minimize(q: &mut QuadForm, s: Point) -> Point {
    loop {
        let det = q[0][0] * q[1][1] - q[0][1] * q[1][0];
        if det != 0.0 {
            return Point::new(
                (-q[0][2] * q[1][1] + q[1][2] * q[0][1]) / det,
                (q[0][2] * q[1][0] - q[1][2] * q[0][0]) / det,
            );
        }
        let (v0, v1) = if q[0][0] > q[1][1] {
            (-q[0][1], q[0][0])
        } else if q[1][1] != 0.0 {
            (-q[1][1], q[1][0])
        } else {
            (1.0, 0.0)
        };
        let d = v0 * v0 + v1 * v1;
        let v = [v0, v1, -v1 * s.y - v0 * s.x];
        for l in 0..3 {
            for k in 0..3 {
                q[l][k] += v[l] * v[k] / d;
            }
        }
    }
}

/// Best-fit line through the cyclic point range [a..=b].
///
/// Returns (centroid relative to pt[0], unit direction). The direction is
/// the eigenvector of the 2×2 covariance matrix for its largest eigenvalue,
/// or zero when the eigenvalues coincide.
fn point_slope(sums: &[Sums], a: usize, b: usize) -> (Point, Vec2) {
    let (s, k) = range_sums(sums, a, b);
    let ctr = Point::new(s.x / k, s.y / k);

    let a_cov = (s.x2 - s.x * s.x / k) / k;
    let b_cov = (s.xy - s.x * s.y / k) / k;
    let c_cov = (s.y2 - s.y * s.y / k) / k;

    let lambda2 = (a_cov + c_cov + ((a_cov - c_cov).powi(2) + 4.0 * b_cov * b_cov).sqrt()) / 2.0;
    let a2 = a_cov - lambda2;
    let c2 = c_cov - lambda2;

    let dir = if a2.abs() >= c2.abs() {
        let len = (a2 * a2 + b_cov * b_cov).sqrt();
        if len != 0.0 {
            Vec2::new(-b_cov / len, a2 / len)
        } else {
            Vec2::ZERO
        }
    } else {
        let len = (c2 * c2 + b_cov * b_cov).sqrt();
        if len != 0.0 {
            Vec2::new(-c2 / len, b_cov / len)
        } else {
            Vec2::ZERO
        }
    };

    (ctr, dir)
}

/// Quadratic form of the squared distance from the line through `ctr`
/// along `dir`. Zero for a degenerate direction.
fn make_quadform(ctr: Point, dir: Vec2) -> QuadForm {
    let d = dir.hypot2();
    if d == 0.0 {
        return [[0.0; 3]; 3];
    }
    let v = [dir.y, -dir.x, dir.x * ctr.y - dir.y * ctr.x];
    let mut q = [[0.0f64; 3]; 3];
    for l in 0..3 {
        for k in 0..3 {
            q[l][k] = v[l] * v[k] / d;
        }
    }
    q
}

fn add_quadform(a: &QuadForm, b: &QuadForm) -> QuadForm {
    let mut q = [[0.0f64; 3]; 3];
    for l in 0..3 {
        for k in 0..3 {
            q[l][k] = a[l][k] + b[l][k];
        }
    }
    q
}

/// [x, y, 1] · Q · [x, y, 1]ᵀ
fn eval_quadform(q: &QuadForm, p: Point) -> f64 {
    let v = [p.x, p.y, 1.0];
    let mut sum = 0.0;
    for l in 0..3 {
        for k in 0..3 {
            sum += v[l] * q[l][k] * v[k];
        }
    }
    sum
}

/// Minimum of the quadratic form on the boundary of the unit square
/// centered at `s`.
fn constrain_to_box(q: &QuadForm, s: Point) -> Point {
    let mut best = s;
    let mut best_val = eval_quadform(q, s);
    let mut check = |w: Point| {
        let v = eval_quadform(q, w);
        if v < best_val {
            best_val = v;
            best = w;
        }
    };

    // Horizontal edges: fix y, optimal x = -(q01·y + q02) / q00.
    if q[0][0] != 0.0 {
        for z in 0..2 {
            let y = s.y - 0.5 + z as f64;
            let x = -(q[0][1] * y + q[0][2]) / q[0][0];
            if (x - s.x).abs() <= 0.5 {
                check(Point::new(x, y));
            }
        }
    }
    // Vertical edges: fix x, optimal y = -(q10·x + q12) / q11.
    if q[1][1] != 0.0 {
        for z in 0..2 {
            let x = s.x - 0.5 + z as f64;
            let y = -(q[1][0] * x + q[1][2]) / q[1][1];
            if (y - s.y).abs() <= 0.5 {
                check(Point::new(x, y));
            }
        }
    }
    for l in 0..2 {
        for k in 0..2 {
            check(Point::new(s.x - 0.5 + l as f64, s.y - 0.5 + k as f64));
        }
    }

    best
}

// ── Helpers ──────────────────────────────────────────────

/// Integer cross product.
fn xprod(a: (i32, i32), b: (i32, i32)) -> i64 {
    a.0 as i64 * b.1 as i64 - a.1 as i64 * b.0 as i64
}

fn sign(x: i32) -> i32 {
    x.signum()
}

/// Floor division (rounds toward negative infinity), b > 0.
fn floordiv(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

/// True if b lies in the cyclic interval [a, c).
fn cyclic(a: usize, b: usize, c: usize) -> bool {
    if a <= c {
        a <= b && b < c
    } else {
        a <= b || b < c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::config::TurnPolicy;
    use crate::path::Polarity;
    use crate::vectorize::decompose::decompose;
    use approx::assert_abs_diff_eq;

    fn rectangle(w: i32, h: i32) -> Contour {
        // Clockwise on screen from the top-left corner: down, right, up, left.
        let mut points = Vec::new();
        for y in 0..h {
            points.push((0, y));
        }
        for x in 0..w {
            points.push((x, h));
        }
        for y in (1..=h).rev() {
            points.push((w, y));
        }
        for x in (1..=w).rev() {
            points.push((x, 0));
        }
        Contour { points, polarity: Polarity::Outer, area: (w * h) as u64, parent: None }
    }

    #[test]
    fn rectangle_produces_its_4_corners() {
        let contour = rectangle(10, 6);
        let poly = optimal_polygon(&contour, 0).unwrap();
        assert_eq!(poly.indices, vec![0, 6, 16, 22]);
        let expected = [(0.0, 0.0), (0.0, 6.0), (10.0, 6.0), (10.0, 0.0)];
        for (v, e) in poly.vertices.iter().zip(expected) {
            assert_abs_diff_eq!(v.x, e.0, epsilon = 1e-9);
            assert_abs_diff_eq!(v.y, e.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn indices_are_a_cyclic_subsequence() {
        let rows = [
            "....####....",
            "..########..",
            ".##########.",
            "############",
            "############",
            ".##########.",
            "..########..",
            "....####....",
        ];
        let contours = decompose(&Bitmap::from_rows(&rows).unwrap(), TurnPolicy::Minority, 0);
        let poly = optimal_polygon(&contours[0], 0).unwrap();
        assert!(poly.indices.len() >= 4);
        assert_eq!(poly.indices[0], 0);
        assert!(poly.indices.windows(2).all(|w| w[0] < w[1]));
        assert!(*poly.indices.last().unwrap() < contours[0].points.len());
        for (&i, v) in poly.indices.iter().zip(&poly.vertices) {
            let (x, y) = contours[0].points[i];
            assert!((v.x - x as f64).abs() <= 0.5 + 1e-12);
            assert!((v.y - y as f64).abs() <= 0.5 + 1e-12);
        }
    }

    #[test]
    fn too_short_contour_is_degenerate() {
        let contour = Contour {
            points: vec![(0, 0), (0, 1)],
            polarity: Polarity::Outer,
            area: 0,
            parent: None,
        };
        assert!(matches!(
            optimal_polygon(&contour, 3),
            Err(TraceError::DegenerateContour { index: 3, points: 2 })
        ));
    }

    #[test]
    fn penalty_is_zero_on_a_straight_run() {
        let contour = rectangle(8, 8);
        let sums = calc_sums(&contour.points);
        assert_abs_diff_eq!(penalty3(&contour.points, &sums, 0, 8), 0.0, epsilon = 1e-9);
        assert!(penalty3(&contour.points, &sums, 0, 12) > 0.0);
    }

    #[test]
    fn cyclic_interval() {
        assert!(cyclic(2, 3, 5));
        assert!(!cyclic(2, 5, 5));
        assert!(cyclic(5, 0, 2));
        assert!(cyclic(5, 6, 2));
        assert!(!cyclic(5, 3, 2));
    }
}
