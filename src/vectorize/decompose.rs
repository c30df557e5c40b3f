//! Pixel-edge contour extraction on the dual grid.
//!
//! Contours are traced on the pixel-corner grid (between pixels) rather
//! than through pixel centers. Uses XOR fill on a private working copy to
//! mark traced regions and to expose holes as traceable regions.

use kurbo::Point;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::bitmap::Bitmap;
use crate::config::TurnPolicy;
use crate::geom::{lattice_area2, lattice_contains};
use crate::path::Polarity;

/// A closed boundary on the pixel-corner grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    /// Lattice points in pixel-corner coordinates (y down). Consecutive
    /// points are one unit step apart, and so are the last and the first.
    pub points: Vec<(i32, i32)>,
    pub polarity: Polarity,
    /// Number of enclosed pixels.
    pub area: u64,
    /// Index of the innermost enclosing contour in the returned list.
    pub parent: Option<usize>,
}

/// Working bitmap for contour tracing.
///
/// Stores the grid with y-up coordinates (y=0 at the bottom row) so the
/// walk rules below read the same as the classic formulation.
#[derive(Clone)]
struct WorkBitmap {
    data: Vec<bool>,
    width: i32,
    height: i32,
}

impl WorkBitmap {
    fn from_bitmap(bm: &Bitmap) -> Self {
        let width = bm.width() as i32;
        let height = bm.height() as i32;
        let mut data = vec![false; width as usize * height as usize];
        for iy in 0..height {
            let py = height - 1 - iy;
            for ix in 0..width {
                data[(py * width + ix) as usize] = bm.get(ix, iy);
            }
        }
        WorkBitmap { data, width, height }
    }

    /// Pixel at (x, y) in y-up coordinates. Out-of-bounds = false.
    fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return false;
        }
        self.data[(y * self.width + x) as usize]
    }

    /// XOR all pixels in row y from column x to the right edge.
    fn xor_row_from(&mut self, x: i32, y: i32) {
        if y < 0 || y >= self.height {
            return;
        }
        let row = (y * self.width) as usize;
        for xi in x.max(0)..self.width {
            self.data[row + xi as usize] ^= true;
        }
    }
}

/// Resolves ambiguous corners according to the turn policy.
struct TieBreak {
    policy: TurnPolicy,
    rng: Option<ChaCha8Rng>,
}

impl TieBreak {
    fn new(policy: TurnPolicy) -> Self {
        let rng = match policy {
            TurnPolicy::Random { seed } => Some(ChaCha8Rng::seed_from_u64(seed)),
            _ => None,
        };
        TieBreak { policy, rng }
    }

    /// True if the walk should turn right at the ambiguous corner (x, y).
    fn turn_right(&mut self, bm: &WorkBitmap, x: i32, y: i32, polarity: Polarity) -> bool {
        match self.policy {
            TurnPolicy::Right => true,
            TurnPolicy::Left => false,
            TurnPolicy::Black => polarity == Polarity::Outer,
            TurnPolicy::White => polarity == Polarity::Hole,
            TurnPolicy::Majority => majority(bm, x, y),
            TurnPolicy::Minority => !majority(bm, x, y),
            TurnPolicy::Random { .. } => match self.rng.as_mut() {
                Some(rng) => rng.gen_bool(0.5),
                None => true,
            },
        }
    }
}

/// Extract closed contours from a bitmap on the dual (pixel-corner) grid.
///
/// Scans rows top to bottom, left to right, traces each boundary, and XORs
/// its interior. Contours enclosing fewer than `speckle_area_min` pixels
/// are dropped; dropping one never alters the others.
pub fn decompose(bitmap: &Bitmap, policy: TurnPolicy, speckle_area_min: u32) -> Vec<Contour> {
    let orig = WorkBitmap::from_bitmap(bitmap);
    let mut bm = orig.clone();
    let mut tiebreak = TieBreak::new(policy);
    let mut contours = Vec::new();
    let mut speckles = 0usize;

    // Top image row is y = height - 1 in the working frame.
    for y in (0..bm.height).rev() {
        for x in 0..bm.width {
            if !bm.get(x, y) {
                continue;
            }
            // A set pixel that is background in the original lies inside a
            // region inverted by an enclosing contour: a hole.
            let polarity = if orig.get(x, y) {
                Polarity::Outer
            } else {
                Polarity::Hole
            };
            let walk = find_path(&bm, x, y + 1, polarity, &mut tiebreak);
            xor_fill(&mut bm, &walk);

            let area = lattice_area2(&walk).unsigned_abs() / 2;
            if area < speckle_area_min as u64 {
                speckles += 1;
                continue;
            }

            contours.push(Contour {
                points: to_image_frame(walk, bm.height, polarity),
                polarity,
                area,
                parent: None,
            });
        }
    }

    assign_parents(&mut contours);
    tracing::debug!(
        "decompose: {} contours, {} speckles filtered (policy {})",
        contours.len(),
        speckles,
        policy.name(),
    );
    contours
}

/// Trace one closed contour starting at lattice point (x0, y0), the
/// top-left corner of the first set pixel, heading down.
///
/// Follows the boundary keeping set pixels on the left.
fn find_path(
    bm: &WorkBitmap,
    x0: i32,
    y0: i32,
    polarity: Polarity,
    tiebreak: &mut TieBreak,
) -> Vec<(i32, i32)> {
    let mut points = Vec::new();
    let (mut x, mut y) = (x0, y0);
    let (mut dx, mut dy) = (0i32, -1i32);

    loop {
        points.push((x, y));
        x += dx;
        y += dy;
        if x == x0 && y == y0 {
            break;
        }

        // The two pixels ahead of the current corner:
        //
        //   c = pixel ahead and to the RIGHT of the direction of travel
        //   d = pixel ahead and to the LEFT
        //
        //   dir (dx,dy)  │ c offset               d offset
        //   ─────────────┼──────────────────────────────────────
        //   Up    (0, 1) │ ( 0,  0)               (-1,  0)
        //   Down  (0,-1) │ (-1, -1)               ( 0, -1)
        //   Right (1, 0) │ ( 0, -1)               ( 0,  0)
        //   Left  (-1,0) │ (-1,  0)               (-1, -1)
        let c = bm.get(x + (dx + dy - 1) / 2, y + (dy - dx - 1) / 2);
        let d = bm.get(x + (dx - dy - 1) / 2, y + (dy + dx - 1) / 2);

        //   c  d  │ action
        //   ──────┼──────────────────────────────
        //   1  0  │ ambiguous: ask the turn policy
        //   1  1  │ turn right
        //   0  0  │ turn left
        //   0  1  │ straight on
        let right = if c && !d {
            Some(tiebreak.turn_right(bm, x, y, polarity))
        } else if c {
            Some(true)
        } else if !d {
            Some(false)
        } else {
            None
        };
        match right {
            Some(true) => (dx, dy) = (dy, -dx),
            Some(false) => (dx, dy) = (-dy, dx),
            None => {}
        }
    }

    points
}

/// Majority color around lattice point (x, y) over square rings of growing
/// radius. True if foreground dominates at the first undecided radius.
fn majority(bm: &WorkBitmap, x: i32, y: i32) -> bool {
    let vote = |set: bool| if set { 1 } else { -1 };
    for i in 2..5 {
        let mut ct = 0i32;
        for a in (-i + 1)..=(i - 1) {
            ct += vote(bm.get(x + a, y + i - 1));
            ct += vote(bm.get(x + i - 1, y + a - 1));
            ct += vote(bm.get(x + a - 1, y - i));
            ct += vote(bm.get(x - i, y + a));
        }
        if ct > 0 {
            return true;
        } else if ct < 0 {
            return false;
        }
    }
    false
}

/// XOR-fill the interior of a path.
///
/// For each vertical step, toggle the row from that column to the right
/// edge. Pairs of toggles cancel outside the contour, leaving only the
/// interior flipped.
fn xor_fill(bm: &mut WorkBitmap, points: &[(i32, i32)]) {
    let Some(&(_, last_y)) = points.last() else {
        return;
    };
    let mut y_prev = last_y;
    for &(x, y) in points {
        if y != y_prev {
            bm.xor_row_from(x, y.min(y_prev));
            y_prev = y;
        }
    }
}

/// Convert a walk to image coordinates (y down).
///
/// Holes are reversed (keeping the start point first) so outer and hole
/// contours wind in opposite directions.
fn to_image_frame(walk: Vec<(i32, i32)>, height: i32, polarity: Polarity) -> Vec<(i32, i32)> {
    let mut points: Vec<(i32, i32)> = walk.into_iter().map(|(x, y)| (x, height - y)).collect();
    if polarity == Polarity::Hole && points.len() > 1 {
        points[1..].reverse();
    }
    points
}

/// Link each contour to the innermost earlier contour that encloses it.
///
/// An enclosing contour always starts earlier in raster order, so only
/// earlier contours are candidates.
fn assign_parents(contours: &mut [Contour]) {
    let bounds: Vec<(i32, i32, i32, i32)> = contours.iter().map(|c| bbox(&c.points)).collect();
    for i in 0..contours.len() {
        // Center of the first pixel: strictly inside contour i.
        let (sx, sy) = contours[i].points[0];
        let probe = Point::new(sx as f64 + 0.5, sy as f64 + 0.5);
        let mut parent: Option<usize> = None;
        for j in 0..i {
            let (x0, y0, x1, y1) = bounds[j];
            if probe.x < x0 as f64
                || probe.x > x1 as f64
                || probe.y < y0 as f64
                || probe.y > y1 as f64
            {
                continue;
            }
            let smaller = parent.map_or(true, |p| contours[j].area < contours[p].area);
            if smaller && lattice_contains(&contours[j].points, probe) {
                parent = Some(j);
            }
        }
        contours[i].parent = parent;
    }
}

fn bbox(points: &[(i32, i32)]) -> (i32, i32, i32, i32) {
    points.iter().fold(
        (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_rows(rows: &[&str], policy: TurnPolicy, speckle: u32) -> Vec<Contour> {
        decompose(&Bitmap::from_rows(rows).unwrap(), policy, speckle)
    }

    fn assert_unit_steps(c: &Contour) {
        let n = c.points.len();
        for i in 0..n {
            let (x0, y0) = c.points[i];
            let (x1, y1) = c.points[(i + 1) % n];
            assert_eq!((x1 - x0).abs() + (y1 - y0).abs(), 1, "step {} of {:?}", i, c.points);
        }
    }

    #[test]
    fn single_pixel_is_a_unit_square() {
        let contours = trace_rows(&["...", ".#.", "..."], TurnPolicy::Minority, 0);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.points, vec![(1, 1), (1, 2), (2, 2), (2, 1)]);
        assert_eq!(c.area, 1);
        assert_eq!(c.polarity, Polarity::Outer);
        assert_eq!(c.parent, None);
    }

    #[test]
    fn ring_yields_outer_then_hole() {
        let contours = trace_rows(&["###", "#.#", "###"], TurnPolicy::Minority, 0);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].polarity, Polarity::Outer);
        assert_eq!(contours[0].area, 9);
        assert_eq!(contours[1].polarity, Polarity::Hole);
        assert_eq!(contours[1].area, 1);
        assert_eq!(contours[1].parent, Some(0));
        // Opposite winding.
        let outer = lattice_area2(&contours[0].points).signum();
        let hole = lattice_area2(&contours[1].points).signum();
        assert_eq!(outer, -hole);
        for c in &contours {
            assert_unit_steps(c);
        }
    }

    #[test]
    fn discovery_follows_raster_order() {
        let contours = trace_rows(&["..#", "...", "#.."], TurnPolicy::Minority, 0);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].points[0], (2, 0));
        assert_eq!(contours[1].points[0], (0, 2));
    }

    #[test]
    fn speckles_below_minimum_are_dropped() {
        let rows = ["##....", "##....", "......", "...###", "...###", "...###"];
        let all = trace_rows(&rows, TurnPolicy::Minority, 0);
        assert_eq!(all.len(), 2);
        let kept = trace_rows(&rows, TurnPolicy::Minority, 5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].area, 9);
    }

    #[test]
    fn ambiguous_diagonal_depends_on_policy() {
        // Two pixels touching only at a corner.
        let rows = ["#.", ".#"];
        let joined = trace_rows(&rows, TurnPolicy::Black, 0);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].area, 2);
        let split = trace_rows(&rows, TurnPolicy::White, 0);
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(|c| c.area == 1));
        // Left and right are each one of the two outcomes.
        let left = trace_rows(&rows, TurnPolicy::Left, 0).len();
        let right = trace_rows(&rows, TurnPolicy::Right, 0).len();
        assert_eq!(left + right, 3);
    }

    #[test]
    fn minority_and_majority_follow_local_colour() {
        // Diagonal black pair in a white field: black is the minority.
        let sparse = ["........", "........", "...#....", "....#...", "........", "........"];
        assert_eq!(trace_rows(&sparse, TurnPolicy::Minority, 0).len(), 1);
        assert_eq!(trace_rows(&sparse, TurnPolicy::Majority, 0).len(), 2);

        // Diagonal white pair in a black field: the holes join under
        // minority and stay apart under majority.
        let dense = ["########", "########", "###.####", "####.###", "########", "########"];
        let minority = trace_rows(&dense, TurnPolicy::Minority, 0);
        assert_eq!(minority.len(), 2);
        assert_eq!(minority[1].polarity, Polarity::Hole);
        assert_eq!(minority[1].area, 2);
        let majority = trace_rows(&dense, TurnPolicy::Majority, 0);
        assert_eq!(majority.len(), 3);
        assert!(majority[1..].iter().all(|c| c.polarity == Polarity::Hole && c.area == 1));
    }

    #[test]
    fn random_policy_is_reproducible_per_seed() {
        let rows = ["#.#.#.", ".#.#.#", "#.#.#.", ".#.#.#"];
        let a = trace_rows(&rows, TurnPolicy::Random { seed: 9 }, 0);
        let b = trace_rows(&rows, TurnPolicy::Random { seed: 9 }, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn random_policy_depends_on_seed() {
        let rows = [
            "#.#.#.#.",
            ".#.#.#.#",
            "#.#.#.#.",
            ".#.#.#.#",
            "#.#.#.#.",
            ".#.#.#.#",
            "#.#.#.#.",
            ".#.#.#.#",
        ];
        let base = trace_rows(&rows, TurnPolicy::Random { seed: 0 }, 0);
        assert!((1..16).any(|seed| trace_rows(&rows, TurnPolicy::Random { seed }, 0) != base));
    }

    #[test]
    fn nested_islands_get_parents() {
        let rows = [
            "#######",
            "#.....#",
            "#.###.#",
            "#.#.#.#",
            "#.###.#",
            "#.....#",
            "#######",
        ];
        let contours = trace_rows(&rows, TurnPolicy::Minority, 0);
        let shape: Vec<(Polarity, Option<usize>)> =
            contours.iter().map(|c| (c.polarity, c.parent)).collect();
        assert_eq!(
            shape,
            vec![
                (Polarity::Outer, None),
                (Polarity::Hole, Some(0)),
                (Polarity::Outer, Some(1)),
                (Polarity::Hole, Some(2)),
            ]
        );
    }
}
