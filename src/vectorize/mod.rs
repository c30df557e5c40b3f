//! Vectorization pipeline: boolean grid → closed outline paths.
//!
//! 1. Pixel-edge contour extraction on the dual grid (+ speckle filter)
//! 2. Optimal polygon approximation (DP) with sub-pixel vertex refinement
//! 3. Alpha-based corner detection and Bezier generation
//! 4. Optional greedy curve merging within a tolerance
//! 5. Path assembly with exact joints

pub mod assemble;
pub mod curve;
pub mod decompose;
pub mod optimize;
pub mod polygon;

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::bitmap::Bitmap;
use crate::config::TracingConfig;
use crate::error::TraceError;
use crate::path::{Path, PathSet};
use decompose::Contour;

/// Run stages 1–5 over a bitmap. The configuration is assumed valid.
///
/// Contours are independent after extraction, so they are processed in
/// parallel; the indexed collect keeps discovery order. `cancel` is polled
/// before each contour.
pub fn vectorize(
    bitmap: &Bitmap,
    config: &TracingConfig,
    cancel: &AtomicBool,
) -> Result<PathSet, TraceError> {
    // Stage 1: Extract pixel-edge contours on the dual grid.
    let contours = decompose::decompose(bitmap, config.turn_policy, config.speckle_area_min);
    if cancel.load(Ordering::Relaxed) {
        return Err(TraceError::Cancelled);
    }

    // Stages 2-5 per contour.
    let traced: Vec<Option<Path>> = contours
        .par_iter()
        .enumerate()
        .map(|(index, contour)| {
            if cancel.load(Ordering::Relaxed) {
                return Err(TraceError::Cancelled);
            }
            match trace_contour(contour, index, config) {
                Ok(path) => Ok(Some(path)),
                Err(err @ TraceError::DegenerateContour { .. }) => {
                    tracing::warn!("skipping contour: {}", err);
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        })
        .collect::<Result<_, _>>()?;

    Ok(PathSet { paths: relink(&contours, traced) })
}

/// Polygon, segments, optional merge and assembly for one contour.
fn trace_contour(
    contour: &Contour,
    index: usize,
    config: &TracingConfig,
) -> Result<Path, TraceError> {
    let poly = polygon::optimal_polygon(contour, index)?;
    let mut segments = curve::fit(&poly, config.corner_threshold);
    let fitted = segments.len();
    if config.curve_optimizing {
        segments = optimize::optimize(segments, config.opt_tolerance);
    }
    tracing::debug!(
        "contour {}: {} points → {} vertices → {} segments ({} after merge)",
        index,
        contour.points.len(),
        poly.vertices.len(),
        fitted,
        segments.len(),
    );
    Ok(assemble::assemble(segments, contour.polarity, contour.area, contour.parent))
}

/// Drop skipped contours and renumber parents.
///
/// A path whose parent was skipped inherits the nearest surviving ancestor.
fn relink(contours: &[Contour], traced: Vec<Option<Path>>) -> Vec<Path> {
    let mut new_index = vec![None; traced.len()];
    let mut next = 0;
    for (i, t) in traced.iter().enumerate() {
        if t.is_some() {
            new_index[i] = Some(next);
            next += 1;
        }
    }

    traced
        .into_iter()
        .flatten()
        .map(|mut path| {
            let mut parent = path.parent;
            while let Some(p) = parent {
                if new_index[p].is_some() {
                    break;
                }
                parent = contours[p].parent;
            }
            path.parent = parent.and_then(|p| new_index[p]);
            path
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{Polarity, SegmentKind};

    fn run(rows: &[&str], config: &TracingConfig) -> PathSet {
        let bm = Bitmap::from_rows(rows).unwrap();
        vectorize(&bm, config, &AtomicBool::new(false)).unwrap()
    }

    fn exact() -> TracingConfig {
        TracingConfig { speckle_area_min: 0, ..TracingConfig::default() }
    }

    #[test]
    fn rectangle_traces_to_four_lines() {
        let mut rows = vec!["............"];
        rows.extend(std::iter::repeat(".##########.").take(8));
        rows.push("............");
        let set = run(&rows, &exact());
        assert_eq!(set.len(), 1);
        assert_eq!(set.paths[0].count(SegmentKind::Line), 4);
        assert_eq!(set.paths[0].count(SegmentKind::Curve), 0);
        assert_eq!(set.paths[0].area, 80);
    }

    #[test]
    fn hole_keeps_its_parent() {
        let rows = [
            "#######", "#######", "##...##", "##...##", "##...##", "#######", "#######",
        ];
        let set = run(&rows, &exact());
        assert_eq!(set.len(), 2);
        assert_eq!(set.paths[0].polarity, Polarity::Outer);
        assert_eq!(set.paths[1].polarity, Polarity::Hole);
        assert_eq!(set.paths[1].parent, Some(0));
    }

    #[test]
    fn cancelled_run_returns_error() {
        let bm = Bitmap::from_rows(&["##", "##"]).unwrap();
        let result = vectorize(&bm, &exact(), &AtomicBool::new(true));
        assert!(matches!(result, Err(TraceError::Cancelled)));
    }

    #[test]
    fn parents_skip_to_surviving_ancestor() {
        let contour = |parent| Contour {
            points: vec![(0, 0), (0, 1), (1, 1), (1, 0)],
            polarity: Polarity::Outer,
            area: 1,
            parent,
        };
        let path = |parent| Path {
            polarity: Polarity::Outer,
            area: 1,
            parent,
            segments: Vec::new(),
        };
        let contours = vec![contour(None), contour(Some(0)), contour(Some(1))];
        let traced = vec![Some(path(None)), None, Some(path(Some(1)))];
        let paths = relink(&contours, traced);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].parent, Some(0));
    }
}
