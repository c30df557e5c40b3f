//! vectorize: bitmap image → closed outline paths.
//!
//! Traces the foreground of a raster image into lines and cubic Beziers
//! with the classical Potrace pipeline: binarization, contour extraction,
//! speckle filtering, optimal polygons, corner/smooth classification and
//! optional tolerance-bounded curve merging.
//!
//! # Example
//!
//! ```no_run
//! use vectorize::{trace, TracingConfig};
//!
//! let image = image::open("drawing.png").unwrap().to_rgba8();
//! let paths = trace(&image, &TracingConfig::default())?;
//! for path in &paths {
//!     println!("{:?}: {} segments", path.polarity, path.segments.len());
//! }
//! # Ok::<(), vectorize::TraceError>(())
//! ```

#![forbid(unsafe_code)]

mod geom;

pub mod bitmap;
pub mod config;
pub mod error;
pub mod path;
pub mod settings;
pub mod vectorize;

// Re-export kurbo so downstream users get the same version used by
// Segment and PathSet::to_bezpaths.
pub use kurbo;

pub use bitmap::{binarize, Bitmap};
pub use config::{TracingConfig, TurnPolicy};
pub use error::TraceError;
pub use path::{Path, PathSet, Polarity, Segment, SegmentKind};
pub use settings::Settings;

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use image::RgbaImage;

/// Full pipeline: decoded image → ordered outline paths.
///
/// The configuration is validated before any work is done. Identical
/// inputs give identical output for every turn policy (the random policy
/// is seeded by its own value).
pub fn trace(image: &RgbaImage, config: &TracingConfig) -> Result<PathSet, TraceError> {
    trace_with_cancel(image, config, &AtomicBool::new(false))
}

/// [`trace`] with a cooperative cancellation flag, polled between
/// contours. A set flag ends the run with [`TraceError::Cancelled`].
pub fn trace_with_cancel(
    image: &RgbaImage,
    config: &TracingConfig,
    cancel: &AtomicBool,
) -> Result<PathSet, TraceError> {
    config.validate()?;

    // ── Load & threshold ──────────────────────────────────
    let bitmap = binarize(image, config.threshold)?;
    tracing::info!(
        "Load        {}x{} px, threshold {}, {} foreground px",
        bitmap.width(),
        bitmap.height(),
        config.threshold,
        bitmap.count_foreground(),
    );

    run(&bitmap, config, cancel)
}

/// Trace an already binarized grid. `config.threshold` is not used.
pub fn trace_bitmap(bitmap: &Bitmap, config: &TracingConfig) -> Result<PathSet, TraceError> {
    config.validate()?;
    run(bitmap, config, &AtomicBool::new(false))
}

fn run(
    bitmap: &Bitmap,
    config: &TracingConfig,
    cancel: &AtomicBool,
) -> Result<PathSet, TraceError> {
    let t_start = Instant::now();

    // ── Vectorize ─────────────────────────────────────────
    let paths = vectorize::vectorize(bitmap, config, cancel)?;
    let (curves, lines) = paths.segment_counts();
    tracing::info!(
        "Trace       {} contours \u{2192} {} curves + {} lines  (policy {}, {})",
        paths.len(),
        curves,
        lines,
        config.turn_policy.name(),
        if config.curve_optimizing {
            format!("merged within {}", config.opt_tolerance)
        } else {
            "unmerged".to_string()
        },
    );

    let n_outer = paths.iter().filter(|p| p.polarity == Polarity::Outer).count();
    tracing::info!(
        "Result      {} paths ({} outer, {} holes)  ({}ms)",
        paths.len(),
        n_outer,
        paths.len() - n_outer,
        t_start.elapsed().as_millis(),
    );

    Ok(paths)
}
