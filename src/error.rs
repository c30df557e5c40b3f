use thiserror::Error;

/// Errors that can occur during bitmap tracing.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("invalid configuration: `{field}` {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// A contour that cannot be reduced to a polygon of at least 3 vertices.
    /// Per-contour: the pipeline drops the contour and keeps going.
    #[error("degenerate contour #{index} ({points} lattice points)")]
    DegenerateContour { index: usize, points: usize },

    #[error("tracing cancelled")]
    Cancelled,

    #[error("settings i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings format error: {0}")]
    Settings(#[from] serde_json::Error),
}
