use crate::error::TraceError;

/// Largest meaningful corner threshold: vertices whose neighbours are
/// collinear in the max-norm sense get alpha = 4/3.
pub const CORNER_THRESHOLD_MAX: f64 = 4.0 / 3.0;

/// Upper bound for the speckle filter, in pixels.
pub const SPECKLE_AREA_MAX: u32 = 100;

/// All tracing parameters in one immutable value.
///
/// A fresh value is handed to every tracing run; nothing inside the engine
/// mutates it or keeps it between runs. `TracingConfig::default()` is the
/// "restore defaults" state.
#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    // -- Bitmap stage --
    /// Weighted-RGB threshold in [0, 1]. 0 = most inclusive (everything
    /// darker than pure white is foreground), 1 = least inclusive.
    pub threshold: f64,

    // -- Contour stage --
    /// Resolution of ambiguous diagonal pixel configurations.
    pub turn_policy: TurnPolicy,
    /// Contours enclosing fewer pixels than this are dropped (0..=100).
    pub speckle_area_min: u32,

    // -- Curve stage --
    /// Corner rounding threshold ("alphamax"), in [0, 4/3].
    /// 0 = every vertex is a corner (polygon output);
    /// 4/3 = no corners at all.
    pub corner_threshold: f64,
    /// Merge runs of smooth Bezier segments where the fit stays in tolerance.
    pub curve_optimizing: bool,
    /// Maximum merge error in pixels, in (0, 1].
    pub opt_tolerance: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            turn_policy: TurnPolicy::Minority,
            speckle_area_min: 2,
            corner_threshold: 1.0,
            curve_optimizing: true,
            opt_tolerance: 0.2,
        }
    }
}

impl TracingConfig {
    /// Reject out-of-range parameters before any tracing work happens.
    pub fn validate(&self) -> Result<(), TraceError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(invalid("threshold", format!("must be in [0, 1], got {}", self.threshold)));
        }
        if self.speckle_area_min > SPECKLE_AREA_MAX {
            return Err(invalid(
                "speckle_area_min",
                format!("must be at most {}, got {}", SPECKLE_AREA_MAX, self.speckle_area_min),
            ));
        }
        if !(0.0..=CORNER_THRESHOLD_MAX).contains(&self.corner_threshold) {
            return Err(invalid(
                "corner_threshold",
                format!("must be in [0, 4/3], got {}", self.corner_threshold),
            ));
        }
        if !(self.opt_tolerance > 0.0 && self.opt_tolerance <= 1.0) {
            return Err(invalid(
                "opt_tolerance",
                format!("must be in (0, 1], got {}", self.opt_tolerance),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> TraceError {
    TraceError::InvalidConfig { field, reason }
}

/// Tie-break rule for ambiguous diagonal corners during contour tracing.
///
/// An ambiguous corner is a lattice point where two foreground pixels
/// touch only diagonally. Turning one way joins them into one region,
/// turning the other way keeps them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnPolicy {
    /// Prefer to connect black (foreground) components.
    Black,
    /// Prefer to connect white (background) components.
    White,
    /// Always turn left.
    Left,
    /// Always turn right.
    Right,
    /// Prefer to connect the color that is locally less frequent.
    Minority,
    /// Prefer to connect the color that is locally more frequent.
    Majority,
    /// Decide by a seeded pseudo-random coin flip.
    Random { seed: u64 },
}

impl TurnPolicy {
    /// Names in persisted-index order.
    pub const NAMES: [&'static str; 7] =
        ["black", "white", "left", "right", "minority", "majority", "random"];

    /// Persisted integer index (Black = 0 … Random = 6).
    pub fn index(self) -> usize {
        match self {
            TurnPolicy::Black => 0,
            TurnPolicy::White => 1,
            TurnPolicy::Left => 2,
            TurnPolicy::Right => 3,
            TurnPolicy::Minority => 4,
            TurnPolicy::Majority => 5,
            TurnPolicy::Random { .. } => 6,
        }
    }

    /// Inverse of [`TurnPolicy::index`]. `seed` is only used by `Random`.
    pub fn from_index(index: usize, seed: u64) -> Option<Self> {
        Some(match index {
            0 => TurnPolicy::Black,
            1 => TurnPolicy::White,
            2 => TurnPolicy::Left,
            3 => TurnPolicy::Right,
            4 => TurnPolicy::Minority,
            5 => TurnPolicy::Majority,
            6 => TurnPolicy::Random { seed },
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TracingConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let cases = [
            (TracingConfig { threshold: 1.5, ..Default::default() }, "threshold"),
            (TracingConfig { threshold: f64::NAN, ..Default::default() }, "threshold"),
            (TracingConfig { speckle_area_min: 101, ..Default::default() }, "speckle_area_min"),
            (TracingConfig { corner_threshold: -0.1, ..Default::default() }, "corner_threshold"),
            (TracingConfig { corner_threshold: 1.5, ..Default::default() }, "corner_threshold"),
            (TracingConfig { opt_tolerance: 0.0, ..Default::default() }, "opt_tolerance"),
            (TracingConfig { opt_tolerance: 1.01, ..Default::default() }, "opt_tolerance"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(TraceError::InvalidConfig { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected InvalidConfig for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn boundary_values_are_accepted() {
        let config = TracingConfig {
            threshold: 0.0,
            speckle_area_min: 100,
            corner_threshold: CORNER_THRESHOLD_MAX,
            opt_tolerance: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn turn_policy_index_round_trips() {
        for i in 0..TurnPolicy::NAMES.len() {
            let policy = TurnPolicy::from_index(i, 7).unwrap();
            assert_eq!(policy.index(), i);
            assert_eq!(policy.name(), TurnPolicy::NAMES[i]);
        }
        assert_eq!(TurnPolicy::from_index(6, 42), Some(TurnPolicy::Random { seed: 42 }));
        assert_eq!(TurnPolicy::from_index(7, 0), None);
    }
}
