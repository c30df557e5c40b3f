//! Persisted tracing settings.
//!
//! The tracing configuration (plus the caller's include-border choice) as
//! flat key/value pairs in a JSON file. Every key is optional; a missing key
//! means the default. The engine never reads these itself: a front end
//! loads them, builds a [`TracingConfig`] and passes it in.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{TracingConfig, TurnPolicy};
use crate::error::TraceError;

/// Stored settings. `Settings::default()` (all keys absent) is
/// "restore defaults".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// [`TurnPolicy::index`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turnpolicy: Option<usize>,
    /// Speckle area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turdsize: Option<u32>,
    /// Corner threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphamax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curveoptimizing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opttolerance: Option<f64>,
    /// Seed of the random turn policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_border: Option<bool>,
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write settings to a JSON file, replacing it.
    pub fn save(&self, path: &Path) -> Result<(), TraceError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Snapshot of a configuration, with every key present.
    pub fn from_config(config: &TracingConfig, include_border: bool) -> Self {
        let seed = match config.turn_policy {
            TurnPolicy::Random { seed } => Some(seed),
            _ => None,
        };
        Settings {
            threshold: Some(config.threshold),
            turnpolicy: Some(config.turn_policy.index()),
            turdsize: Some(config.speckle_area_min),
            alphamax: Some(config.corner_threshold),
            curveoptimizing: Some(config.curve_optimizing),
            opttolerance: Some(config.opt_tolerance),
            seed,
            include_border: Some(include_border),
        }
    }

    /// Validated configuration, defaults filling missing keys.
    pub fn to_config(&self) -> Result<TracingConfig, TraceError> {
        let defaults = TracingConfig::default();
        let turn_policy = match self.turnpolicy {
            Some(i) => TurnPolicy::from_index(i, self.seed.unwrap_or(0)).ok_or_else(|| {
                TraceError::InvalidConfig {
                    field: "turn_policy",
                    reason: format!("unknown policy index {}", i),
                }
            })?,
            None => defaults.turn_policy,
        };
        let config = TracingConfig {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            turn_policy,
            speckle_area_min: self.turdsize.unwrap_or(defaults.speckle_area_min),
            corner_threshold: self.alphamax.unwrap_or(defaults.corner_threshold),
            curve_optimizing: self.curveoptimizing.unwrap_or(defaults.curve_optimizing),
            opt_tolerance: self.opttolerance.unwrap_or(defaults.opt_tolerance),
        };
        config.validate()?;
        Ok(config)
    }

    /// Whether the caller prepends the image frame as a border path.
    /// Defaults to true.
    pub fn include_border(&self) -> bool {
        self.include_border.unwrap_or(true)
    }
}
