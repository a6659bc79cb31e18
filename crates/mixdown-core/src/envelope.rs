//! Dialogue envelope → ducking curve.
//!
//! The engine measures dialogue RMS once per fixed hop. Each hop maps to an
//! attenuation for the music bed through hard thresholds:
//!
//! | dialogue RMS          | music duck |
//! |-----------------------|------------|
//! | above −30 dB          | −7 dB      |
//! | −45 dB < rms ≤ −30 dB | −3 dB      |
//! | at or below −45 dB    | none       |
//!
//! Every hop with nonzero attenuation becomes its own [`DuckSegment`]. Adjacent
//! equal segments are not merged.

use serde::{Deserialize, Serialize};

/// One RMS measurement of the dialogue signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RmsSample {
    /// Hop start in seconds.
    pub t: f64,
    /// RMS level in dB.
    pub rms_db: f64,
}

/// Attenuation applied to the music bed over `[t0, t1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuckSegment {
    /// Window start in seconds.
    pub t0: f64,
    /// Window end in seconds (exclusive).
    pub t1: f64,
    /// Attenuation in dB, `<= 0`.
    pub duck_db: f64,
}

/// Threshold table for the ducking curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckThresholds {
    /// Dialogue louder than this gets `loud_duck_db`.
    pub loud_above_db: f64,
    /// Attenuation under loud dialogue.
    pub loud_duck_db: f64,
    /// Dialogue louder than this (and not loud) gets `soft_duck_db`.
    pub soft_above_db: f64,
    /// Attenuation under soft dialogue.
    pub soft_duck_db: f64,
}

impl Default for DuckThresholds {
    fn default() -> Self {
        Self {
            loud_above_db: -30.0,
            loud_duck_db: -7.0,
            soft_above_db: -45.0,
            soft_duck_db: -3.0,
        }
    }
}

impl DuckThresholds {
    /// Attenuation for a dialogue level. NaN levels map to no attenuation.
    pub fn duck_for(&self, rms_db: f64) -> f64 {
        if rms_db > self.loud_above_db {
            self.loud_duck_db
        } else if rms_db > self.soft_above_db {
            self.soft_duck_db
        } else {
            0.0
        }
    }
}

/// Errors from curve computation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CurveError {
    /// Hop size must be positive and finite.
    #[error("invalid hop size {0}s (must be positive and finite)")]
    InvalidHop(f64),
}

/// Compute the ducking curve for samples taken every `hop` seconds from t=0.
///
/// Segment `i` spans `[i·hop, (i+1)·hop)` regardless of the sample's own `t`,
/// so the result depends only on sample order and levels.
///
/// # Errors
///
/// Returns [`CurveError::InvalidHop`] for a non-positive or non-finite hop.
pub fn duck_curve(
    samples: &[RmsSample],
    hop: f64,
    thresholds: &DuckThresholds,
) -> Result<Vec<DuckSegment>, CurveError> {
    if !(hop.is_finite() && hop > 0.0) {
        return Err(CurveError::InvalidHop(hop));
    }
    let segments: Vec<DuckSegment> = samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let duck_db = thresholds.duck_for(s.rms_db);
            (duck_db != 0.0).then(|| DuckSegment {
                t0: i as f64 * hop,
                t1: (i + 1) as f64 * hop,
                duck_db,
            })
        })
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(
        samples = samples.len(),
        segments = segments.len(),
        hop,
        "duck_curve"
    );
    Ok(segments)
}

/// Pair raw per-hop levels with their hop start times.
pub fn samples_from_levels(levels: &[f64], hop: f64) -> Vec<RmsSample> {
    levels
        .iter()
        .enumerate()
        .map(|(i, &rms_db)| RmsSample {
            t: i as f64 * hop,
            rms_db,
        })
        .collect()
}
