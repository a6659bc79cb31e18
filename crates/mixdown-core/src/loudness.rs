//! Loudness targets, measurements and report parsing.
//!
//! Normalization runs in two passes: a measure pass reports the input's
//! integrated loudness, true peak, loudness range, gating threshold and target
//! offset; the apply pass re-processes the input with the targets plus all five
//! measured values. When the measure pass produces nothing parseable, the apply
//! pass still runs with [`LoudnessMeasurement::SENTINEL`] and the outcome is
//! marked [`MeasurementSource::Sentinel`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// EBU R128 normalization targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessTargets {
    /// Integrated loudness target in LUFS.
    pub integrated_lufs: f64,
    /// True-peak ceiling in dBTP.
    pub true_peak_db: f64,
    /// Loudness range target in LU.
    pub lra: f64,
}

impl Default for LoudnessTargets {
    fn default() -> Self {
        Self {
            integrated_lufs: -16.0,
            true_peak_db: -1.0,
            lra: 11.0,
        }
    }
}

/// Pass-1 output consumed by pass 2. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMeasurement {
    /// Measured integrated loudness in LUFS.
    pub integrated_lufs: f64,
    /// Measured true peak in dBTP.
    pub true_peak_db: f64,
    /// Measured loudness range in LU.
    pub lra: f64,
    /// Measured gating threshold in dB.
    pub threshold_db: f64,
    /// Offset gain the engine suggests for the apply pass, in dB.
    pub target_offset_db: f64,
}

impl LoudnessMeasurement {
    /// Values used for pass 2 when pass 1 yields nothing parseable.
    ///
    /// A moderately quiet programme: −24 LUFS, −2 dBTP, 7 LU range,
    /// −34 dB gate, no offset.
    pub const SENTINEL: Self = Self {
        integrated_lufs: -24.0,
        true_peak_db: -2.0,
        lra: 7.0,
        threshold_db: -34.0,
        target_offset_db: 0.0,
    };

    /// Parse the last JSON object in an engine report.
    ///
    /// Fields `input_i`, `input_tp`, `input_lra`, `input_thresh` and
    /// `target_offset` may be JSON numbers or numeric strings. Returns `None`
    /// if no object is found, a field is missing, or any value is not finite.
    pub fn parse_report(report: &str) -> Option<Self> {
        let object = last_json_object(report)?;
        Some(Self {
            integrated_lufs: number_field(&object, "input_i")?,
            true_peak_db: number_field(&object, "input_tp")?,
            lra: number_field(&object, "input_lra")?,
            threshold_db: number_field(&object, "input_thresh")?,
            target_offset_db: number_field(&object, "target_offset")?,
        })
    }

    /// Parse a report, falling back to [`SENTINEL`](Self::SENTINEL).
    pub fn resolve(report: &str) -> (Self, MeasurementSource) {
        match Self::parse_report(report) {
            Some(m) => (m, MeasurementSource::Measured),
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!("loudness report unparseable, using sentinel measurement");
                (Self::SENTINEL, MeasurementSource::Sentinel)
            }
        }
    }
}

/// Where the pass-2 measurement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementSource {
    /// Parsed from the measure pass.
    Measured,
    /// Measure pass unparseable; sentinel defaults used.
    Sentinel,
}

/// Integrated loudness and true peak of a finished signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessReading {
    /// Integrated loudness in LUFS.
    pub integrated_lufs: f64,
    /// True peak in dBTP.
    pub true_peak_db: f64,
}

impl LoudnessReading {
    /// Parse a verification report (same form as the measure pass).
    pub fn parse_report(report: &str) -> Option<Self> {
        let object = last_json_object(report)?;
        Some(Self {
            integrated_lufs: number_field(&object, "input_i")?,
            true_peak_db: number_field(&object, "input_tp")?,
        })
    }
}

impl From<LoudnessMeasurement> for LoudnessReading {
    fn from(m: LoudnessMeasurement) -> Self {
        Self {
            integrated_lufs: m.integrated_lufs,
            true_peak_db: m.true_peak_db,
        }
    }
}

fn number_field(object: &Value, key: &str) -> Option<f64> {
    let value = match object.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// The last complete JSON object embedded in `text`.
///
/// Scans forward from each `{`, letting the JSON parser find where the object
/// ends, so braces inside string values are handled and a malformed trailing
/// block falls back to the last well-formed one before it.
fn last_json_object(text: &str) -> Option<Value> {
    let mut last = None;
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => {
                last = Some(value);
                pos = start + stream.byte_offset();
            }
            _ => pos = start + 1,
        }
    }
    last
}
