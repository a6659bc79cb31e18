//! Two-pass loudness normalization.
//!
//! 1. **Measure**: the engine analyzes the input against the targets.
//! 2. **Apply**: the engine re-processes the input with the targets and all
//!    five measured values. Pass 2 starts only after pass 1 has returned.
//! 3. **Verify**: a measure pass on the output yields the final integrated
//!    loudness and true peak.
//!
//! An unparseable pass-1 report does not stop the pipeline: pass 2 runs with
//! [`LoudnessMeasurement::SENTINEL`] and the outcome says so.

use std::sync::Arc;

use mixdown_core::loudness::{
    LoudnessMeasurement, LoudnessReading, LoudnessTargets, MeasurementSource,
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ports::{AudioEngine, SignalRef, op};
use crate::retry::RetryPolicy;

/// Result of a normalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeOutcome {
    /// Normalized signal.
    pub output: SignalRef,
    /// Values handed to the apply pass.
    pub measurement: LoudnessMeasurement,
    /// Whether `measurement` was measured or the sentinel.
    pub measurement_source: MeasurementSource,
    /// Verification reading of the output, if its report parsed.
    pub verified: Option<LoudnessReading>,
}

/// Runs measure → apply → verify against an injected engine.
#[derive(Clone)]
pub struct LoudnessNormalizer {
    engine: Arc<dyn AudioEngine>,
    policy: RetryPolicy,
}

impl LoudnessNormalizer {
    /// Creates a normalizer.
    pub fn new(engine: Arc<dyn AudioEngine>, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    /// Normalize `source` into `output`.
    ///
    /// # Errors
    ///
    /// Returns the last [`EngineError`] of whichever pass failed after retries.
    pub async fn normalize(
        &self,
        source: &str,
        targets: &LoudnessTargets,
        output: &str,
    ) -> Result<NormalizeOutcome, EngineError> {
        let engine = &*self.engine;

        let report = self
            .policy
            .call(op::MEASURE_LOUDNESS, move || {
                engine.measure_loudness(source, targets)
            })
            .await?;
        let (measurement, measurement_source) = LoudnessMeasurement::resolve(&report);
        tracing::debug!(
            source,
            integrated_lufs = measurement.integrated_lufs,
            true_peak_db = measurement.true_peak_db,
            ?measurement_source,
            "loudness pass 1"
        );

        let measured = &measurement;
        let normalized = self
            .policy
            .call(op::NORMALIZE_LOUDNESS, move || {
                engine.normalize_loudness(source, targets, measured, output)
            })
            .await?;

        let verify_ref = normalized.as_str();
        let verify_report = self
            .policy
            .call(op::MEASURE_LOUDNESS, move || {
                engine.measure_loudness(verify_ref, targets)
            })
            .await?;
        let verified = LoudnessReading::parse_report(&verify_report);
        if verified.is_none() {
            tracing::warn!(output = %normalized, "verification report unparseable");
        }

        Ok(NormalizeOutcome {
            output: normalized,
            measurement,
            measurement_source,
            verified,
        })
    }
}
