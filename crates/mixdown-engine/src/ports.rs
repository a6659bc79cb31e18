//! Ports to the external audio engine and artifact store.
//!
//! The orchestration layer never processes samples. Everything that touches
//! signal data goes through [`AudioEngine`]; everything persisted goes through
//! [`ArtifactStore`]. Both are injected, and their lifecycle belongs to the
//! caller.

use async_trait::async_trait;
use mixdown_core::crossfade::CrossfadePlan;
use mixdown_core::envelope::RmsSample;
use mixdown_core::graph::MixPlan;
use mixdown_core::loudness::{LoudnessMeasurement, LoudnessTargets};

use crate::error::EngineError;
use crate::store::StoreError;

/// Opaque reference to signal data held by the engine (a path for file engines).
pub type SignalRef = String;

/// Operation names used in errors and logs.
pub mod op {
    /// Dialogue envelope analysis.
    pub const ANALYZE_ENVELOPE: &str = "analyze_envelope";
    /// Graph execution or pass-through copy.
    pub const RENDER: &str = "render";
    /// Loudness measure pass.
    pub const MEASURE_LOUDNESS: &str = "measure_loudness";
    /// Loudness apply pass.
    pub const NORMALIZE_LOUDNESS: &str = "normalize_loudness";
    /// Sequential crossfade concatenation.
    pub const CROSSFADE_CONCAT: &str = "crossfade_concat";
}

/// External audio-processing engine.
///
/// Calls are long-running; implementations must not hold locks across them.
/// Every method may be retried, so each must be safe to repeat.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// RMS level of `source` once per `hop_sec`, starting at t = 0.
    async fn analyze_envelope(
        &self,
        source: &str,
        hop_sec: f64,
    ) -> Result<Vec<RmsSample>, EngineError>;

    /// Execute a validated mix plan and write the result to `output`.
    async fn render(&self, plan: &MixPlan, output: &str) -> Result<SignalRef, EngineError>;

    /// Measure pass: analyze `source` against `targets` and return the raw report.
    async fn measure_loudness(
        &self,
        source: &str,
        targets: &LoudnessTargets,
    ) -> Result<String, EngineError>;

    /// Apply pass: re-process `source` with the targets and all five measured values.
    async fn normalize_loudness(
        &self,
        source: &str,
        targets: &LoudnessTargets,
        measured: &LoudnessMeasurement,
        output: &str,
    ) -> Result<SignalRef, EngineError>;

    /// Fold the plan's sources into one stream. Must write nothing on failure.
    async fn crossfade_concat(
        &self,
        plan: &CrossfadePlan,
        output: &str,
    ) -> Result<SignalRef, EngineError>;
}

/// Destination for manifests.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `manifest` under `name` and return where it went.
    async fn publish_manifest(
        &self,
        name: &str,
        manifest: &serde_json::Value,
    ) -> Result<String, StoreError>;
}
