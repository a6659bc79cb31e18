//! Crossfaded episode export.
//!
//! Layout first, engine second: offsets and the fade plan are computed before
//! the engine is asked for anything, so a bad scene list never reaches it.
//! The combine is a single engine call. If it fails, nothing is published.

use std::sync::Arc;

use mixdown_core::crossfade::{
    CrossfadeLayout, CrossfadePlan, FadeCurve, PlaybackManifest, SceneClip,
};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::ports::{ArtifactStore, AudioEngine, SignalRef, op};
use crate::retry::RetryPolicy;

/// Episode export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Project identifier, also the manifest name.
    pub project_id: String,
    /// Mixed scenes in playback order.
    pub scenes: Vec<SceneClip>,
    /// Crossfade override in seconds.
    #[serde(default)]
    pub crossfade_sec: Option<f64>,
    /// Output location for the combined signal.
    pub output: String,
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutcome {
    /// Millisecond-precision playback manifest.
    pub manifest: PlaybackManifest,
    /// Combined signal.
    pub output: SignalRef,
    /// Where the manifest was published, if it was.
    pub published: Option<String>,
    /// Side effects that failed without failing the export.
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// Combines mixed scenes into one episode.
#[derive(Clone)]
pub struct Exporter {
    engine: Arc<dyn AudioEngine>,
    store: Option<Arc<dyn ArtifactStore>>,
    policy: RetryPolicy,
    crossfade_sec: f64,
    curve: FadeCurve,
}

impl Exporter {
    /// Creates an exporter with default crossfade and curve.
    pub fn new(engine: Arc<dyn AudioEngine>, policy: RetryPolicy) -> Self {
        Self {
            engine,
            store: None,
            policy,
            crossfade_sec: 1.5,
            curve: FadeCurve::default(),
        }
    }

    /// Sets the default crossfade duration.
    pub fn with_crossfade(mut self, crossfade_sec: f64) -> Self {
        self.crossfade_sec = crossfade_sec;
        self
    }

    /// Sets the fade curve.
    pub fn with_curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Publishes each playback manifest to `store`.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Export an episode.
    ///
    /// # Errors
    ///
    /// [`ExportError::Layout`] before any engine call for an empty scene list
    /// or invalid durations; [`ExportError::Engine`] if the combine fails after
    /// retries.
    pub async fn export(&self, request: &ExportRequest) -> Result<ExportOutcome, ExportError> {
        let project_id = request.project_id.as_str();
        let crossfade = request.crossfade_sec.unwrap_or(self.crossfade_sec);
        let layout = CrossfadeLayout::compute(&request.scenes, crossfade).map_err(|source| {
            ExportError::Layout {
                project_id: project_id.to_string(),
                source,
            }
        })?;
        let plan = CrossfadePlan::new(&request.scenes, crossfade, self.curve);
        tracing::info!(
            project = project_id,
            scenes = request.scenes.len(),
            fades = plan.fade_count(),
            total_sec = layout.total_sec(),
            "exporting episode"
        );

        let engine = &*self.engine;
        let plan_ref = &plan;
        let target = request.output.as_str();
        let output = self
            .policy
            .call(op::CROSSFADE_CONCAT, move || {
                engine.crossfade_concat(plan_ref, target)
            })
            .await
            .map_err(|source| ExportError::Engine {
                project_id: project_id.to_string(),
                source,
            })?;

        let manifest = PlaybackManifest::from_layout(project_id, &layout);
        let mut skipped = Vec::new();
        let published = self.publish(&manifest, &mut skipped).await;

        Ok(ExportOutcome {
            manifest,
            output,
            published,
            skipped,
        })
    }

    async fn publish(
        &self,
        manifest: &PlaybackManifest,
        skipped: &mut Vec<String>,
    ) -> Option<String> {
        let store = self.store.as_ref()?;
        let result = match serde_json::to_value(manifest) {
            Ok(value) => store
                .publish_manifest(&manifest.project_id, &value)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!(project = %manifest.project_id, error = %e, "manifest publish skipped");
                skipped.push(format!("publish_manifest: {e}"));
                None
            }
        }
    }
}
