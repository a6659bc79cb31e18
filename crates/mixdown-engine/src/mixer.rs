//! Per-scene mixing and parallel scene batches.
//!
//! # Scene pipeline
//!
//! 1. Structural check of the scene id, inputs and hop size (no engine call
//!    happens before this passes)
//! 2. Dialogue envelope analysis and duck curve, when a music bed is present
//! 3. Mix plan construction and graph validation; any error stops the scene
//! 4. Render, then two-pass loudness normalization; the premix is removed
//! 5. Manifest assembly and best-effort publish
//!
//! Scenes share nothing mutable. A batch runs every scene as its own task in a
//! [`JoinSet`]; one scene failing or being aborted leaves the others alone.

use std::sync::Arc;

use mixdown_core::envelope::{DuckSegment, DuckThresholds, duck_curve};
use mixdown_core::graph::{
    AudioInput, GainDefaults, MixPlan, Role, build_mix_plan, validate_description,
};
use mixdown_core::loudness::{LoudnessTargets, MeasurementSource};
use mixdown_core::validation::Issue;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::MixError;
use crate::normalize::LoudnessNormalizer;
use crate::ports::{ArtifactStore, AudioEngine, SignalRef, op};
use crate::retry::RetryPolicy;
use crate::store::is_plain_name;

/// One scene's mix request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixRequest {
    /// Scene identifier.
    pub scene_id: String,
    /// Dialogue source. Required.
    pub dialogue: Option<String>,
    /// Music bed source.
    #[serde(default)]
    pub music: Option<String>,
    /// Ambience bed source.
    #[serde(default)]
    pub ambience: Option<String>,
    /// Music gain override in dB.
    #[serde(default)]
    pub music_gain_db: Option<f64>,
    /// Ambience gain override in dB.
    #[serde(default)]
    pub ambience_gain_db: Option<f64>,
    /// Loudness target override.
    #[serde(default)]
    pub loudness: Option<LoudnessTargets>,
    /// Final output location. Defaults to `<scene_id>.wav` in the work dir.
    #[serde(default)]
    pub output: Option<String>,
}

impl MixRequest {
    /// Request with dialogue only.
    pub fn new(scene_id: impl Into<String>, dialogue: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            dialogue: Some(dialogue.into()),
            music: None,
            ambience: None,
            music_gain_db: None,
            ambience_gain_db: None,
            loudness: None,
            output: None,
        }
    }

    /// Adds a music bed.
    pub fn with_music(mut self, source: impl Into<String>) -> Self {
        self.music = Some(source.into());
        self
    }

    /// Adds an ambience bed.
    pub fn with_ambience(mut self, source: impl Into<String>) -> Self {
        self.ambience = Some(source.into());
        self
    }

    /// Role-tagged inputs in request order.
    pub fn inputs(&self) -> Vec<AudioInput> {
        let mut inputs = Vec::with_capacity(3);
        if let Some(src) = &self.dialogue {
            inputs.push(AudioInput::new(Role::Dialogue, src.clone()));
        }
        if let Some(src) = &self.music {
            let mut input = AudioInput::new(Role::Music, src.clone());
            input.gain_db = self.music_gain_db;
            inputs.push(input);
        }
        if let Some(src) = &self.ambience {
            let mut input = AudioInput::new(Role::Ambience, src.clone());
            input.gain_db = self.ambience_gain_db;
            inputs.push(input);
        }
        inputs
    }
}

/// Record of a finished scene mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixManifest {
    /// Scene identifier.
    pub scene_id: String,
    /// Inputs used, with resolved gains.
    pub inputs: Vec<AudioInput>,
    /// Operation names in application order.
    pub operations: Vec<String>,
    /// Final integrated loudness in LUFS, if verification parsed.
    pub integrated_lufs: Option<f64>,
    /// Final true peak in dBTP, if verification parsed.
    pub true_peak_db: Option<f64>,
    /// Whether pass 2 used measured values or the sentinel.
    pub measurement_source: MeasurementSource,
    /// Normalized output signal.
    pub output: SignalRef,
    /// Non-fatal findings from graph validation.
    #[serde(default)]
    pub warnings: Vec<Issue>,
    /// Side effects that failed without failing the mix.
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// Tunables shared by every scene in a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixSettings {
    /// Default bed gains.
    pub gains: GainDefaults,
    /// Duck threshold table.
    pub thresholds: DuckThresholds,
    /// Envelope hop in seconds.
    pub hop_sec: f64,
    /// Default loudness targets.
    pub targets: LoudnessTargets,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            gains: GainDefaults::default(),
            thresholds: DuckThresholds::default(),
            hop_sec: 0.05,
            targets: LoudnessTargets::default(),
        }
    }
}

/// Mixes scenes through an injected engine.
#[derive(Clone)]
pub struct Mixer {
    engine: Arc<dyn AudioEngine>,
    store: Option<Arc<dyn ArtifactStore>>,
    normalizer: LoudnessNormalizer,
    policy: RetryPolicy,
    settings: MixSettings,
    work_dir: String,
}

impl Mixer {
    /// Creates a mixer writing intermediates under `work_dir`.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        policy: RetryPolicy,
        settings: MixSettings,
        work_dir: impl Into<String>,
    ) -> Self {
        Self {
            normalizer: LoudnessNormalizer::new(Arc::clone(&engine), policy),
            engine,
            store: None,
            policy,
            settings,
            work_dir: work_dir.into(),
        }
    }

    /// Publishes each scene manifest to `store`.
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn work_path(&self, file: &str) -> String {
        let dir = self.work_dir.trim_end_matches('/');
        if dir.is_empty() {
            file.to_string()
        } else {
            format!("{dir}/{file}")
        }
    }

    /// Mix one scene.
    ///
    /// # Errors
    ///
    /// Structural and graph-validation errors fail before the first engine
    /// call. Engine failures surface after retries.
    pub async fn mix_scene(&self, request: &MixRequest) -> Result<MixManifest, MixError> {
        let scene_id = request.scene_id.as_str();
        if !is_plain_name(scene_id) {
            return Err(MixError::InvalidSceneId {
                scene_id: scene_id.to_string(),
            });
        }
        let inputs = request.inputs();
        build_mix_plan(&inputs, &[], &self.settings.gains).map_err(|source| {
            MixError::Structure {
                scene_id: scene_id.to_string(),
                source,
            }
        })?;
        if request.music.is_some() {
            duck_curve(&[], self.settings.hop_sec, &self.settings.thresholds).map_err(
                |source| MixError::Curve {
                    scene_id: scene_id.to_string(),
                    source,
                },
            )?;
        }
        tracing::info!(scene = scene_id, inputs = inputs.len(), "mixing scene");

        let ducks = if request.music.is_some() {
            self.duck_segments(request).await?
        } else {
            Vec::new()
        };

        let plan = build_mix_plan(&inputs, &ducks, &self.settings.gains).map_err(|source| {
            MixError::Structure {
                scene_id: scene_id.to_string(),
                source,
            }
        })?;

        let mut warnings = Vec::new();
        if let MixPlan::Graph(graph) = &plan {
            let report = validate_description(&graph.describe());
            if !report.valid {
                return Err(MixError::InvalidGraph {
                    scene_id: scene_id.to_string(),
                    report,
                });
            }
            warnings = report.warnings;
        }

        let engine = &*self.engine;
        let premix_path = self.work_path(&format!("{scene_id}.premix.wav"));
        let premix = premix_path.as_str();
        let plan_ref = &plan;
        let rendered = self
            .policy
            .call(op::RENDER, move || engine.render(plan_ref, premix))
            .await
            .map_err(|source| MixError::Engine {
                scene_id: scene_id.to_string(),
                source,
            })?;

        let targets = request.loudness.unwrap_or(self.settings.targets);
        let output = request
            .output
            .clone()
            .unwrap_or_else(|| self.work_path(&format!("{scene_id}.wav")));
        let outcome = self
            .normalizer
            .normalize(&rendered, &targets, &output)
            .await;
        if rendered == premix_path && output != premix_path {
            remove_intermediate(scene_id, &premix_path).await;
        }
        let outcome = outcome.map_err(|source| MixError::Engine {
            scene_id: scene_id.to_string(),
            source,
        })?;

        let mut operations: Vec<String> =
            plan.operation_names().into_iter().map(str::to_string).collect();
        operations.push("loudnorm".to_string());

        let mut manifest = MixManifest {
            scene_id: scene_id.to_string(),
            inputs: plan.inputs().into_iter().cloned().collect(),
            operations,
            integrated_lufs: outcome.verified.map(|r| r.integrated_lufs),
            true_peak_db: outcome.verified.map(|r| r.true_peak_db),
            measurement_source: outcome.measurement_source,
            output: outcome.output,
            warnings,
            skipped: Vec::new(),
        };

        self.publish(&mut manifest).await;
        tracing::info!(
            scene = scene_id,
            integrated_lufs = ?manifest.integrated_lufs,
            skipped = manifest.skipped.len(),
            "scene mixed"
        );
        Ok(manifest)
    }

    async fn duck_segments(&self, request: &MixRequest) -> Result<Vec<DuckSegment>, MixError> {
        let scene_id = request.scene_id.as_str();
        let Some(dialogue) = request.dialogue.as_deref() else {
            return Ok(Vec::new());
        };
        let hop = self.settings.hop_sec;
        let engine = &*self.engine;
        let samples = self
            .policy
            .call(op::ANALYZE_ENVELOPE, move || {
                engine.analyze_envelope(dialogue, hop)
            })
            .await
            .map_err(|source| MixError::Engine {
                scene_id: scene_id.to_string(),
                source,
            })?;
        duck_curve(&samples, hop, &self.settings.thresholds).map_err(|source| MixError::Curve {
            scene_id: scene_id.to_string(),
            source,
        })
    }

    async fn publish(&self, manifest: &mut MixManifest) {
        let Some(store) = &self.store else {
            return;
        };
        let value = match serde_json::to_value(&*manifest) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(scene = %manifest.scene_id, error = %e, "manifest not encodable");
                manifest.skipped.push(format!("publish_manifest: {e}"));
                return;
            }
        };
        if let Err(e) = store.publish_manifest(&manifest.scene_id, &value).await {
            tracing::warn!(scene = %manifest.scene_id, error = %e, "manifest publish skipped");
            manifest.skipped.push(format!("publish_manifest: {e}"));
        }
    }

    /// Spawn one scene as its own task. Abort the handle to cancel just that scene.
    pub fn spawn_scene(&self, request: MixRequest) -> JoinHandle<Result<MixManifest, MixError>> {
        let mixer = self.clone();
        tokio::spawn(async move { mixer.mix_scene(&request).await })
    }

    /// Mix every request in parallel.
    ///
    /// Results come back in request order, one per request, successes and
    /// failures side by side.
    pub async fn mix_batch(&self, requests: Vec<MixRequest>) -> Vec<Result<MixManifest, MixError>> {
        let scene_ids: Vec<String> = requests.iter().map(|r| r.scene_id.clone()).collect();
        let mut set = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let mixer = self.clone();
            set.spawn(async move { (index, mixer.mix_scene(&request).await) });
        }

        let mut slots: Vec<Option<Result<MixManifest, MixError>>> =
            std::iter::repeat_with(|| None).take(scene_ids.len()).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::warn!(error = %e, "scene task ended abnormally"),
            }
        }

        slots
            .into_iter()
            .zip(scene_ids)
            .map(|(slot, scene_id)| slot.unwrap_or(Err(MixError::Cancelled { scene_id })))
            .collect()
    }
}

async fn remove_intermediate(scene_id: &str, path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(scene = scene_id, path, "removed premix"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(scene = scene_id, path, error = %e, "premix not removed"),
    }
}
