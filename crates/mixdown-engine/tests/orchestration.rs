//! Orchestration tests against a scripted in-memory engine.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mixdown_core::crossfade::{CrossfadePlan, SceneClip};
use mixdown_core::envelope::RmsSample;
use mixdown_core::graph::MixPlan;
use mixdown_core::loudness::{LoudnessMeasurement, LoudnessTargets, MeasurementSource};
use mixdown_engine::ports::op;
use mixdown_engine::{
    ArtifactStore, AudioEngine, EngineError, ExportRequest, Exporter, FsArtifactStore,
    LoudnessNormalizer, MixRequest, MixSettings, Mixer, RetryPolicy, SignalRef, StoreError,
};

const MEASURE_REPORT: &str = r#"[Parsed_loudnorm_0 @ 0x1]
{
    "input_i" : "-27.61",
    "input_tp" : "-4.47",
    "input_lra" : "18.10",
    "input_thresh" : "-39.20",
    "target_offset" : "0.58"
}"#;

const VERIFY_REPORT: &str = r#"{
    "input_i" : "-16.02",
    "input_tp" : "-1.10",
    "input_lra" : "9.00",
    "input_thresh" : "-26.10",
    "target_offset" : "0.02"
}"#;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Fail {
    /// Fail this many times with a transient error, then succeed.
    Transient(u32),
    /// Always reject.
    Reject,
    /// Never return.
    Hang,
}

#[derive(Default)]
struct FakeEngine {
    levels: Vec<f64>,
    measure_report: Option<String>,
    verify_report: Option<String>,
    failures: Mutex<HashMap<&'static str, Fail>>,
    calls: Mutex<Vec<&'static str>>,
    rendered: Mutex<Vec<MixPlan>>,
    applied: Mutex<Vec<LoudnessMeasurement>>,
    normalized: Mutex<HashSet<String>>,
    concatenated: Mutex<Vec<CrossfadePlan>>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            levels: vec![-20.0, -35.0, -50.0],
            ..Self::default()
        }
    }

    fn failing(self, operation: &'static str, fail: Fail) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, fail);
        self
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| **c == operation).count()
    }

    async fn enter(&self, operation: &'static str) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(operation);
        let fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(operation) {
                Some(Fail::Transient(0)) | None => None,
                Some(Fail::Transient(n)) => {
                    *n -= 1;
                    Some(Fail::Transient(*n))
                }
                Some(other) => Some(*other),
            }
        };
        match fail {
            None => Ok(()),
            Some(Fail::Transient(_)) => Err(EngineError::transient(operation, "engine busy")),
            Some(Fail::Reject) => Err(EngineError::rejected(operation, "refused")),
            Some(Fail::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn analyze_envelope(
        &self,
        _source: &str,
        hop_sec: f64,
    ) -> Result<Vec<RmsSample>, EngineError> {
        self.enter(op::ANALYZE_ENVELOPE).await?;
        Ok(self
            .levels
            .iter()
            .enumerate()
            .map(|(i, &rms_db)| RmsSample {
                t: i as f64 * hop_sec,
                rms_db,
            })
            .collect())
    }

    async fn render(&self, plan: &MixPlan, output: &str) -> Result<SignalRef, EngineError> {
        self.enter(op::RENDER).await?;
        self.rendered.lock().unwrap().push(plan.clone());
        Ok(output.to_string())
    }

    async fn measure_loudness(
        &self,
        source: &str,
        _targets: &LoudnessTargets,
    ) -> Result<String, EngineError> {
        self.enter(op::MEASURE_LOUDNESS).await?;
        let verifying = self.normalized.lock().unwrap().contains(source);
        let report = if verifying {
            self.verify_report.as_deref().unwrap_or(VERIFY_REPORT)
        } else {
            self.measure_report.as_deref().unwrap_or(MEASURE_REPORT)
        };
        Ok(report.to_string())
    }

    async fn normalize_loudness(
        &self,
        _source: &str,
        _targets: &LoudnessTargets,
        measured: &LoudnessMeasurement,
        output: &str,
    ) -> Result<SignalRef, EngineError> {
        self.enter(op::NORMALIZE_LOUDNESS).await?;
        self.applied.lock().unwrap().push(*measured);
        self.normalized.lock().unwrap().insert(output.to_string());
        Ok(output.to_string())
    }

    async fn crossfade_concat(
        &self,
        plan: &CrossfadePlan,
        output: &str,
    ) -> Result<SignalRef, EngineError> {
        self.enter(op::CROSSFADE_CONCAT).await?;
        self.concatenated.lock().unwrap().push(plan.clone());
        Ok(output.to_string())
    }
}

#[derive(Default)]
struct RecordingStore {
    fail: bool,
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn publish_manifest(
        &self,
        name: &str,
        manifest: &serde_json::Value,
    ) -> Result<String, StoreError> {
        if self.fail {
            return Err(StoreError::Unavailable("bucket offline".into()));
        }
        self.published
            .lock()
            .unwrap()
            .push((name.to_string(), manifest.clone()));
        Ok(format!("mem://{name}"))
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        timeout: Duration::from_secs(5),
    }
}

fn mixer(engine: &Arc<FakeEngine>) -> Mixer {
    Mixer::new(
        Arc::clone(engine) as Arc<dyn AudioEngine>,
        fast_policy(),
        MixSettings::default(),
        "work",
    )
}

// ---------------------------------------------------------------------------
// Scene mixing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dialogue_only_scene_passes_through() {
    let engine = Arc::new(FakeEngine::new());
    let manifest = mixer(&engine)
        .mix_scene(&MixRequest::new("s1", "dlg.wav"))
        .await
        .unwrap();

    assert_eq!(
        engine.calls(),
        [
            op::RENDER,
            op::MEASURE_LOUDNESS,
            op::NORMALIZE_LOUDNESS,
            op::MEASURE_LOUDNESS
        ]
    );
    assert!(engine.rendered.lock().unwrap()[0].is_pass_through());
    assert_eq!(manifest.operations, ["copy", "loudnorm"]);
    assert_eq!(manifest.output, "work/s1.wav");
    assert_eq!(manifest.measurement_source, MeasurementSource::Measured);
    assert_eq!(manifest.integrated_lufs, Some(-16.02));
    assert_eq!(manifest.true_peak_db, Some(-1.10));
    assert!(manifest.skipped.is_empty());
}

#[tokio::test]
async fn music_bed_is_ducked_under_dialogue() {
    let engine = Arc::new(FakeEngine::new());
    let manifest = mixer(&engine)
        .mix_scene(&MixRequest::new("s2", "dlg.wav").with_music("bed.wav"))
        .await
        .unwrap();

    assert_eq!(engine.calls()[0], op::ANALYZE_ENVELOPE);
    // -20 dB ducks by 7, -35 dB by 3, -50 dB not at all.
    assert_eq!(manifest.operations, ["gain", "duck", "duck", "mix", "loudnorm"]);
    let music = &manifest.inputs[1];
    assert_eq!(music.source, "bed.wav");
    assert_eq!(music.gain_db, Some(-12.0));

    let rendered = engine.rendered.lock().unwrap();
    let MixPlan::Graph(graph) = &rendered[0] else {
        panic!("expected a graph render");
    };
    let script = graph.to_filter_script();
    assert!(script.contains("enable='between(t,0,0.05)':volume=-7dB"), "{script}");
    assert!(script.contains("volume=-3dB"), "{script}");
}

#[tokio::test]
async fn ambience_gain_override_is_recorded() {
    let engine = Arc::new(FakeEngine::new());
    let mut request = MixRequest::new("s3", "dlg.wav").with_ambience("room.wav");
    request.ambience_gain_db = Some(-24.0);
    let manifest = mixer(&engine).mix_scene(&request).await.unwrap();

    assert_eq!(engine.count(op::ANALYZE_ENVELOPE), 0);
    assert_eq!(manifest.inputs[1].gain_db, Some(-24.0));
    assert_eq!(manifest.operations, ["gain", "mix", "loudnorm"]);
}

#[tokio::test]
async fn unparseable_measurement_falls_back_to_sentinel() {
    let engine = Arc::new(FakeEngine {
        measure_report: Some("loudnorm: nothing useful here".into()),
        ..FakeEngine::new()
    });
    let manifest = mixer(&engine)
        .mix_scene(&MixRequest::new("s4", "dlg.wav"))
        .await
        .unwrap();

    assert_eq!(manifest.measurement_source, MeasurementSource::Sentinel);
    assert_eq!(
        engine.applied.lock().unwrap()[0],
        LoudnessMeasurement::SENTINEL
    );
    assert_eq!(manifest.integrated_lufs, Some(-16.02));
}

#[tokio::test]
async fn missing_dialogue_fails_before_any_engine_call() {
    let engine = Arc::new(FakeEngine::new());
    let mut request = MixRequest::new("s5", "unused.wav").with_music("bed.wav");
    request.dialogue = None;
    let err = mixer(&engine).mix_scene(&request).await.unwrap_err();

    assert_eq!(err.kind(), "missing_dialogue");
    assert_eq!(err.scene_id(), "s5");
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn invalid_hop_fails_before_any_engine_call() {
    let engine = Arc::new(FakeEngine::new());
    let settings = MixSettings {
        hop_sec: 0.0,
        ..MixSettings::default()
    };
    let mixer = Mixer::new(engine.clone(), fast_policy(), settings, "work");
    let err = mixer
        .mix_scene(&MixRequest::new("s6", "dlg.wav").with_music("bed.wav"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "invalid_hop");
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn scene_id_with_path_separator_is_rejected() {
    let engine = Arc::new(FakeEngine::new());
    let err = mixer(&engine)
        .mix_scene(&MixRequest::new("../escape", "dlg.wav"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "invalid_scene_id");
    assert_eq!(err.scene_id(), "../escape");
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn premix_is_removed_after_normalization() {
    let dir = tempfile::TempDir::new().unwrap();
    let premix = dir.path().join("s12.premix.wav");
    std::fs::write(&premix, b"RIFF").unwrap();
    let engine = Arc::new(FakeEngine::new());
    let mixer = Mixer::new(
        engine.clone(),
        fast_policy(),
        MixSettings::default(),
        dir.path().display().to_string(),
    );
    let manifest = mixer
        .mix_scene(&MixRequest::new("s12", "dlg.wav").with_music("bed.wav"))
        .await
        .unwrap();

    assert!(manifest.output.ends_with("s12.wav"));
    assert!(!premix.exists());
}

#[tokio::test]
async fn transient_render_failures_are_retried() {
    let engine = Arc::new(FakeEngine::new().failing(op::RENDER, Fail::Transient(2)));
    let manifest = mixer(&engine)
        .mix_scene(&MixRequest::new("s7", "dlg.wav"))
        .await
        .unwrap();

    assert_eq!(engine.count(op::RENDER), 3);
    assert_eq!(manifest.scene_id, "s7");
}

#[tokio::test]
async fn rejected_render_is_not_retried() {
    let engine = Arc::new(FakeEngine::new().failing(op::RENDER, Fail::Reject));
    let err = mixer(&engine)
        .mix_scene(&MixRequest::new("s8", "dlg.wav"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "rejected");
    assert_eq!(engine.count(op::RENDER), 1);
    assert_eq!(engine.count(op::MEASURE_LOUDNESS), 0);
}

#[tokio::test]
async fn hung_measure_pass_times_out() {
    let engine = Arc::new(FakeEngine::new().failing(op::MEASURE_LOUDNESS, Fail::Hang));
    let policy = RetryPolicy {
        max_attempts: 2,
        timeout: Duration::from_millis(30),
        ..fast_policy()
    };
    let mixer = Mixer::new(engine.clone(), policy, MixSettings::default(), "work");
    let err = mixer
        .mix_scene(&MixRequest::new("s9", "dlg.wav"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "timeout");
    assert_eq!(engine.count(op::MEASURE_LOUDNESS), 2);
    assert_eq!(engine.count(op::NORMALIZE_LOUDNESS), 0);
}

#[tokio::test]
async fn publish_failure_is_recorded_not_fatal() {
    let engine = Arc::new(FakeEngine::new());
    let store = Arc::new(RecordingStore {
        fail: true,
        ..RecordingStore::default()
    });
    let manifest = mixer(&engine)
        .with_store(store)
        .mix_scene(&MixRequest::new("s10", "dlg.wav"))
        .await
        .unwrap();

    assert_eq!(manifest.skipped.len(), 1);
    assert!(manifest.skipped[0].contains("bucket offline"));
}

#[tokio::test]
async fn manifest_is_published_to_filesystem() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let store = Arc::new(FsArtifactStore::new(dir.path()));
    let manifest = mixer(&engine)
        .with_store(store)
        .mix_scene(&MixRequest::new("s11", "dlg.wav").with_music("bed.wav"))
        .await
        .unwrap();

    let text = std::fs::read_to_string(dir.path().join("s11.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["scene_id"], "s11");
    assert_eq!(value["measurement_source"], "measured");
    assert_eq!(value["operations"].as_array().unwrap().len(), manifest.operations.len());
}

// ---------------------------------------------------------------------------
// Batches and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_keeps_request_order_and_isolates_failures() {
    let engine = Arc::new(FakeEngine::new());
    let mut broken = MixRequest::new("b", "x.wav");
    broken.dialogue = None;
    let requests = vec![
        MixRequest::new("a", "a.wav").with_music("bed.wav"),
        broken,
        MixRequest::new("c", "c.wav"),
    ];

    let results = mixer(&engine).mix_batch(requests).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().scene_id, "a");
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.scene_id(), "b");
    assert_eq!(err.kind(), "missing_dialogue");
    assert_eq!(results[2].as_ref().unwrap().scene_id, "c");
}

#[tokio::test]
async fn aborting_one_scene_leaves_others_running() {
    let hanging = Arc::new(FakeEngine::new().failing(op::RENDER, Fail::Hang));
    let healthy = Arc::new(FakeEngine::new());

    let stuck = mixer(&hanging).spawn_scene(MixRequest::new("stuck", "d.wav"));
    let fine = mixer(&healthy).spawn_scene(MixRequest::new("fine", "d.wav"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    stuck.abort();

    let joined = stuck.await;
    assert!(joined.unwrap_err().is_cancelled());
    let manifest = fine.await.unwrap().unwrap();
    assert_eq!(manifest.scene_id, "fine");
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn normalizer_runs_passes_in_order() {
    let engine = Arc::new(FakeEngine::new());
    let normalizer = LoudnessNormalizer::new(engine.clone(), fast_policy());
    let outcome = normalizer
        .normalize("premix.wav", &LoudnessTargets::default(), "final.wav")
        .await
        .unwrap();

    assert_eq!(
        engine.calls(),
        [op::MEASURE_LOUDNESS, op::NORMALIZE_LOUDNESS, op::MEASURE_LOUDNESS]
    );
    assert_eq!(outcome.output, "final.wav");
    assert_eq!(outcome.measurement.integrated_lufs, -27.61);
    assert_eq!(outcome.measurement.target_offset_db, 0.58);
    assert_eq!(engine.applied.lock().unwrap()[0], outcome.measurement);
}

#[tokio::test]
async fn unparseable_verification_leaves_reading_empty() {
    let engine = Arc::new(FakeEngine {
        verify_report: Some("no json".into()),
        ..FakeEngine::new()
    });
    let normalizer = LoudnessNormalizer::new(engine.clone(), fast_policy());
    let outcome = normalizer
        .normalize("premix.wav", &LoudnessTargets::default(), "final.wav")
        .await
        .unwrap();

    assert_eq!(outcome.measurement_source, MeasurementSource::Measured);
    assert!(outcome.verified.is_none());
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn episode() -> ExportRequest {
    ExportRequest {
        project_id: "ep-01".into(),
        scenes: vec![
            SceneClip::new("s1", "s1.wav", 10.0),
            SceneClip::new("s2", "s2.wav", 8.0),
            SceneClip::new("s3", "s3.wav", 12.0),
        ],
        crossfade_sec: None,
        output: "ep-01.wav".into(),
    }
}

#[tokio::test]
async fn export_lays_out_scenes_and_publishes() {
    let engine = Arc::new(FakeEngine::new());
    let store = Arc::new(RecordingStore::default());
    let exporter = Exporter::new(engine.clone(), fast_policy()).with_store(store.clone());

    let outcome = exporter.export(&episode()).await.unwrap();

    let offsets: Vec<f64> = outcome.manifest.scenes.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, [0.0, 8.5, 15.0]);
    assert_eq!(outcome.manifest.total_duration, 27.0);
    assert_eq!(outcome.manifest.crossfade_duration, 1.5);
    assert_eq!(outcome.published.as_deref(), Some("mem://ep-01"));

    assert_eq!(engine.count(op::CROSSFADE_CONCAT), 1);
    let plan = &engine.concatenated.lock().unwrap()[0];
    assert_eq!(plan.sources, ["s1.wav", "s2.wav", "s3.wav"]);
    assert_eq!(plan.fade_count(), 2);

    let published = store.published.lock().unwrap();
    assert_eq!(published[0].0, "ep-01");
    assert_eq!(published[0].1["scenes"][1]["offset"], 8.5);
}

#[tokio::test]
async fn export_crossfade_override_applies() {
    let engine = Arc::new(FakeEngine::new());
    let mut request = episode();
    request.crossfade_sec = Some(2.0);
    let outcome = Exporter::new(engine, fast_policy())
        .export(&request)
        .await
        .unwrap();

    let offsets: Vec<f64> = outcome.manifest.scenes.iter().map(|s| s.offset).collect();
    assert_eq!(offsets, [0.0, 8.0, 14.0]);
    assert_eq!(outcome.manifest.total_duration, 26.0);
    assert!(outcome.published.is_none());
}

#[tokio::test]
async fn failed_concat_publishes_nothing() {
    let engine = Arc::new(FakeEngine::new().failing(op::CROSSFADE_CONCAT, Fail::Reject));
    let store = Arc::new(RecordingStore::default());
    let exporter = Exporter::new(engine.clone(), fast_policy()).with_store(store.clone());

    let err = exporter.export(&episode()).await.unwrap_err();

    assert_eq!(err.kind(), "rejected");
    assert!(store.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_export_never_reaches_engine() {
    let engine = Arc::new(FakeEngine::new());
    let mut request = episode();
    request.scenes.clear();
    let err = Exporter::new(engine.clone(), fast_policy())
        .export(&request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "no_scenes");
    assert!(engine.calls().is_empty());
}
