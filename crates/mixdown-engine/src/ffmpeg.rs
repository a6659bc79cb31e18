//! [`AudioEngine`] backed by the `ffmpeg` command-line tool.
//!
//! Each operation is one child process. Argument lists are built by pure
//! functions so they can be checked without a binary on the machine. Reports
//! (envelope levels, loudness JSON) are read from stderr.
//!
//! Outputs are written to a `.partial` sibling and renamed into place only
//! after the process exits cleanly, so a failed call leaves nothing at the
//! requested path.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use mixdown_core::crossfade::{CROSSFADE_OUTPUT_LABEL, CrossfadePlan};
use mixdown_core::envelope::RmsSample;
use mixdown_core::graph::{MIX_OUTPUT_LABEL, MixPlan, format_number};
use mixdown_core::loudness::{LoudnessMeasurement, LoudnessTargets};

use crate::error::EngineError;
use crate::ports::{AudioEngine, SignalRef, op};

const RMS_KEY: &str = "lavfi.astats.Overall.RMS_level";

/// Runs operations through an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
    sample_rate: u32,
}

impl FfmpegEngine {
    /// Engine using `binary` (a name on `PATH` or a full path).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            sample_rate: 48_000,
        }
    }

    /// Output and analysis sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Configured binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run with `args` and return stderr on a clean exit.
    async fn run(&self, operation: &'static str, args: &[String]) -> Result<String, EngineError> {
        tracing::debug!(operation, binary = %self.binary.display(), ?args, "spawning ffmpeg");
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_failure(operation, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            Ok(stderr)
        } else {
            Err(classify_failure(operation, output.status.code(), &stderr))
        }
    }

    /// Run a command that writes `output`, via a partial file.
    async fn run_to_file(
        &self,
        operation: &'static str,
        output: &str,
        build: impl FnOnce(&str) -> Vec<String>,
    ) -> Result<SignalRef, EngineError> {
        let target = Path::new(output);
        let partial = partial_path(target);
        let partial_str = partial.to_string_lossy().into_owned();
        let args = build(&partial_str);

        if let Err(e) = self.run(operation, &args).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, target)
            .await
            .map_err(|e| EngineError::transient(operation, format!("rename {partial_str}: {e}")))?;
        Ok(output.to_string())
    }
}

#[async_trait]
impl AudioEngine for FfmpegEngine {
    async fn analyze_envelope(
        &self,
        source: &str,
        hop_sec: f64,
    ) -> Result<Vec<RmsSample>, EngineError> {
        if !(hop_sec.is_finite() && hop_sec > 0.0) {
            return Err(EngineError::malformed(
                op::ANALYZE_ENVELOPE,
                format!("hop must be positive, got {hop_sec}"),
            ));
        }
        let args = envelope_args(source, hop_sec, self.sample_rate);
        let stderr = self.run(op::ANALYZE_ENVELOPE, &args).await?;
        Ok(parse_rms_levels(&stderr, hop_sec))
    }

    async fn render(&self, plan: &MixPlan, output: &str) -> Result<SignalRef, EngineError> {
        let sample_rate = self.sample_rate;
        self.run_to_file(op::RENDER, output, |out| {
            render_args(plan, out, sample_rate)
        })
        .await
    }

    async fn measure_loudness(
        &self,
        source: &str,
        targets: &LoudnessTargets,
    ) -> Result<String, EngineError> {
        self.run(op::MEASURE_LOUDNESS, &measure_args(source, targets))
            .await
    }

    async fn normalize_loudness(
        &self,
        source: &str,
        targets: &LoudnessTargets,
        measured: &LoudnessMeasurement,
        output: &str,
    ) -> Result<SignalRef, EngineError> {
        let sample_rate = self.sample_rate;
        self.run_to_file(op::NORMALIZE_LOUDNESS, output, |out| {
            normalize_args(source, targets, measured, out, sample_rate)
        })
        .await
    }

    async fn crossfade_concat(
        &self,
        plan: &CrossfadePlan,
        output: &str,
    ) -> Result<SignalRef, EngineError> {
        if plan.sources.is_empty() {
            return Err(EngineError::malformed(op::CROSSFADE_CONCAT, "no sources"));
        }
        let sample_rate = self.sample_rate;
        self.run_to_file(op::CROSSFADE_CONCAT, output, |out| {
            concat_args(plan, out, sample_rate)
        })
        .await
    }
}

// ── Argument builders ────────────────────────────────────────────────────────

fn base_args() -> Vec<String> {
    vec!["-hide_banner".into(), "-nostdin".into()]
}

fn push_inputs<'a>(args: &mut Vec<String>, sources: impl IntoIterator<Item = &'a str>) {
    for source in sources {
        args.push("-i".into());
        args.push(source.to_string());
    }
}

/// Samples per hop at `sample_rate`, at least one.
pub fn hop_samples(hop_sec: f64, sample_rate: u32) -> u64 {
    ((hop_sec * f64::from(sample_rate)).round() as u64).max(1)
}

/// Arguments for per-hop RMS analysis printed to stderr.
pub fn envelope_args(source: &str, hop_sec: f64, sample_rate: u32) -> Vec<String> {
    let mut args = base_args();
    args.push("-nostats".into());
    push_inputs(&mut args, [source]);
    args.push("-af".into());
    args.push(format!(
        "aresample={sample_rate},asetnsamples=n={}:p=0,astats=metadata=1:reset=1,ametadata=print:key={RMS_KEY}",
        hop_samples(hop_sec, sample_rate)
    ));
    args.extend(["-f".into(), "null".into(), "-".into()]);
    args
}

/// Arguments that execute a mix plan into `output`.
pub fn render_args(plan: &MixPlan, output: &str, sample_rate: u32) -> Vec<String> {
    let mut args = base_args();
    args.push("-y".into());
    match plan {
        MixPlan::PassThrough { dialogue } => {
            push_inputs(&mut args, [dialogue.source.as_str()]);
            args.extend(["-c".into(), "copy".into()]);
        }
        MixPlan::Graph(graph) => {
            push_inputs(&mut args, graph.inputs().iter().map(|i| i.source.as_str()));
            args.push("-filter_complex".into());
            args.push(graph.to_filter_script());
            args.push("-map".into());
            args.push(format!("[{}]", graph.output_label().unwrap_or(MIX_OUTPUT_LABEL)));
            args.push("-ar".into());
            args.push(sample_rate.to_string());
        }
    }
    args.push(output.to_string());
    args
}

fn loudnorm_targets(targets: &LoudnessTargets) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        format_number(targets.integrated_lufs),
        format_number(targets.true_peak_db),
        format_number(targets.lra)
    )
}

/// Arguments for the loudness measure pass.
pub fn measure_args(source: &str, targets: &LoudnessTargets) -> Vec<String> {
    let mut args = base_args();
    args.push("-nostats".into());
    push_inputs(&mut args, [source]);
    args.push("-af".into());
    args.push(format!("{}:print_format=json", loudnorm_targets(targets)));
    args.extend(["-f".into(), "null".into(), "-".into()]);
    args
}

/// Arguments for the loudness apply pass.
pub fn normalize_args(
    source: &str,
    targets: &LoudnessTargets,
    measured: &LoudnessMeasurement,
    output: &str,
    sample_rate: u32,
) -> Vec<String> {
    let mut args = base_args();
    args.push("-y".into());
    push_inputs(&mut args, [source]);
    args.push("-af".into());
    args.push(format!(
        "{}:measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}:linear=true:print_format=summary",
        loudnorm_targets(targets),
        format_number(measured.integrated_lufs),
        format_number(measured.true_peak_db),
        format_number(measured.lra),
        format_number(measured.threshold_db),
        format_number(measured.target_offset_db)
    ));
    args.push("-ar".into());
    args.push(sample_rate.to_string());
    args.push(output.to_string());
    args
}

/// Arguments for the sequential crossfade fold.
pub fn concat_args(plan: &CrossfadePlan, output: &str, sample_rate: u32) -> Vec<String> {
    let mut args = base_args();
    args.push("-y".into());
    push_inputs(&mut args, plan.sources.iter().map(String::as_str));
    args.push("-filter_complex".into());
    args.push(plan.describe().to_script());
    args.push("-map".into());
    args.push(format!("[{CROSSFADE_OUTPUT_LABEL}]"));
    args.push("-ar".into());
    args.push(sample_rate.to_string());
    args.push(output.to_string());
    args
}

/// `dir/name.partial.ext` next to `target`; the extension is kept so the
/// muxer is still chosen from it.
pub fn partial_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem}.partial.{}", ext.to_string_lossy()),
        None => format!("{stem}.partial"),
    };
    target.with_file_name(name)
}

// ── Report parsing ───────────────────────────────────────────────────────────

/// Reads `lavfi.astats.Overall.RMS_level=<v>` lines in order. Sample `i`
/// starts at `i · hop_sec`. `-inf` (digital silence) is kept as-is. A value
/// that does not parse still occupies its hop as a NaN sample, which ducks
/// nothing, so later hops keep their position.
pub fn parse_rms_levels(stderr: &str, hop_sec: f64) -> Vec<RmsSample> {
    stderr
        .lines()
        .filter_map(|line| {
            let pos = line.find(RMS_KEY)?;
            let value = line[pos + RMS_KEY.len()..].trim_start_matches('=').trim();
            Some(value.parse::<f64>().unwrap_or(f64::NAN))
        })
        .enumerate()
        .map(|(i, rms_db)| RmsSample {
            t: i as f64 * hop_sec,
            rms_db,
        })
        .collect()
}

// ── Failure classification ───────────────────────────────────────────────────

fn spawn_failure(operation: &'static str, e: std::io::Error) -> EngineError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            EngineError::Unavailable {
                operation,
                source: e,
            }
        }
        _ => EngineError::transient(operation, format!("spawn failed: {e}")),
    }
}

/// Map a failed exit to an error class.
///
/// Killed by a signal: transient. Unparseable arguments or filters: malformed.
/// Resource exhaustion: transient. Anything else: rejected.
pub fn classify_failure(operation: &'static str, code: Option<i32>, stderr: &str) -> EngineError {
    let detail = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostic output")
        .to_string();

    let Some(code) = code else {
        return EngineError::transient(operation, format!("terminated by signal: {detail}"));
    };

    const MALFORMED: &[&str] = &[
        "Error parsing",
        "No such filter",
        "Invalid argument",
        "Unrecognized option",
        "Option not found",
    ];
    const TRANSIENT: &[&str] = &[
        "Resource temporarily unavailable",
        "Cannot allocate memory",
        "Device or resource busy",
    ];

    if MALFORMED.iter().any(|m| stderr.contains(m)) {
        EngineError::malformed(operation, format!("exit {code}: {detail}"))
    } else if TRANSIENT.iter().any(|m| stderr.contains(m)) {
        EngineError::transient(operation, format!("exit {code}: {detail}"))
    } else {
        EngineError::rejected(operation, format!("exit {code}: {detail}"))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_core::crossfade::{FadeCurve, SceneClip};
    use mixdown_core::envelope::{DuckSegment, DuckThresholds, duck_curve};
    use mixdown_core::graph::{AudioInput, GainDefaults, Role, build_mix_plan};

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args
            .iter()
            .position(|a| a == flag)
            .unwrap_or_else(|| panic!("{flag} present in {args:?}"));
        &args[pos + 1]
    }

    #[test]
    fn hop_samples_round_and_floor_at_one() {
        assert_eq!(hop_samples(0.05, 48_000), 2400);
        assert_eq!(hop_samples(0.1, 44_100), 4410);
        assert_eq!(hop_samples(1e-9, 48_000), 1);
    }

    #[test]
    fn envelope_args_chain() {
        let args = envelope_args("dlg.wav", 0.05, 48_000);
        assert_eq!(value_after(&args, "-i"), "dlg.wav");
        let chain = value_after(&args, "-af");
        assert!(chain.starts_with("aresample=48000,asetnsamples=n=2400:p=0,astats="));
        assert!(chain.ends_with(RMS_KEY));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn pass_through_copies() {
        let plan = build_mix_plan(
            &[AudioInput::new(Role::Dialogue, "dlg.wav")],
            &[],
            &GainDefaults::default(),
        )
        .unwrap();
        let args = render_args(&plan, "out.wav", 48_000);
        assert_eq!(value_after(&args, "-c"), "copy");
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.wav"));
    }

    #[test]
    fn graph_render_maps_output_label() {
        let inputs = [
            AudioInput::new(Role::Dialogue, "dlg.wav"),
            AudioInput::new(Role::Music, "music.wav"),
        ];
        let ducks = [DuckSegment {
            t0: 0.0,
            t1: 0.05,
            duck_db: -7.0,
        }];
        let plan = build_mix_plan(&inputs, &ducks, &GainDefaults::default()).unwrap();
        let args = render_args(&plan, "premix.wav", 44_100);

        let inputs: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(inputs, ["dlg.wav", "music.wav"]);
        assert!(value_after(&args, "-filter_complex").contains("[out]"));
        assert_eq!(value_after(&args, "-map"), "[out]");
        assert_eq!(value_after(&args, "-ar"), "44100");
    }

    #[test]
    fn measure_args_request_json() {
        let args = measure_args("premix.wav", &LoudnessTargets::default());
        assert_eq!(
            value_after(&args, "-af"),
            "loudnorm=I=-16:TP=-1:LRA=11:print_format=json"
        );
    }

    #[test]
    fn normalize_args_carry_all_five_measurements() {
        let args = normalize_args(
            "premix.wav",
            &LoudnessTargets::default(),
            &LoudnessMeasurement::SENTINEL,
            "final.wav",
            48_000,
        );
        let chain = value_after(&args, "-af");
        for part in [
            "measured_I=-24",
            "measured_TP=-2",
            "measured_LRA=7",
            "measured_thresh=-34",
            "offset=0",
            "linear=true",
        ] {
            assert!(chain.contains(part), "{part} missing from {chain}");
        }
        assert_eq!(args.last().map(String::as_str), Some("final.wav"));
    }

    #[test]
    fn concat_args_fold_in_order() {
        let clips = [
            SceneClip::new("a", "a.wav", 10.0),
            SceneClip::new("b", "b.wav", 8.0),
            SceneClip::new("c", "c.wav", 12.0),
        ];
        let plan = CrossfadePlan::new(&clips, 1.5, FadeCurve::QuarterSine);
        let args = concat_args(&plan, "episode.wav", 48_000);
        let script = value_after(&args, "-filter_complex");
        assert_eq!(script.matches("acrossfade").count(), 2);
        assert!(script.contains("d=1.5:c1=qsin:c2=qsin"));
        assert_eq!(value_after(&args, "-map"), "[out]");
    }

    #[test]
    fn partial_path_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("/tmp/ep/episode.wav")),
            PathBuf::from("/tmp/ep/episode.partial.wav")
        );
        assert_eq!(partial_path(Path::new("raw")), PathBuf::from("raw.partial"));
    }

    #[test]
    fn parses_rms_lines_including_silence() {
        let stderr = "\
[Parsed_ametadata_3 @ 0x1] frame:0    pts:0       pts_time:0
[Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level=-25.500000
[Parsed_ametadata_3 @ 0x1] frame:1    pts:2400    pts_time:0.05
[Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level=-inf
[Parsed_ametadata_3 @ 0x1] frame:2    pts:4800    pts_time:0.1
[Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level=-38.25
";
        let samples = parse_rms_levels(stderr, 0.05);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].rms_db, -25.5);
        assert_eq!(samples[1].rms_db, f64::NEG_INFINITY);
        assert!((samples[2].t - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unparseable_level_keeps_later_ducks_in_place() {
        let stderr = "\
lavfi.astats.Overall.RMS_level=-60
lavfi.astats.Overall.RMS_level=nan
lavfi.astats.Overall.RMS_level=garbage
lavfi.astats.Overall.RMS_level=-10
";
        let samples = parse_rms_levels(stderr, 0.1);
        assert_eq!(samples.len(), 4);
        assert!(samples[1].rms_db.is_nan());
        assert!(samples[2].rms_db.is_nan());

        let curve = duck_curve(&samples, 0.1, &DuckThresholds::default()).unwrap();
        assert_eq!(curve.len(), 1);
        assert!((curve[0].t0 - 0.3).abs() < 1e-12);
        assert!((curve[0].t1 - 0.4).abs() < 1e-12);
        assert_eq!(curve[0].duck_db, -7.0);
    }

    #[test]
    fn failure_classes() {
        let err = classify_failure("render", Some(234), "[AVFilterGraph] No such filter: 'vol'\n");
        assert_eq!(err.kind(), "malformed_request");

        let err = classify_failure("render", None, "");
        assert_eq!(err.kind(), "transient");

        let err = classify_failure("render", Some(1), "in.wav: No such file or directory\n");
        assert_eq!(err.kind(), "rejected");
        assert!(err.to_string().contains("No such file or directory"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let engine = FfmpegEngine::new("/nonexistent/mixdown-ffmpeg");
        let err = engine
            .measure_loudness("x.wav", &LoudnessTargets::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "engine_unavailable");
        assert!(!err.is_retryable());
    }
}
