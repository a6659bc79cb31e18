//! Integration tests for mixdown-cli.
//!
//! Every invocation passes `--config` pointing into a temp dir so the user's
//! own configuration never leaks into results.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Workspace with an empty (all-defaults) config file.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("mixdown.toml"), "").expect("write config");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    fn config(&self) -> PathBuf {
        self.path("mixdown.toml")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_mixdown"))
            .arg("--config")
            .arg(self.config())
            .args(args)
            .env("RUST_LOG", "warn")
            .output()
            .expect("failed to run mixdown")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

const CLEAN_TIMELINE: &str = r#"[
    {"type": "music_in", "cue_id": "A", "at": 0.0, "duck_db": -8},
    {"type": "dialogue_in", "line_id": "L1", "at": 1.0},
    {"type": "dialogue_out", "line_id": "L1", "at": 3.0},
    {"type": "music_out", "cue_id": "A", "at": 10.0}
]"#;

const ORPHAN_TIMELINE: &str = r#"[
    {"type": "music_in", "cue_id": "A", "at": 0.0},
    {"type": "music_out", "cue_id": "X", "at": 4.0},
    {"type": "music_out", "cue_id": "A", "at": 10.0}
]"#;

// ---------------------------------------------------------------------------
// timeline
// ---------------------------------------------------------------------------

#[test]
fn timeline_validate_accepts_clean_sheet() {
    let fx = Fixture::new();
    let file = fx.write("clean.json", CLEAN_TIMELINE);
    let output = fx.run(&["timeline", "validate", arg(&file)]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("valid"));
}

#[test]
fn timeline_validate_rejects_orphan_as_json() {
    let fx = Fixture::new();
    let file = fx.write("orphan.json", ORPHAN_TIMELINE);
    let output = fx.run(&["timeline", "validate", "--json", arg(&file)]);

    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["valid"], false);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "orphan");
}

#[test]
fn timeline_fix_drops_orphan_and_revalidates() {
    let fx = Fixture::new();
    let file = fx.write("orphan.json", ORPHAN_TIMELINE);
    let fixed = fx.path("fixed.json");
    let output = fx.run(&["timeline", "fix", arg(&file), "--output", arg(&fixed)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let events: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&fixed).unwrap()).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 2);

    let output = fx.run(&["timeline", "validate", arg(&fixed)]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));
}

// ---------------------------------------------------------------------------
// duck / offsets / graph
// ---------------------------------------------------------------------------

#[test]
fn duck_maps_levels_to_segments() {
    let fx = Fixture::new();
    let levels = fx.write("levels.json", "[-20, -35, -50]");
    let output = fx.run(&["duck", arg(&levels), "--hop", "0.1"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let segments: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let segments = segments.as_array().unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0]["duck_db"], -7.0);
    assert_eq!(segments[0]["t1"], 0.1);
    assert_eq!(segments[1]["duck_db"], -3.0);
}

#[test]
fn offsets_for_three_scenes() {
    let fx = Fixture::new();
    let scenes = fx.write(
        "scenes.json",
        r#"[
            {"scene_id": "s1", "source": "s1.wav", "duration_sec": 10.0},
            {"scene_id": "s2", "source": "s2.wav", "duration_sec": 8.0},
            {"scene_id": "s3", "source": "s3.wav", "duration_sec": 12.0}
        ]"#,
    );
    let output = fx.run(&["offsets", arg(&scenes), "--project", "ep-01"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let manifest: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(manifest["project_id"], "ep-01");
    assert_eq!(manifest["scenes"][1]["offset"], 8.5);
    assert_eq!(manifest["scenes"][2]["offset"], 15.0);
    assert_eq!(manifest["total_duration"], 27.0);
    assert_eq!(manifest["crossfade_duration"], 1.5);
}

#[test]
fn offsets_reject_empty_scene_list() {
    let fx = Fixture::new();
    let scenes = fx.write("scenes.json", "[]");
    let output = fx.run(&["offsets", arg(&scenes)]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no scenes"));
}

#[test]
fn graph_build_prints_filter_script() {
    let fx = Fixture::new();
    let output = fx.run(&[
        "graph",
        "build",
        "--dialogue",
        "dlg.wav",
        "--music",
        "bed.wav",
        "--music-gain",
        "-14",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let script = stdout(&output);
    assert!(script.contains("volume=-14dB"), "{script}");
    assert!(script.contains("amix=inputs=2"), "{script}");
    assert!(script.trim_end().ends_with("[out]"), "{script}");
}

#[test]
fn graph_build_without_dialogue_fails() {
    let fx = Fixture::new();
    let output = fx.run(&["graph", "build", "--music", "bed.wav"]);
    assert!(!output.status.success());
    assert!(stderr(&output).to_lowercase().contains("dialogue"));
}

#[test]
fn graph_validate_flags_undefined_label() {
    let fx = Fixture::new();
    let script = fx.write("graph.txt", "[0:a][ghost]amix=inputs=2[out]\n");
    let output = fx.run(&["graph", "validate", arg(&script)]);

    assert!(!output.status.success());
    assert!(stdout(&output).contains("undefined input label 'ghost'"));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_show_prints_effective_values() {
    let fx = Fixture::new();
    std::fs::write(fx.config(), "[loudness]\nintegrated_lufs = -23.0\n").unwrap();
    let output = fx.run(&["config", "show"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("[loudness]"));
    assert!(text.contains("integrated_lufs = -23.0"));
}

#[test]
fn config_rejects_invalid_values() {
    let fx = Fixture::new();
    std::fs::write(fx.config(), "[engine]\nsample_rate = 10\n").unwrap();
    let output = fx.run(&["config", "show"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("sample_rate"));
}

#[test]
fn oversized_engine_timeout_is_reported_not_panicked() {
    let fx = Fixture::new();
    std::fs::write(fx.config(), "[engine]\ntimeout_sec = 1e30\n").unwrap();
    let request = fx.write("scene.json", r#"{"scene_id": "s1", "dialogue": "dlg.wav"}"#);
    let output = fx.run(&["mix", arg(&request), "--work-dir", arg(fx.dir.path())]);

    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("engine.timeout_sec"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let fx = Fixture::new();
    let output = fx.run(&["config", "init"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--force"));

    let output = fx.run(&["config", "init", "--force"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let written = std::fs::read_to_string(fx.config()).unwrap();
    assert!(written.contains("[engine.retry]"));
}

// ---------------------------------------------------------------------------
// mix / export without an engine binary
// ---------------------------------------------------------------------------

#[test]
fn mix_reports_missing_engine() {
    let fx = Fixture::new();
    std::fs::write(
        fx.config(),
        "[engine]\nffmpeg_path = \"/nonexistent/mixdown-ffmpeg\"\n",
    )
    .unwrap();
    let request = fx.write(
        "scene.json",
        r#"{"scene_id": "s1", "dialogue": "dlg.wav"}"#,
    );
    let output = fx.run(&[
        "mix",
        arg(&request),
        "--work-dir",
        arg(fx.dir.path()),
    ]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("engine_unavailable"), "{}", stderr(&output));
}

#[test]
fn mix_rejects_missing_dialogue_before_engine() {
    let fx = Fixture::new();
    std::fs::write(
        fx.config(),
        "[engine]\nffmpeg_path = \"/nonexistent/mixdown-ffmpeg\"\n",
    )
    .unwrap();
    let request = fx.write("scene.json", r#"[{"scene_id": "s1", "music": "bed.wav"}]"#);
    let output = fx.run(&["mix", arg(&request)]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("missing_dialogue"), "{}", stderr(&output));
}

#[test]
fn export_with_no_scenes_fails_fast() {
    let fx = Fixture::new();
    let request = fx.write(
        "export.json",
        r#"{"project_id": "ep-01", "scenes": [], "output": "ep.wav"}"#,
    );
    let output = fx.run(&["export", arg(&request)]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("no_scenes"), "{}", stderr(&output));
}
