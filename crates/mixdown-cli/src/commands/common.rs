//! Shared CLI helpers used across multiple commands.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mixdown_config::{MixdownConfig, find_config};
use mixdown_core::validation::ValidationResult;
use mixdown_engine::{FfmpegEngine, MixSettings, RetryPolicy};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Load the effective configuration.
///
/// An explicit `--config` path must exist. Otherwise `./mixdown.toml` or the
/// user config is used when present, and defaults when neither is.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<MixdownConfig> {
    match find_config(explicit) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            MixdownConfig::load(&path)
                .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))
        }
        None => Ok(MixdownConfig::default()),
    }
}

/// Read a JSON document from a file, or stdin when `path` is `-`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?
    };
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("invalid JSON in {}: {}", path.display(), e))
}

/// Pretty-print `value` as JSON to stdout, or to `output` when given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text + "\n")
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e)),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Print a validation report for humans.
pub fn print_report(subject: &str, report: &ValidationResult) {
    if report.valid {
        println!("{subject}: valid");
    } else {
        println!("{subject}: {} error(s)", report.errors.len());
    }
    for issue in &report.errors {
        println!("  error   {:<22} {}", issue.code.as_str(), issue.message);
    }
    for issue in &report.warnings {
        println!("  warning {:<22} {}", issue.code.as_str(), issue.message);
    }
}

/// Retry policy from the `[engine]` section.
pub fn retry_policy(config: &MixdownConfig) -> anyhow::Result<RetryPolicy> {
    let retry = &config.engine.retry;
    let timeout = Duration::try_from_secs_f64(config.engine.timeout_sec).map_err(|e| {
        anyhow::anyhow!("engine.timeout_sec = {}: {}", config.engine.timeout_sec, e)
    })?;
    Ok(RetryPolicy {
        max_attempts: retry.max_attempts,
        base_delay: Duration::from_millis(retry.base_delay_ms),
        max_delay: Duration::from_millis(retry.max_delay_ms),
        timeout,
    })
}

/// Per-scene settings from the `[mix]`, `[ducking]` and `[loudness]` sections.
pub fn mix_settings(config: &MixdownConfig) -> MixSettings {
    MixSettings {
        gains: config.mix,
        thresholds: config.ducking.thresholds,
        hop_sec: config.ducking.hop_sec,
        targets: config.loudness,
    }
}

/// ffmpeg engine from the `[engine]` section.
pub fn ffmpeg_engine(config: &MixdownConfig) -> Arc<FfmpegEngine> {
    Arc::new(
        FfmpegEngine::new(config.engine.ffmpeg_path.clone())
            .with_sample_rate(config.engine.sample_rate),
    )
}

/// Steady spinner for long engine work.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Run `future` on a fresh multi-threaded runtime.
pub fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
