//! The `MixdownConfig` TOML document.

use std::path::{Path, PathBuf};

use mixdown_core::crossfade::FadeCurve;
use mixdown_core::envelope::DuckThresholds;
use mixdown_core::graph::GainDefaults;
use mixdown_core::loudness::LoudnessTargets;
use mixdown_core::timeline::TimelineRules;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::validate_config;

/// Complete mixdown configuration.
///
/// Every section and field has a default, so an empty file is a valid config
/// and a partial file only overrides what it names:
///
/// ```toml
/// [mix]
/// music_db = -14.0
///
/// [loudness]
/// integrated_lufs = -23.0
///
/// [engine.retry]
/// max_attempts = 5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixdownConfig {
    /// Default bed gains.
    pub mix: GainDefaults,
    /// Loudness normalization targets.
    pub loudness: LoudnessTargets,
    /// Envelope hop and duck thresholds.
    pub ducking: DuckingConfig,
    /// Timeline masking and fade margins.
    pub timeline: TimelineRules,
    /// Scene concatenation settings.
    pub export: ExportConfig,
    /// External engine settings.
    pub engine: EngineConfig,
}

/// `[ducking]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingConfig {
    /// Envelope analysis hop in seconds.
    pub hop_sec: f64,
    /// Level → attenuation table, `[ducking.thresholds]`.
    pub thresholds: DuckThresholds,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            hop_sec: 0.05,
            thresholds: DuckThresholds::default(),
        }
    }
}

/// `[export]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Crossfade between adjacent scenes in seconds.
    pub crossfade_sec: f64,
    /// Fade curve for both sides of each crossfade.
    pub curve: FadeCurve,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            crossfade_sec: 1.5,
            curve: FadeCurve::QuarterSine,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path or name of the ffmpeg executable.
    pub ffmpeg_path: PathBuf,
    /// Sample rate for envelope analysis and renders.
    pub sample_rate: u32,
    /// Per-call timeout in seconds.
    pub timeout_sec: f64,
    /// Retry policy for retryable failures.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            sample_rate: 48_000,
            timeout_sec: 300.0,
            retry: RetryConfig::default(),
        }
    }
}

/// `[engine.retry]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled each retry.
    pub base_delay_ms: u64,
    /// Upper bound on a single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl MixdownConfig {
    /// Load a configuration from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Run semantic validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)?;
        Ok(())
    }
}
