//! Semantic validation of a loaded configuration.
//!
//! TOML parsing only checks shapes. These checks catch values that parse but
//! make no sense (a zero hop, a positive true-peak ceiling, a retry cap below
//! its base delay). All problems are collected before reporting.
//!
//! # Example
//!
//! ```rust
//! use mixdown_config::{MixdownConfig, validate_config};
//!
//! let mut config = MixdownConfig::default();
//! assert!(validate_config(&config).is_ok());
//!
//! config.ducking.hop_sec = 0.0;
//! assert!(validate_config(&config).is_err());
//! ```

use thiserror::Error;

use crate::config::MixdownConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A numeric field is outside its usable range.
    #[error("{field} = {value}: {reason}")]
    OutOfRange {
        /// Dotted field path, e.g. `loudness.true_peak_db`.
        field: String,
        /// The offending value.
        value: f64,
        /// What the value must satisfy.
        reason: String,
    },

    /// Two fields contradict each other.
    #[error("{fields}: {reason}")]
    Inconsistent {
        /// The fields involved.
        fields: String,
        /// Description of the conflict.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Longest accepted per-call engine timeout: one day.
pub const MAX_ENGINE_TIMEOUT_SEC: f64 = 86_400.0;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Accumulates problems; finishes as `Ok` or a single/multiple error.
#[derive(Default)]
struct Checker {
    problems: Vec<ValidationError>,
}

impl Checker {
    fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !(value.is_finite() && (min..=max).contains(&value)) {
            self.problems.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                reason: format!("must be within [{min}, {max}]"),
            });
        }
    }

    fn positive(&mut self, field: &str, value: f64) {
        if !(value.is_finite() && value > 0.0) {
            self.problems.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                reason: "must be positive".to_string(),
            });
        }
    }

    fn positive_at_most(&mut self, field: &str, value: f64, max: f64) {
        if !(value.is_finite() && value > 0.0 && value <= max) {
            self.problems.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                reason: format!("must be positive and at most {max}"),
            });
        }
    }

    fn non_negative(&mut self, field: &str, value: f64) {
        if !(value.is_finite() && value >= 0.0) {
            self.problems.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                reason: "must be non-negative".to_string(),
            });
        }
    }

    fn attenuation(&mut self, field: &str, value: f64) {
        if !(value.is_finite() && value <= 0.0) {
            self.problems.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                reason: "must be an attenuation (<= 0 dB)".to_string(),
            });
        }
    }

    fn consistent(&mut self, ok: bool, fields: &str, reason: &str) {
        if !ok {
            self.problems.push(ValidationError::Inconsistent {
                fields: fields.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    fn finish(mut self) -> ValidationResult<()> {
        match self.problems.len() {
            0 => Ok(()),
            1 => Err(self.problems.remove(0)),
            _ => Err(ValidationError::Multiple(self.problems)),
        }
    }
}

/// Validate every section of a configuration.
///
/// # Errors
///
/// Returns the single problem found, or [`ValidationError::Multiple`] listing
/// all of them in section order.
pub fn validate_config(config: &MixdownConfig) -> ValidationResult<()> {
    let mut c = Checker::default();

    c.range("mix.music_db", config.mix.music_db, -96.0, 24.0);
    c.range("mix.ambience_db", config.mix.ambience_db, -96.0, 24.0);

    c.range("loudness.integrated_lufs", config.loudness.integrated_lufs, -70.0, -5.0);
    c.range("loudness.true_peak_db", config.loudness.true_peak_db, -9.0, 0.0);
    c.range("loudness.lra", config.loudness.lra, 1.0, 50.0);

    let d = &config.ducking;
    c.positive("ducking.hop_sec", d.hop_sec);
    c.attenuation("ducking.loud_duck_db", d.thresholds.loud_duck_db);
    c.attenuation("ducking.soft_duck_db", d.thresholds.soft_duck_db);
    c.consistent(
        d.thresholds.loud_above_db > d.thresholds.soft_above_db,
        "ducking.loud_above_db, ducking.soft_above_db",
        "loud threshold must be above soft threshold",
    );

    c.non_negative("timeline.min_music_duck_db", config.timeline.min_music_duck_db);
    c.range("timeline.max_ambience_gain_db", config.timeline.max_ambience_gain_db, -96.0, 24.0);
    c.non_negative("timeline.default_fade_sec", config.timeline.default_fade_sec);

    c.non_negative("export.crossfade_sec", config.export.crossfade_sec);

    let e = &config.engine;
    c.positive_at_most("engine.timeout_sec", e.timeout_sec, MAX_ENGINE_TIMEOUT_SEC);
    c.range("engine.sample_rate", f64::from(e.sample_rate), 8000.0, 192_000.0);
    c.consistent(
        e.retry.max_attempts >= 1,
        "engine.retry.max_attempts",
        "at least one attempt is required",
    );
    c.consistent(
        e.retry.base_delay_ms <= e.retry.max_delay_ms,
        "engine.retry.base_delay_ms, engine.retry.max_delay_ms",
        "base delay must not exceed the cap",
    );

    c.finish()
}
