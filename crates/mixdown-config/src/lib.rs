//! Configuration management for mixdown.
//!
//! A single TOML document ([`MixdownConfig`]) carries every tunable the mix
//! pipeline uses: bed gains, loudness targets, duck thresholds, timeline
//! margins, crossfade settings and external engine limits.
//!
//! # Features
//!
//! - **Layered defaults**: every section is optional; missing fields keep their defaults
//! - **Validation**: semantic checks that report all problems at once
//! - **Paths**: platform config directory plus project-local `mixdown.toml`
//!
//! # Example
//!
//! ```rust,no_run
//! use mixdown_config::{MixdownConfig, paths};
//!
//! let path = paths::find_config(None).unwrap_or_else(paths::user_config_path);
//! let config = MixdownConfig::load_or_default(&path).unwrap();
//! println!("target: {} LUFS", config.loudness.integrated_lufs);
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

/// Semantic configuration validation.
pub mod validation;

pub use config::{DuckingConfig, EngineConfig, ExportConfig, MixdownConfig, RetryConfig};
pub use error::ConfigError;
pub use paths::{ensure_user_config_dir, find_config, user_config_dir, user_config_path};
pub use validation::{ValidationError, ValidationResult, validate_config};
