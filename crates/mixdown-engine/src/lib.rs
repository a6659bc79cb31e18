//! Async mix orchestration over an external audio engine.
//!
//! `mixdown-engine` drives the pure planning in [`mixdown_core`] against a
//! real signal processor. It never touches samples itself: every envelope
//! analysis, render, loudness pass and crossfade goes through the
//! [`AudioEngine`] port, and every manifest goes through [`ArtifactStore`].
//!
//! # Architecture
//!
//! ```text
//! MixRequest ──► Mixer::mix_scene
//!                  │ structural check (no engine call yet)
//!                  │ analyze_envelope ─► duck_curve ─► build_mix_plan ─► validate
//!                  │ render
//!                  │ LoudnessNormalizer: measure ─► apply ─► verify
//!                  └ MixManifest ─► ArtifactStore (best effort)
//!
//! ExportRequest ──► Exporter::export
//!                  │ CrossfadeLayout + CrossfadePlan (no engine call yet)
//!                  │ crossfade_concat
//!                  └ PlaybackManifest ─► ArtifactStore (best effort)
//! ```
//!
//! Every engine call runs under a [`RetryPolicy`]: per-call timeout, capped
//! exponential backoff with jitter, retry only for rate limiting, transient
//! failures and timeouts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mixdown_engine::{FfmpegEngine, MixRequest, MixSettings, Mixer, RetryPolicy};
//!
//! # async fn run() -> Result<(), mixdown_engine::MixError> {
//! let engine = Arc::new(FfmpegEngine::new("ffmpeg"));
//! let mixer = Mixer::new(engine, RetryPolicy::default(), MixSettings::default(), "work");
//!
//! let request = MixRequest::new("scene-01", "dlg.wav").with_music("bed.wav");
//! let manifest = mixer.mix_scene(&request).await?;
//! println!("{} -> {}", manifest.scene_id, manifest.output);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod mixer;
pub mod normalize;
pub mod ports;
pub mod retry;
pub mod store;

pub use error::{EngineError, ExportError, MixError};
pub use export::{ExportOutcome, ExportRequest, Exporter};
pub use ffmpeg::FfmpegEngine;
pub use mixer::{MixManifest, MixRequest, MixSettings, Mixer};
pub use normalize::{LoudnessNormalizer, NormalizeOutcome};
pub use ports::{ArtifactStore, AudioEngine, SignalRef};
pub use retry::RetryPolicy;
pub use store::{FsArtifactStore, StoreError};
