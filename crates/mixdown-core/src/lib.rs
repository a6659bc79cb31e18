//! Mixdown Core - planning and validation logic for episode mixdowns
//!
//! Everything in this crate is pure: no I/O, no processes, no clocks. The
//! engine crate feeds it measurements and executes the plans it produces.
//!
//! # Core Abstractions
//!
//! ## Mix Graphs
//!
//! - [`graph::build_mix_plan`] - Role-tagged inputs + duck curve → [`graph::MixPlan`]
//! - [`graph::MixGraph`] - Typed DAG of gain, duck and mix operations
//! - [`graph::parse_filter_script`] / [`graph::GraphDescription`] - Textual filter scripts
//! - [`graph::validate_description`] - Structural checks on any description
//!
//! ## Ducking
//!
//! - [`envelope::duck_curve`] - Dialogue RMS envelope → music attenuation segments
//!
//! ## Loudness
//!
//! - [`loudness::LoudnessMeasurement`] - Measure-pass report parsing with sentinel fallback
//! - [`loudness::LoudnessTargets`] - EBU R128 targets
//!
//! ## Scene Concatenation
//!
//! - [`crossfade::CrossfadeLayout`] - Scene offsets and total duration
//! - [`crossfade::CrossfadePlan`] - Sequential crossfade fold
//! - [`crossfade::PlaybackManifest`] - Millisecond-rounded manifest
//!
//! ## Timelines
//!
//! - [`timeline::validate_timeline`] - Overlap, masking, ordering and orphan checks
//! - [`timeline::autofix_timeline`] - Sort and drop orphan exits
//!
//! All validators return a [`ValidationResult`]; they never fail on bad data.
//!
//! # Example
//!
//! ```rust
//! use mixdown_core::crossfade::{CrossfadeLayout, SceneClip};
//!
//! let clips = [
//!     SceneClip::new("s1", "s1.wav", 10.0),
//!     SceneClip::new("s2", "s2.wav", 8.0),
//!     SceneClip::new("s3", "s3.wav", 12.0),
//! ];
//! let layout = CrossfadeLayout::compute(&clips, 1.5).unwrap();
//! assert_eq!(layout.offsets(), vec![0.0, 8.5, 15.0]);
//! assert_eq!(layout.total_sec(), 27.0);
//! ```

pub mod crossfade;
pub mod envelope;
pub mod graph;
pub mod loudness;
pub mod timeline;
pub mod validation;

// Re-export main types at crate root
pub use crossfade::{
    CrossfadeError, CrossfadeLayout, CrossfadePlan, FadeCurve, ManifestScene, PlaybackManifest,
    SceneClip, SceneSpan,
};
pub use envelope::{CurveError, DuckSegment, DuckThresholds, RmsSample, duck_curve};
pub use graph::{
    AudioInput, BuildError, GainDefaults, GraphDescription, MixGraph, MixPlan, Role,
    build_mix_plan, parse_filter_script, validate_description,
};
pub use loudness::{LoudnessMeasurement, LoudnessReading, LoudnessTargets, MeasurementSource};
pub use timeline::{
    CueClass, EventKind, TimelineEvent, TimelineRules, autofix_timeline, validate_timeline,
};
pub use validation::{Issue, IssueCode, ValidationResult};
