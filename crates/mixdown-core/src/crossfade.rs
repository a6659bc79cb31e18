//! Multi-scene crossfade layout.
//!
//! Scenes play back to back with a fixed crossfade `F` between every adjacent
//! pair. Each scene starts `F` seconds before the previous one ends:
//!
//! ```text
//! offset[0] = 0
//! offset[i] = offset[i-1] + duration[i-1] - F
//! total     = offset[N-1] + duration[N-1]
//! ```
//!
//! A single scene plays alone: its duration is the total and `F` is unused.
//! Arithmetic is full precision; rounding to milliseconds happens only in
//! [`PlaybackManifest`].

use serde::{Deserialize, Serialize};

use crate::graph::{FilterDefinition, GraphDescription, StreamRef, format_number};

/// Label of the final crossfade output.
pub const CROSSFADE_OUTPUT_LABEL: &str = "out";

/// Rounds seconds to millisecond precision.
pub fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Errors from layout computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CrossfadeError {
    /// Nothing to concatenate.
    #[error("no scenes to concatenate")]
    NoScenes,
    /// A scene duration is negative or not finite.
    #[error("scene '{scene_id}' has invalid duration {duration}s")]
    InvalidDuration {
        /// Offending scene.
        scene_id: String,
        /// Its duration.
        duration: f64,
    },
    /// The crossfade duration is negative or not finite.
    #[error("invalid crossfade duration {0}s")]
    InvalidCrossfade(f64),
}

/// Fade curve shape for each side of a crossfade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Quarter sine: equal power.
    #[default]
    QuarterSine,
    /// Half sine.
    HalfSine,
    /// Exponential sine.
    ExponentialSine,
    /// Linear (equal gain).
    Triangular,
}

impl FadeCurve {
    /// Engine curve name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QuarterSine => "qsin",
            Self::HalfSine => "hsin",
            Self::ExponentialSine => "esin",
            Self::Triangular => "tri",
        }
    }
}

/// One scene in an export request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneClip {
    /// Scene identifier.
    pub scene_id: String,
    /// Signal reference of the mixed scene.
    pub source: String,
    /// Duration in seconds.
    pub duration_sec: f64,
}

impl SceneClip {
    /// Creates a clip.
    pub fn new(scene_id: impl Into<String>, source: impl Into<String>, duration_sec: f64) -> Self {
        Self {
            scene_id: scene_id.into(),
            source: source.into(),
            duration_sec,
        }
    }
}

/// Placement of one scene on the episode timeline. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpan {
    scene_id: String,
    offset_sec: f64,
    duration_sec: f64,
}

impl SceneSpan {
    /// Scene identifier.
    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    /// Start offset in seconds.
    pub fn offset_sec(&self) -> f64 {
        self.offset_sec
    }

    /// Duration in seconds.
    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }
}

/// Full-precision layout of a crossfaded episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossfadeLayout {
    spans: Vec<SceneSpan>,
    total_sec: f64,
    crossfade_sec: f64,
}

impl CrossfadeLayout {
    /// Compute offsets for `clips` with crossfade `crossfade_sec`.
    ///
    /// # Errors
    ///
    /// Returns [`CrossfadeError`] for zero clips, a negative or non-finite
    /// duration, or a negative or non-finite crossfade.
    pub fn compute(clips: &[SceneClip], crossfade_sec: f64) -> Result<Self, CrossfadeError> {
        if clips.is_empty() {
            return Err(CrossfadeError::NoScenes);
        }
        if !(crossfade_sec.is_finite() && crossfade_sec >= 0.0) {
            return Err(CrossfadeError::InvalidCrossfade(crossfade_sec));
        }
        if let Some(bad) = clips
            .iter()
            .find(|c| !(c.duration_sec.is_finite() && c.duration_sec >= 0.0))
        {
            return Err(CrossfadeError::InvalidDuration {
                scene_id: bad.scene_id.clone(),
                duration: bad.duration_sec,
            });
        }

        let mut spans = Vec::with_capacity(clips.len());
        let mut offset = 0.0_f64;
        for (i, clip) in clips.iter().enumerate() {
            if i > 0 {
                let prev = &clips[i - 1];
                offset += prev.duration_sec - crossfade_sec;
                #[cfg(feature = "tracing")]
                warn_if_overlong(prev, clip, crossfade_sec);
            }
            spans.push(SceneSpan {
                scene_id: clip.scene_id.clone(),
                offset_sec: offset,
                duration_sec: clip.duration_sec,
            });
        }

        let last = &spans[spans.len() - 1];
        let total_sec = last.offset_sec + last.duration_sec;
        Ok(Self {
            spans,
            total_sec,
            crossfade_sec,
        })
    }

    /// Scene placements in playback order.
    pub fn spans(&self) -> &[SceneSpan] {
        &self.spans
    }

    /// Episode duration in seconds.
    pub fn total_sec(&self) -> f64 {
        self.total_sec
    }

    /// Crossfade between adjacent scenes in seconds.
    pub fn crossfade_sec(&self) -> f64 {
        self.crossfade_sec
    }

    /// Offsets in playback order.
    pub fn offsets(&self) -> Vec<f64> {
        self.spans.iter().map(|s| s.offset_sec).collect()
    }
}

#[cfg(feature = "tracing")]
fn warn_if_overlong(prev: &SceneClip, clip: &SceneClip, crossfade_sec: f64) {
    if crossfade_sec > prev.duration_sec.min(clip.duration_sec) {
        tracing::warn!(
            scene = %clip.scene_id,
            crossfade_sec,
            "crossfade longer than an adjacent scene"
        );
    }
}

/// Sequential crossfade-combine request: N−1 binary crossfades folding left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossfadePlan {
    /// Signal references in playback order.
    pub sources: Vec<String>,
    /// Crossfade duration in seconds.
    pub duration_sec: f64,
    /// Curve used for both the fade-out and the fade-in.
    pub curve: FadeCurve,
}

impl CrossfadePlan {
    /// Creates a plan over `clips` in order.
    pub fn new(clips: &[SceneClip], duration_sec: f64, curve: FadeCurve) -> Self {
        Self {
            sources: clips.iter().map(|c| c.source.clone()).collect(),
            duration_sec,
            curve,
        }
    }

    /// Number of binary crossfades.
    pub fn fade_count(&self) -> usize {
        self.sources.len().saturating_sub(1)
    }

    /// Serializes the fold as a graph description.
    ///
    /// `[0:a][1:a]` fade into `xf1`, `[xf1][2:a]` into `xf2`, ..., and the last
    /// fade writes [`CROSSFADE_OUTPUT_LABEL`]. A single source yields a
    /// pass-through definition.
    pub fn describe(&self) -> GraphDescription {
        let args = format!(
            "d={}:c1={}:c2={}",
            format_number(self.duration_sec),
            self.curve.as_str(),
            self.curve.as_str()
        );
        let n = self.sources.len();
        let mut definitions = Vec::with_capacity(self.fade_count().max(1));

        if n == 1 {
            definitions.push(
                FilterDefinition::new("anull", "")
                    .input(StreamRef::raw_specifier(0))
                    .output(CROSSFADE_OUTPUT_LABEL),
            );
        }

        let mut running = StreamRef::raw_specifier(0);
        for i in 1..n {
            let out = if i == n - 1 {
                CROSSFADE_OUTPUT_LABEL.to_string()
            } else {
                format!("xf{i}")
            };
            definitions.push(
                FilterDefinition::new("acrossfade", args.clone())
                    .input(running)
                    .input(StreamRef::raw_specifier(i))
                    .output(out.clone()),
            );
            running = out;
        }

        GraphDescription::new(definitions).with_output(CROSSFADE_OUTPUT_LABEL)
    }
}

/// One scene entry in a playback manifest, millisecond precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestScene {
    /// Scene identifier.
    pub scene_id: String,
    /// Start offset in seconds.
    pub offset: f64,
    /// Duration in seconds.
    pub duration: f64,
}

/// Playback manifest for an exported episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackManifest {
    /// Project identifier.
    pub project_id: String,
    /// Scenes in playback order.
    pub scenes: Vec<ManifestScene>,
    /// Episode duration in seconds.
    pub total_duration: f64,
    /// Crossfade duration in seconds.
    pub crossfade_duration: f64,
}

impl PlaybackManifest {
    /// Rounds a layout to milliseconds.
    pub fn from_layout(project_id: impl Into<String>, layout: &CrossfadeLayout) -> Self {
        Self {
            project_id: project_id.into(),
            scenes: layout
                .spans()
                .iter()
                .map(|s| ManifestScene {
                    scene_id: s.scene_id.clone(),
                    offset: round_ms(s.offset_sec),
                    duration: round_ms(s.duration_sec),
                })
                .collect(),
            total_duration: round_ms(layout.total_sec()),
            crossfade_duration: round_ms(layout.crossfade_sec()),
        }
    }
}
