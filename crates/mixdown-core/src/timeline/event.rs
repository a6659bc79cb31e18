//! Timeline cue events.

use serde::{Deserialize, Serialize};

/// The class of cue an event belongs to. Checks run per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueClass {
    /// Music cues.
    Music,
    /// Ambience cues.
    Ambience,
    /// Dialogue lines.
    Dialogue,
}

impl CueClass {
    /// Lowercase class name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Ambience => "ambience",
            Self::Dialogue => "dialogue",
        }
    }
}

impl core::fmt::Display for CueClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event type: a cue of some class entering or leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Music cue starts.
    MusicIn,
    /// Music cue ends.
    MusicOut,
    /// Ambience cue starts.
    AmbienceIn,
    /// Ambience cue ends.
    AmbienceOut,
    /// Dialogue line starts.
    DialogueIn,
    /// Dialogue line ends.
    DialogueOut,
}

impl EventKind {
    /// The cue class.
    pub fn class(self) -> CueClass {
        match self {
            Self::MusicIn | Self::MusicOut => CueClass::Music,
            Self::AmbienceIn | Self::AmbienceOut => CueClass::Ambience,
            Self::DialogueIn | Self::DialogueOut => CueClass::Dialogue,
        }
    }

    /// `true` for `*_in` events.
    pub fn is_entry(self) -> bool {
        matches!(self, Self::MusicIn | Self::AmbienceIn | Self::DialogueIn)
    }

    /// `true` for `*_out` events.
    pub fn is_exit(self) -> bool {
        !self.is_entry()
    }

    /// Serialized name (`"music_in"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MusicIn => "music_in",
            Self::MusicOut => "music_out",
            Self::AmbienceIn => "ambience_in",
            Self::AmbienceOut => "ambience_out",
            Self::DialogueIn => "dialogue_in",
            Self::DialogueOut => "dialogue_out",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-stamped cue event.
///
/// JSON form: `{"type": "music_in", "cue_id": "A", "at": 0.0, "duck_db": -8}`.
/// Dialogue events may use `line_id` instead of `cue_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Cue or dialogue line identifier.
    #[serde(alias = "line_id")]
    pub cue_id: String,
    /// Event time in seconds.
    pub at: f64,
    /// Music attenuation under dialogue, in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duck_db: Option<f64>,
    /// Fixed gain, in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_db: Option<f64>,
    /// Fade length, in seconds. On an exit event, the fade-out window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_sec: Option<f64>,
}

impl TimelineEvent {
    /// Creates an event with no optional fields.
    pub fn new(kind: EventKind, cue_id: impl Into<String>, at: f64) -> Self {
        Self {
            kind,
            cue_id: cue_id.into(),
            at,
            duck_db: None,
            gain_db: None,
            fade_sec: None,
        }
    }

    /// Sets `duck_db`.
    pub fn with_duck_db(mut self, duck_db: f64) -> Self {
        self.duck_db = Some(duck_db);
        self
    }

    /// Sets `gain_db`.
    pub fn with_gain_db(mut self, gain_db: f64) -> Self {
        self.gain_db = Some(gain_db);
        self
    }

    /// Sets `fade_sec`.
    pub fn with_fade_sec(mut self, fade_sec: f64) -> Self {
        self.fade_sec = Some(fade_sec);
        self
    }
}

/// Indices of `events` sorted ascending by `at`; ties keep input order.
pub(crate) fn sorted_indices(events: &[TimelineEvent]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by(|&a, &b| events[a].at.total_cmp(&events[b].at));
    order
}
