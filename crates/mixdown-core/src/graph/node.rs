//! Graph node types for the per-scene mix graph.
//!
//! Each node has a [`NodeId`], an [`Operation`], an ordered list of
//! [`StreamRef`] inputs and a unique output label.

use serde::{Deserialize, Serialize};

use super::script::format_number;

/// Unique identifier for a node in a mix graph.
///
/// Node IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The part a raw input plays in the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Foreground speech. Required for every mix.
    Dialogue,
    /// Music bed. Gained and ducked under dialogue.
    Music,
    /// Room tone / ambience bed. Gained only.
    Ambience,
}

impl Role {
    /// Lowercase role name, also used as a label prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Music => "music",
            Self::Ambience => "ambience",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw signal handed to the mix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioInput {
    /// What the signal is.
    pub role: Role,
    /// Opaque reference the engine resolves (path, URL, object key).
    pub source: String,
    /// Fixed gain in dB. Role defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_db: Option<f64>,
}

impl AudioInput {
    /// Creates an input with no explicit gain.
    pub fn new(role: Role, source: impl Into<String>) -> Self {
        Self {
            role,
            source: source.into(),
            gain_db: None,
        }
    }

    /// Sets an explicit gain.
    pub fn with_gain_db(mut self, gain_db: f64) -> Self {
        self.gain_db = Some(gain_db);
        self
    }
}

/// An input of a node: a raw stream or the output of an earlier node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRef {
    /// Raw input stream by position in the graph's input list.
    Raw(usize),
    /// Output of another node.
    Node(NodeId),
}

impl StreamRef {
    /// Raw-stream specifier for input `index` (`"<index>:a"`).
    pub fn raw_specifier(index: usize) -> String {
        format!("{index}:a")
    }
}

/// What a node does to its inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Constant gain.
    Gain {
        /// Gain in dB.
        db: f64,
    },
    /// Gain applied only within `[start, end)`.
    Duck {
        /// Attenuation in dB (`<= 0`).
        db: f64,
        /// Window start in seconds.
        start: f64,
        /// Window end in seconds.
        end: f64,
    },
    /// Sum of all inputs, running to the longest input with no dropout ramp.
    Mix,
}

impl Operation {
    /// Short operation name reported in mix manifests.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gain { .. } => "gain",
            Self::Duck { .. } => "duck",
            Self::Mix => "mix",
        }
    }

    /// Engine filter name.
    pub fn filter_name(&self) -> &'static str {
        match self {
            Self::Gain { .. } | Self::Duck { .. } => "volume",
            Self::Mix => "amix",
        }
    }

    /// Engine filter arguments for a node with `input_count` inputs.
    pub fn filter_args(&self, input_count: usize) -> String {
        match self {
            Self::Gain { db } => format!("{}dB", format_number(*db)),
            Self::Duck { db, start, end } => format!(
                "enable='between(t,{},{})':volume={}dB",
                format_number(*start),
                format_number(*end),
                format_number(*db)
            ),
            Self::Mix => format!("inputs={input_count}:duration=longest:dropout_transition=0"),
        }
    }
}

/// A node in the mix graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Graph-unique identifier.
    pub id: NodeId,
    /// Processing step.
    pub operation: Operation,
    /// Ordered inputs.
    pub inputs: Vec<StreamRef>,
    /// Output label, unique within the graph.
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_args_use_db_suffix() {
        assert_eq!(Operation::Gain { db: -12.0 }.filter_args(1), "-12dB");
    }

    #[test]
    fn duck_args_enable_window() {
        let op = Operation::Duck {
            db: -7.0,
            start: 0.0,
            end: 0.1,
        };
        assert_eq!(op.filter_args(1), "enable='between(t,0,0.1)':volume=-7dB");
    }

    #[test]
    fn mix_args_run_to_longest() {
        assert_eq!(
            Operation::Mix.filter_args(3),
            "inputs=3:duration=longest:dropout_transition=0"
        );
    }

    #[test]
    fn role_round_trips_through_json() {
        let input = AudioInput::new(Role::Music, "bed.wav").with_gain_db(-10.0);
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains("\"role\":\"music\""), "got: {json}");
        let back: AudioInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, input);
    }
}
