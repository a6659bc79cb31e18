//! Mix plan construction from named inputs and a ducking curve.

use serde::{Deserialize, Serialize};

use super::node::{AudioInput, Operation, Role, StreamRef};
use super::plan::{MixGraph, MixPlan};
use crate::envelope::DuckSegment;

/// Label of the final mix node.
pub const MIX_OUTPUT_LABEL: &str = "out";

/// Gains applied to background roles when the input carries none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainDefaults {
    /// Music bed gain in dB.
    pub music_db: f64,
    /// Ambience bed gain in dB.
    pub ambience_db: f64,
}

impl Default for GainDefaults {
    fn default() -> Self {
        Self {
            music_db: -12.0,
            ambience_db: -18.0,
        }
    }
}

/// Structural errors from plan construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// No dialogue input was supplied.
    #[error("missing required dialogue input")]
    MissingDialogue,
    /// More than one input with the same role.
    #[error("more than one {0} input")]
    DuplicateRole(Role),
}

fn single(inputs: &[AudioInput], role: Role) -> Result<Option<&AudioInput>, BuildError> {
    let mut found = inputs.iter().filter(|i| i.role == role);
    let first = found.next();
    if found.next().is_some() {
        return Err(BuildError::DuplicateRole(role));
    }
    Ok(first)
}

/// Build the mix plan for one scene.
///
/// - dialogue only → [`MixPlan::PassThrough`], no graph at all
/// - music → fixed gain, then one duck node per nonzero segment in time order
/// - ambience → fixed gain
/// - final `amix` over `[dialogue, music?, ambience?]`, longest duration
///
/// Inputs in the resulting graph carry their resolved gain.
///
/// # Errors
///
/// Returns [`BuildError`] when dialogue is missing or a role appears twice.
pub fn build_mix_plan(
    inputs: &[AudioInput],
    ducks: &[DuckSegment],
    gains: &GainDefaults,
) -> Result<MixPlan, BuildError> {
    let dialogue = single(inputs, Role::Dialogue)?.ok_or(BuildError::MissingDialogue)?;
    let music = single(inputs, Role::Music)?;
    let ambience = single(inputs, Role::Ambience)?;

    if music.is_none() && ambience.is_none() {
        #[cfg(feature = "tracing")]
        tracing::debug!("mix_plan: dialogue only, pass-through");
        return Ok(MixPlan::PassThrough {
            dialogue: dialogue.clone(),
        });
    }

    let mut graph = MixGraph::new();
    let dialogue_stream = graph.add_input(dialogue.clone());
    let mut mix_inputs = vec![dialogue_stream];

    if let Some(music) = music {
        let gain_db = music.gain_db.unwrap_or(gains.music_db);
        let raw = graph.add_input(music.clone().with_gain_db(gain_db));
        let mut tail = graph.add_node(Operation::Gain { db: gain_db }, vec![raw], "music_gain");

        let mut segments: Vec<&DuckSegment> = ducks.iter().filter(|s| s.duck_db != 0.0).collect();
        segments.sort_by(|a, b| a.t0.total_cmp(&b.t0));
        for (k, seg) in segments.into_iter().enumerate() {
            tail = graph.add_node(
                Operation::Duck {
                    db: seg.duck_db,
                    start: seg.t0,
                    end: seg.t1,
                },
                vec![StreamRef::Node(tail)],
                format!("music_duck_{k}"),
            );
        }
        mix_inputs.push(StreamRef::Node(tail));
    }

    if let Some(ambience) = ambience {
        let gain_db = ambience.gain_db.unwrap_or(gains.ambience_db);
        let raw = graph.add_input(ambience.clone().with_gain_db(gain_db));
        let gain = graph.add_node(Operation::Gain { db: gain_db }, vec![raw], "ambience_gain");
        mix_inputs.push(StreamRef::Node(gain));
    }

    let mix = graph.add_node(Operation::Mix, mix_inputs, MIX_OUTPUT_LABEL);
    graph.set_output(mix);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        nodes = graph.nodes().len(),
        inputs = graph.inputs().len(),
        "mix_plan: graph built"
    );
    Ok(MixPlan::Graph(graph))
}
