//! Crossfade offsets for a scene list, without touching audio.

use std::path::{Path, PathBuf};

use clap::Args;
use mixdown_core::crossfade::{CrossfadeLayout, PlaybackManifest, SceneClip};

use super::common::{load_config, read_json, write_json};

#[derive(Args)]
pub struct OffsetsArgs {
    /// Scenes as a JSON array of {scene_id, source, duration_sec} ("-" for stdin)
    scenes: PathBuf,

    /// Crossfade in seconds (default: [export] crossfade_sec)
    #[arg(long)]
    crossfade: Option<f64>,

    /// Project identifier recorded in the manifest
    #[arg(long, default_value = "project")]
    project: String,
}

pub fn run(args: OffsetsArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let crossfade = args.crossfade.unwrap_or(config.export.crossfade_sec);
    let scenes: Vec<SceneClip> = read_json(&args.scenes)?;

    let layout = CrossfadeLayout::compute(&scenes, crossfade)?;
    write_json(&PlaybackManifest::from_layout(args.project, &layout), None)
}
