//! Duck curve from measured dialogue levels.

use std::path::{Path, PathBuf};

use clap::Args;
use mixdown_core::envelope::{duck_curve, samples_from_levels};

use super::common::{load_config, read_json, write_json};

#[derive(Args)]
pub struct DuckArgs {
    /// Dialogue RMS levels in dB, one per hop, as a JSON array ("-" for stdin)
    levels: PathBuf,

    /// Hop size in seconds (default: [ducking] hop_sec)
    #[arg(long)]
    hop: Option<f64>,
}

pub fn run(args: DuckArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let hop = args.hop.unwrap_or(config.ducking.hop_sec);
    let levels: Vec<f64> = read_json(&args.levels)?;

    let samples = samples_from_levels(&levels, hop);
    let segments = duck_curve(&samples, hop, &config.ducking.thresholds)?;
    write_json(&segments, None)
}
