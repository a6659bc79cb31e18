//! Mix graph construction and filter-script validation.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use mixdown_core::envelope::{duck_curve, samples_from_levels};
use mixdown_core::graph::{
    AudioInput, MixPlan, Role, build_mix_plan, parse_filter_script, validate_description,
};

use super::common::{load_config, print_report, read_json, write_json};

#[derive(Args)]
pub struct GraphArgs {
    #[command(subcommand)]
    command: GraphCommand,
}

#[derive(Subcommand)]
enum GraphCommand {
    /// Build the mix graph for a scene and print its filter script
    Build {
        /// Dialogue source
        #[arg(long)]
        dialogue: Option<String>,

        /// Music bed source
        #[arg(long)]
        music: Option<String>,

        /// Ambience bed source
        #[arg(long)]
        ambience: Option<String>,

        /// Music gain in dB (default: [mix] music_db)
        #[arg(long, allow_hyphen_values = true)]
        music_gain: Option<f64>,

        /// Ambience gain in dB (default: [mix] ambience_db)
        #[arg(long, allow_hyphen_values = true)]
        ambience_gain: Option<f64>,

        /// Dialogue RMS levels (JSON array, one per hop) to derive ducking from
        #[arg(long)]
        levels: Option<PathBuf>,

        /// Print the typed plan as JSON instead of the filter script
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate a filter script file; exits non-zero when invalid
    Validate {
        /// Filter script file
        file: PathBuf,

        /// Label that must be produced as the final output
        #[arg(long)]
        output: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(args: GraphArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    match args.command {
        GraphCommand::Build {
            dialogue,
            music,
            ambience,
            music_gain,
            ambience_gain,
            levels,
            json,
        } => {
            let mut inputs = Vec::new();
            if let Some(src) = dialogue {
                inputs.push(AudioInput::new(Role::Dialogue, src));
            }
            if let Some(src) = music {
                let mut input = AudioInput::new(Role::Music, src);
                input.gain_db = music_gain;
                inputs.push(input);
            }
            if let Some(src) = ambience {
                let mut input = AudioInput::new(Role::Ambience, src);
                input.gain_db = ambience_gain;
                inputs.push(input);
            }

            let ducks = match levels {
                Some(path) => {
                    let levels: Vec<f64> = read_json(&path)?;
                    let hop = config.ducking.hop_sec;
                    duck_curve(&samples_from_levels(&levels, hop), hop, &config.ducking.thresholds)?
                }
                None => Vec::new(),
            };

            let plan = build_mix_plan(&inputs, &ducks, &config.mix)?;
            if json {
                return write_json(&plan, None);
            }
            match &plan {
                MixPlan::PassThrough { dialogue } => {
                    println!("pass-through: {}", dialogue.source);
                }
                MixPlan::Graph(graph) => {
                    let report = validate_description(&graph.describe());
                    println!("{}", graph.to_filter_script());
                    for issue in &report.warnings {
                        eprintln!("  warning {issue}");
                    }
                }
            }
            Ok(())
        }
        GraphCommand::Validate { file, output, json } => {
            let script = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("failed to read {}: {}", file.display(), e))?;
            let mut description = parse_filter_script(script.trim())?;
            if let Some(label) = output {
                description = description.with_output(label);
            }
            let report = validate_description(&description);
            if json {
                write_json(&report, None)?;
            } else {
                print_report(&file.display().to_string(), &report);
            }
            if !report.valid {
                anyhow::bail!("graph has {} error(s)", report.errors.len());
            }
            Ok(())
        }
    }
}
