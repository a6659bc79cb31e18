//! Cue-sheet validation and repair.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use mixdown_core::timeline::{TimelineEvent, autofix_timeline, validate_timeline};

use super::common::{load_config, print_report, read_json, write_json};

#[derive(Args)]
pub struct TimelineArgs {
    #[command(subcommand)]
    command: TimelineCommand,
}

#[derive(Subcommand)]
enum TimelineCommand {
    /// Check a timeline; exits non-zero when it has errors
    Validate {
        /// Timeline events as a JSON array ("-" for stdin)
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sort events and drop orphaned exits, then re-check
    Fix {
        /// Timeline events as a JSON array ("-" for stdin)
        file: PathBuf,

        /// Where to write the repaired events (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(args: TimelineArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    match args.command {
        TimelineCommand::Validate { file, json } => {
            let events: Vec<TimelineEvent> = read_json(&file)?;
            let report = validate_timeline(&events, &config.timeline);
            if json {
                write_json(&report, None)?;
            } else {
                print_report(&file.display().to_string(), &report);
            }
            if !report.valid {
                anyhow::bail!("timeline has {} error(s)", report.errors.len());
            }
            Ok(())
        }
        TimelineCommand::Fix { file, output } => {
            let events: Vec<TimelineEvent> = read_json(&file)?;
            let fixed = autofix_timeline(&events);
            let dropped = events.len() - fixed.len();
            let report = validate_timeline(&fixed, &config.timeline);
            tracing::info!(
                events = events.len(),
                dropped,
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "timeline repaired"
            );
            write_json(&fixed, output.as_deref())?;
            if !report.valid {
                for issue in &report.errors {
                    eprintln!("  remaining error: {issue}");
                }
            }
            Ok(())
        }
    }
}
