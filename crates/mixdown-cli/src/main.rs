//! Mixdown CLI - Command-line interface for the mixdown mix and timeline engine.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mixdown")]
#[command(author, version, about = "Scene mixing, cue-sheet validation and episode export", long_about = None)]
struct Cli {
    /// Configuration file (default: ./mixdown.toml, then the user config)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate or repair a cue-sheet timeline
    Timeline(commands::timeline::TimelineArgs),

    /// Compute the music duck curve from dialogue RMS levels
    Duck(commands::duck::DuckArgs),

    /// Build or validate mix graphs
    Graph(commands::graph::GraphArgs),

    /// Compute crossfade offsets for a scene list
    Offsets(commands::offsets::OffsetsArgs),

    /// Mix scenes through ffmpeg
    Mix(commands::mix::MixArgs),

    /// Crossfade mixed scenes into one episode
    Export(commands::export::ExportArgs),

    /// Show or create configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Timeline(args) => commands::timeline::run(args, config),
        Commands::Duck(args) => commands::duck::run(args, config),
        Commands::Graph(args) => commands::graph::run(args, config),
        Commands::Offsets(args) => commands::offsets::run(args, config),
        Commands::Mix(args) => commands::mix::run(args, config),
        Commands::Export(args) => commands::export::run(args, config),
        Commands::Config(args) => commands::config::run(args, config),
    }
}
