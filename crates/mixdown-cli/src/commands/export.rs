//! Episode export through ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use mixdown_engine::{ExportRequest, Exporter, FsArtifactStore};

use super::common::{block_on, ffmpeg_engine, load_config, read_json, retry_policy, spinner, write_json};

#[derive(Args)]
pub struct ExportArgs {
    /// Export request as JSON ("-" for stdin)
    request: PathBuf,

    /// Crossfade in seconds, overriding the request and [export] crossfade_sec
    #[arg(long)]
    crossfade: Option<f64>,

    /// Publish the playback manifest as JSON under this directory
    #[arg(long)]
    manifests: Option<PathBuf>,
}

pub fn run(args: ExportArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let mut request: ExportRequest = read_json(&args.request)?;
    if args.crossfade.is_some() {
        request.crossfade_sec = args.crossfade;
    }

    let mut exporter = Exporter::new(ffmpeg_engine(&config), retry_policy(&config)?)
        .with_crossfade(config.export.crossfade_sec)
        .with_curve(config.export.curve);
    if let Some(dir) = args.manifests {
        exporter = exporter.with_store(Arc::new(FsArtifactStore::new(dir)));
    }

    let pb = spinner(format!(
        "exporting {} ({} scene(s))",
        request.project_id,
        request.scenes.len()
    ));
    let outcome = block_on(exporter.export(&request))?;
    pb.finish_and_clear();

    let outcome = outcome.map_err(|e| anyhow::anyhow!("[{}] {}", e.kind(), e))?;
    for skipped in &outcome.skipped {
        eprintln!("  skipped: {skipped}");
    }
    write_json(&outcome, None)
}
