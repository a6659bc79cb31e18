//! Scene mixing through ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use mixdown_engine::{FsArtifactStore, MixRequest, Mixer};
use serde::Deserialize;

use super::common::{
    block_on, ffmpeg_engine, load_config, mix_settings, read_json, retry_policy, spinner,
    write_json,
};

#[derive(Args)]
pub struct MixArgs {
    /// One mix request or an array of them, as JSON ("-" for stdin)
    requests: PathBuf,

    /// Directory for intermediate and default output files
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Publish scene manifests as JSON files under this directory
    #[arg(long)]
    manifests: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Requests {
    Many(Vec<MixRequest>),
    One(MixRequest),
}

pub fn run(args: MixArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let requests = match read_json::<Requests>(&args.requests)? {
        Requests::Many(requests) => requests,
        Requests::One(request) => vec![request],
    };
    if requests.is_empty() {
        anyhow::bail!("no mix requests in {}", args.requests.display());
    }

    let mut mixer = Mixer::new(
        ffmpeg_engine(&config),
        retry_policy(&config)?,
        mix_settings(&config),
        args.work_dir.display().to_string(),
    );
    if let Some(dir) = args.manifests {
        mixer = mixer.with_store(Arc::new(FsArtifactStore::new(dir)));
    }

    let pb = spinner(format!("mixing {} scene(s)", requests.len()));
    let results = block_on(mixer.mix_batch(requests))?;
    pb.finish_and_clear();

    let mut manifests = Vec::new();
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => {
                failed += 1;
                eprintln!("  {} [{}]: {}", e.scene_id(), e.kind(), e);
            }
        }
    }
    write_json(&manifests, None)?;

    if failed > 0 {
        anyhow::bail!("{failed} scene(s) failed");
    }
    Ok(())
}
