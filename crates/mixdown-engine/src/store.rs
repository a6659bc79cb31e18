//! Filesystem artifact store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::ports::ArtifactStore;

/// Failure to publish an artifact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("failed to write artifact '{path}': {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be encoded.
    #[error("failed to encode artifact: {0}")]
    Encode(#[from] serde_json::Error),

    /// The artifact name is not a plain file name.
    #[error("invalid artifact name '{0}'")]
    InvalidName(String),

    /// The store refused the artifact.
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "store_io",
            Self::Encode(_) => "store_encode",
            Self::InvalidName(_) => "store_invalid_name",
            Self::Unavailable(_) => "store_unavailable",
        }
    }
}

/// `true` if `name` is a single path component that stays inside its
/// directory when joined to it.
pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Writes manifests as pretty JSON files under a directory.
///
/// Each write goes to a temporary sibling first and is renamed into place, so
/// readers never see a partial manifest.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    /// Store rooted at `dir`. The directory is created on first publish.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn publish_manifest(
        &self,
        name: &str,
        manifest: &serde_json::Value,
    ) -> Result<String, StoreError> {
        if !is_plain_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let bytes = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(format!("{name}.json"));
        let partial = self.dir.join(format!(".{name}.json.partial"));
        if let Err(source) = tokio::fs::write(&partial, bytes).await {
            discard_partial(&partial).await;
            return Err(StoreError::Io {
                path: partial,
                source,
            });
        }
        if let Err(source) = tokio::fs::rename(&partial, &path).await {
            discard_partial(&partial).await;
            return Err(StoreError::Io { path, source });
        }

        tracing::debug!(path = %path.display(), "manifest published");
        Ok(path.display().to_string())
    }
}

async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %partial.display(), error = %e, "partial manifest left behind");
        }
    }
}
