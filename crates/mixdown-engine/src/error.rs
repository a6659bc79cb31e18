//! Error types for engine calls and orchestration.

use std::time::Duration;

use mixdown_core::crossfade::CrossfadeError;
use mixdown_core::envelope::CurveError;
use mixdown_core::graph::BuildError;
use mixdown_core::validation::ValidationResult;
use thiserror::Error;

/// Failure of a single external engine call.
///
/// Split into retryable (rate limiting, transient failure, timeout) and
/// permanent (malformed request, rejection, engine unavailable) classes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine asked the caller to slow down.
    #[error("{operation}: rate limited: {message}")]
    RateLimited {
        /// Engine operation name.
        operation: &'static str,
        /// Engine-provided detail.
        message: String,
    },

    /// A failure expected to clear on retry.
    #[error("{operation}: transient failure: {message}")]
    Transient {
        /// Engine operation name.
        operation: &'static str,
        /// Engine-provided detail.
        message: String,
    },

    /// The call exceeded its per-call budget.
    #[error("{operation}: timed out after {:.1}s", .after.as_secs_f64())]
    Timeout {
        /// Engine operation name.
        operation: &'static str,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// The engine could not interpret the request.
    #[error("{operation}: malformed request: {message}")]
    Malformed {
        /// Engine operation name.
        operation: &'static str,
        /// Engine-provided detail.
        message: String,
    },

    /// The engine understood the request and refused it.
    #[error("{operation}: rejected: {message}")]
    Rejected {
        /// Engine operation name.
        operation: &'static str,
        /// Engine-provided detail.
        message: String,
    },

    /// The engine could not be started at all.
    #[error("{operation}: engine unavailable: {source}")]
    Unavailable {
        /// Engine operation name.
        operation: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Create a transient failure.
    pub fn transient(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            operation,
            message: message.into(),
        }
    }

    /// Create a rejection.
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    /// Create a malformed-request failure.
    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            operation,
            message: message.into(),
        }
    }

    /// `true` if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient { .. } | Self::Timeout { .. }
        )
    }

    /// The engine operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::RateLimited { operation, .. }
            | Self::Transient { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Malformed { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Unavailable { operation, .. } => *operation,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Transient { .. } => "transient",
            Self::Timeout { .. } => "timeout",
            Self::Malformed { .. } => "malformed_request",
            Self::Rejected { .. } => "rejected",
            Self::Unavailable { .. } => "engine_unavailable",
        }
    }
}

/// Failure of a per-scene mix.
#[derive(Debug, Error)]
pub enum MixError {
    /// The scene id cannot name a file inside the work dir.
    #[error("scene '{scene_id}': scene id must be a plain file name")]
    InvalidSceneId {
        /// Rejected id.
        scene_id: String,
    },

    /// Inputs cannot form a mix.
    #[error("scene '{scene_id}': {source}")]
    Structure {
        /// Scene being mixed.
        scene_id: String,
        /// Why the inputs were rejected.
        #[source]
        source: BuildError,
    },

    /// The configured envelope hop is unusable.
    #[error("scene '{scene_id}': {source}")]
    Curve {
        /// Scene being mixed.
        scene_id: String,
        /// Underlying curve error.
        #[source]
        source: CurveError,
    },

    /// The built graph failed validation; it was not sent to the engine.
    #[error("scene '{scene_id}': invalid mix graph: {}", .report.error_summary())]
    InvalidGraph {
        /// Scene being mixed.
        scene_id: String,
        /// Full validation report.
        report: ValidationResult,
    },

    /// An engine call failed after retries.
    #[error("scene '{scene_id}': {source}")]
    Engine {
        /// Scene being mixed.
        scene_id: String,
        /// Last engine error.
        #[source]
        source: EngineError,
    },

    /// The scene's task was aborted or panicked.
    #[error("scene '{scene_id}': mix task cancelled")]
    Cancelled {
        /// Scene being mixed.
        scene_id: String,
    },
}

impl MixError {
    /// Scene the failure belongs to.
    pub fn scene_id(&self) -> &str {
        match self {
            Self::InvalidSceneId { scene_id }
            | Self::Structure { scene_id, .. }
            | Self::Curve { scene_id, .. }
            | Self::InvalidGraph { scene_id, .. }
            | Self::Engine { scene_id, .. }
            | Self::Cancelled { scene_id } => scene_id,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSceneId { .. } => "invalid_scene_id",
            Self::Structure {
                source: BuildError::MissingDialogue,
                ..
            } => "missing_dialogue",
            Self::Structure {
                source: BuildError::DuplicateRole(_),
                ..
            } => "duplicate_role",
            Self::Curve { .. } => "invalid_hop",
            Self::InvalidGraph { .. } => "invalid_graph",
            Self::Engine { source, .. } => source.kind(),
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Failure of an episode export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Scene list or crossfade cannot be laid out.
    #[error("project '{project_id}': {source}")]
    Layout {
        /// Project being exported.
        project_id: String,
        /// Underlying layout error.
        #[source]
        source: CrossfadeError,
    },

    /// The concatenation call failed after retries. Nothing was published.
    #[error("project '{project_id}': {source}")]
    Engine {
        /// Project being exported.
        project_id: String,
        /// Last engine error.
        #[source]
        source: EngineError,
    },
}

impl ExportError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Layout {
                source: CrossfadeError::NoScenes,
                ..
            } => "no_scenes",
            Self::Layout { .. } => "invalid_layout",
            Self::Engine { source, .. } => source.kind(),
        }
    }
}
