use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the inference pipeline.
///
/// Only [`PipelineError::Decode`] is a per-request, user-facing condition.
/// Everything else means the artifact triple is missing, corrupt, or
/// mismatched, and the process should not serve predictions.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("embedding length mismatch: classifier expects {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("label codec: {0}")]
    Codec(#[from] CodecError),

    #[error("inference backend: {0}")]
    Inference(String),

    #[error("pipeline used before init")]
    NotInitialized,
}

impl PipelineError {
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors a caller should show to the user and carry on from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("label set is empty")]
    Empty,

    #[error("duplicate class name {0:?}")]
    Duplicate(String),

    #[error("class index {index} out of range for {len} classes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unknown class name {0:?}")]
    UnknownLabel(String),

    #[error("label artifacts disagree: {0}")]
    Disagreement(String),
}
