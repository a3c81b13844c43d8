//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors surfaced by sessions, frame sources, configuration and report I/O.
///
/// Per-frame problems (a detector failing on one frame, a degenerate crop,
/// a classifier that cannot predict) are recovered inside the pipeline and
/// never show up here.
#[derive(Debug, Error)]
pub enum EngageError {
    /// The frame source could not be opened. Nothing has been processed.
    #[error("cannot open frame source {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Reading the next frame failed after the source was opened.
    #[error("failed to read frame: {0}")]
    FrameRead(String),

    /// Invalid analyzer or detector configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A model artifact (classifier, cascade) could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Errors raised by a hand-raise classifier at prediction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },

    #[error("malformed tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },
}

pub type Result<T, E = EngageError> = std::result::Result<T, E>;
