//! Multi-student face tracking with heuristic engagement, attention and
//! hand-raise scoring.
//!
//! Frames flow through a [`DetectionSource`] into a [`Session`], which
//! associates faces with persistent identities, scores them, and reduces
//! everything into a [`SessionReport`].

pub mod config;
pub mod error;
pub mod integration;
pub mod report;
pub mod scoring;
pub mod session;
pub mod tracker;

pub use config::{AnalyzerConfig, DetectorConfig};
pub use error::{ClassifierError, EngageError, Result};
pub use integration::{
    AnalysisPipeline, DetectionBuilder, DetectionSource, FrameSource, ImageSequence,
    RecordedDetections, annotate,
};
#[cfg(feature = "opencv-backend")]
pub use integration::{CascadeDetector, VideoCaptureSource};
pub use report::{
    BatchEntry, BatchReport, BatchStatistics, IdentityReport, SessionReport, SessionSummary,
};
pub use scoring::{
    EngagementLevel, ForestClassifier, HandRaiseClassifier, HandRaiseDetector, HandRaisePolicy,
    ScoringEngine,
};
pub use session::{FrameSummary, Session, TrackedSubject};
pub use tracker::{
    AssociationStrategy, Detection, Identity, IdentityId, IdentityTracker, PoseLandmarks, Rect,
    TrackerConfig, TrackingMode,
};
