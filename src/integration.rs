//! Integration module for connecting face detectors and frame sources with
//! the analysis session.
//!
//! This module provides traits and utilities for feeding frames from image
//! directories or video files, and detections from recordings or OpenCV
//! cascades, into a [`Session`](crate::session::Session).

mod builder;
mod detector;
mod frames;
mod overlay;
mod pipeline;
mod recorded;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, measured_or_absent};
pub use frames::{FrameSource, ImageSequence, nominal_fps};
pub use overlay::{annotate, level_color};
pub use pipeline::AnalysisPipeline;
pub use recorded::RecordedDetections;

#[cfg(feature = "opencv-backend")]
mod cascade_backend;

#[cfg(feature = "opencv-backend")]
pub use cascade_backend::{CascadeDetector, VideoCaptureSource};
