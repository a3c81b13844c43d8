//! AnalysisPipeline for combining detection with tracking and scoring.

use std::ops::ControlFlow;

use image::RgbImage;
use tracing::{info, warn};

use super::{DetectionSource, FrameSource};
use crate::error::Result;
use crate::report::SessionReport;
use crate::session::{FrameSummary, Session};

/// A combined analyzer that bundles a face detector with a [`Session`].
///
/// Frames must be fed strictly in order: tracking a frame reads the
/// positions left by the previous one.
pub struct AnalysisPipeline<D: DetectionSource> {
    detector: D,
    session: Session,
}

impl<D: DetectionSource> AnalysisPipeline<D> {
    pub fn new(detector: D, session: Session) -> Self {
        Self { detector, session }
    }

    /// Detect, track and score one frame.
    ///
    /// A detector failure is logged and the frame is treated as having no
    /// faces.
    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameSummary {
        let detections = match self.detector.detect(frame) {
            Ok(dets) => dets,
            Err(e) => {
                warn!(
                    frame = self.session.frames_processed() + 1,
                    "face detection failed: {}", e
                );
                Vec::new()
            }
        };
        self.session.ingest(frame, &detections)
    }

    /// Drain `source` and return the session report.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> Result<SessionReport> {
        self.run_with(source, |_, _| ControlFlow::Continue(()))
    }

    /// Drain `source`, handing every frame and its summary to `on_frame`.
    /// Returning `ControlFlow::Break` stops early; the report then covers
    /// the frames processed so far.
    pub fn run_with<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<SessionReport>
    where
        S: FrameSource,
        F: FnMut(&RgbImage, &FrameSummary) -> ControlFlow<()>,
    {
        self.session.set_frame_count_hint(source.frame_count_hint());

        while let Some(frame) = source.next_frame()? {
            let summary = self.process_frame(&frame);
            if on_frame(&frame, &summary).is_break() {
                info!(frame = summary.frame_index, "analysis stopped early");
                break;
            }
        }
        Ok(self.session.report())
    }

    /// Get a reference to the underlying detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get a mutable reference to the underlying detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }
}
