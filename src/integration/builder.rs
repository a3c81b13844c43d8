//! Builder for creating Detection objects from various input formats.

use crate::tracker::{Detection, PoseLandmarks, Rect};

/// Builder for creating `Detection` objects from various input formats.
#[derive(Debug, Clone)]
pub struct DetectionBuilder {
    bbox: Rect,
    score: f32,
    eye_count: Option<u32>,
    pose: Option<PoseLandmarks>,
}

impl Default for DetectionBuilder {
    fn default() -> Self {
        Self {
            bbox: Rect::default(),
            score: 1.0,
            eye_count: None,
            pose: None,
        }
    }
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::from_center(cx, cy, w, h);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height), the
    /// layout cascade detectors report.
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = Rect::new(x, y, w, h);
        self
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Number of eyes found inside the face box.
    pub fn eyes(mut self, eye_count: u32) -> Self {
        self.eye_count = Some(eye_count);
        self
    }

    /// Eye count that may be missing, e.g. when the measurement failed.
    pub fn eye_count(mut self, eye_count: Option<u32>) -> Self {
        self.eye_count = eye_count;
        self
    }

    pub fn pose(mut self, pose: PoseLandmarks) -> Self {
        self.pose = Some(pose);
        self
    }

    /// Build the final `Detection`.
    pub fn build(self) -> Detection {
        Detection {
            bbox: self.bbox,
            score: self.score,
            eye_count: self.eye_count,
            pose: self.pose,
        }
    }
}
