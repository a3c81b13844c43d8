//! One analysis session per video: tracking, scoring and live metrics.

use std::collections::VecDeque;

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::report::SessionReport;
use crate::scoring::{
    EngagementLevel, ForestClassifier, HandRaiseClassifier, HandRaiseDetector, HandRaisePolicy,
    ScoringEngine,
};
use crate::tracker::{Detection, IdentityId, IdentityTracker, Rect};

/// Per-frame detection counts kept for the stable count.
const STABLE_WINDOW: usize = 30;
/// The stable count switches to the median once more counts than this exist.
const STABLE_MIN_SAMPLES: usize = 5;

/// Live state of one subject after a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedSubject {
    pub id: IdentityId,
    pub bbox: Rect,
    pub engagement: f64,
    pub attention: f64,
    pub level: EngagementLevel,
    pub hand_raised: bool,
    pub raise_counted: bool,
}

/// Live metrics returned for every ingested frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSummary {
    /// 1-based index of the frame within the session
    pub frame_index: u64,
    /// Detections kept after confidence filtering
    pub detections: usize,
    pub subjects: Vec<TrackedSubject>,
    /// Median detection count over the recent window
    pub stable_count: usize,
}

pub struct Session {
    tracker: IdentityTracker,
    scoring: ScoringEngine,
    min_confidence: f32,
    frames_processed: u64,
    fps: f64,
    frame_count_hint: Option<u64>,
    recent_counts: VecDeque<usize>,
}

impl Session {
    /// Build a session from a validated config. A classifier artifact named
    /// by the config is loaded when the classifier policy is selected; a
    /// failed load degrades to the skin-ratio policy.
    pub fn new(config: &AnalyzerConfig, fps: f64) -> Result<Self> {
        let classifier: Option<Box<dyn HandRaiseClassifier>> =
            match (&config.hand_raise, &config.classifier_path) {
                (HandRaisePolicy::Classifier { .. }, Some(path)) => {
                    match ForestClassifier::from_json_file(path) {
                        Ok(forest) => Some(Box::new(forest)),
                        Err(e) => {
                            warn!("hand-raise classifier unavailable: {}", e);
                            None
                        }
                    }
                }
                _ => None,
            };
        Self::with_classifier(config, fps, classifier)
    }

    /// Build a session with an explicit classifier instance.
    pub fn with_classifier(
        config: &AnalyzerConfig,
        fps: f64,
        classifier: Option<Box<dyn HandRaiseClassifier>>,
    ) -> Result<Self> {
        config.validate()?;

        let hand_raise = HandRaiseDetector::new(config.hand_raise, classifier);
        info!(
            gate = config.tracker.tracking_gate,
            capacity = config.tracker.history_capacity,
            mode = ?config.tracker.mode,
            policy = ?hand_raise.policy(),
            fps,
            "session started"
        );

        Ok(Self {
            tracker: IdentityTracker::new(config.tracker.clone()),
            scoring: ScoringEngine::new(hand_raise, config.cooldown_frames),
            min_confidence: config.detector.min_confidence,
            frames_processed: 0,
            fps,
            frame_count_hint: None,
            recent_counts: VecDeque::with_capacity(STABLE_WINDOW),
        })
    }

    /// Total frame count reported by the source, used for the duration.
    pub fn set_frame_count_hint(&mut self, hint: Option<u64>) {
        self.frame_count_hint = hint;
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    /// Track and score the faces of one frame.
    pub fn ingest(&mut self, frame: &RgbImage, detections: &[Detection]) -> FrameSummary {
        self.frames_processed += 1;
        let frame_id = self.frames_processed;

        let kept: Vec<Detection> = detections
            .iter()
            .filter(|d| d.score >= self.min_confidence)
            .cloned()
            .collect();
        if kept.len() < detections.len() {
            debug!(
                frame_id,
                discarded = detections.len() - kept.len(),
                "low-confidence detections discarded"
            );
        }

        let assigned = self.tracker.update(&kept, frame_id);

        let mut subjects = Vec::with_capacity(kept.len());
        for (det, id) in kept.iter().zip(assigned) {
            let Some(identity) = id.and_then(|id| self.tracker.identity_mut(id)) else {
                continue;
            };
            let score = self.scoring.score(identity, frame, det, frame_id);
            if score.raise_counted {
                debug!(
                    frame_id,
                    identity = %identity.id,
                    total = identity.hand_raises(),
                    "hand raise counted"
                );
            }
            subjects.push(TrackedSubject {
                id: identity.id,
                bbox: det.bbox,
                engagement: score.engagement,
                attention: score.attention,
                level: EngagementLevel::from_score(score.engagement),
                hand_raised: score.hand_raised,
                raise_counted: score.raise_counted,
            });
        }

        if self.recent_counts.len() == STABLE_WINDOW {
            self.recent_counts.pop_front();
        }
        self.recent_counts.push_back(kept.len());

        FrameSummary {
            frame_index: frame_id,
            detections: kept.len(),
            subjects,
            stable_count: self.stable_count(kept.len()),
        }
    }

    fn stable_count(&self, current: usize) -> usize {
        if self.recent_counts.len() <= STABLE_MIN_SAMPLES {
            return current;
        }
        let mut counts: Vec<usize> = self.recent_counts.iter().copied().collect();
        counts.sort_unstable();
        let mid = counts.len() / 2;
        if counts.len() % 2 == 0 {
            (counts[mid - 1] + counts[mid]) / 2
        } else {
            counts[mid]
        }
    }

    /// Aggregate everything seen so far. Safe to call at any point.
    pub fn report(&self) -> SessionReport {
        let report = SessionReport::from_identities(
            self.tracker.identities(),
            self.frames_processed,
            self.frame_count_hint,
            self.fps,
        );
        info!(
            frames = report.frames_processed,
            identities = report.total_identities,
            duration = report.duration_seconds,
            hand_raises = report.summary.total_hand_raises,
            "session report"
        );
        report
    }
}
