//! Per-identity, per-frame scoring.

mod classifier;
mod engagement;
mod hand_raise;
mod region;

pub use classifier::{DecisionTree, ForestClassifier, HandRaiseClassifier, TreeNode};
pub use engagement::{EngagementLevel, NEUTRAL_SCORE, attention_score, engagement_score};
pub use hand_raise::{HandRaiseDetector, HandRaisePolicy};
pub use region::{
    HAND_FEATURE_COUNT, HandFeatures, above_face_region, rgb_to_hsv, skin_ratio, to_gray,
};

use image::RgbImage;

use crate::tracker::{Detection, Identity};

/// Scores produced for one identity in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScore {
    pub engagement: f64,
    pub attention: f64,
    /// A raise was observed in this frame
    pub hand_raised: bool,
    /// The raise was counted (outside the cooldown window)
    pub raise_counted: bool,
}

/// Reads an identity's updated histories and appends this frame's samples.
pub struct ScoringEngine {
    hand_raise: HandRaiseDetector,
    cooldown_frames: u64,
}

impl ScoringEngine {
    pub fn new(hand_raise: HandRaiseDetector, cooldown_frames: u64) -> Self {
        Self {
            hand_raise,
            cooldown_frames,
        }
    }

    pub fn hand_raise(&self) -> &HandRaiseDetector {
        &self.hand_raise
    }

    /// Score `identity` after the tracker appended the position of
    /// `detection`: record eye visibility, count hand raises, then compute
    /// and record engagement and attention.
    pub fn score(
        &self,
        identity: &mut Identity,
        frame: &RgbImage,
        detection: &Detection,
        frame_id: u64,
    ) -> FrameScore {
        identity.observe_eyes(detection.eye_count);

        let hand_raised = self.hand_raise.is_raised(frame, detection);
        let raise_counted = identity
            .raises
            .observe(hand_raised, frame_id, self.cooldown_frames);

        let engagement = engagement_score(identity);
        let attention = attention_score(identity);
        identity.record_scores(engagement, attention);

        FrameScore {
            engagement,
            attention,
            hand_raised,
            raise_counted,
        }
    }
}
