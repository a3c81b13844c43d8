//! Hand-raise detection policies.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scoring::classifier::HandRaiseClassifier;
use crate::scoring::region::{self, HandFeatures};
use crate::tracker::{Detection, PoseLandmarks};

/// Strategy used to decide whether a subject has a hand raised in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandRaisePolicy {
    /// Skin-coloured pixel share above the face exceeds `threshold`.
    SkinRatio { threshold: f32 },
    /// Pretrained classifier on the above-face feature vector; positive
    /// prediction with probability above `min_probability`.
    Classifier { min_probability: f32 },
    /// Either wrist is higher than its shoulder by more than `margin`
    /// (normalized image height).
    PoseLandmarks { margin: f32 },
}

impl Default for HandRaisePolicy {
    fn default() -> Self {
        Self::skin_ratio()
    }
}

impl HandRaisePolicy {
    pub fn skin_ratio() -> Self {
        Self::SkinRatio { threshold: 0.3 }
    }

    pub fn classifier() -> Self {
        Self::Classifier {
            min_probability: 0.6,
        }
    }

    pub fn pose_landmarks() -> Self {
        Self::PoseLandmarks { margin: 0.1 }
    }
}

/// Applies one [`HandRaisePolicy`] to detections.
pub struct HandRaiseDetector {
    policy: HandRaisePolicy,
    classifier: Option<Box<dyn HandRaiseClassifier>>,
}

impl HandRaiseDetector {
    /// Build a detector. The classifier policy without a classifier degrades
    /// to the default skin-ratio policy.
    pub fn new(policy: HandRaisePolicy, classifier: Option<Box<dyn HandRaiseClassifier>>) -> Self {
        let policy = match policy {
            HandRaisePolicy::Classifier { .. } if classifier.is_none() => {
                warn!("no hand-raise classifier available, using skin-ratio policy");
                HandRaisePolicy::skin_ratio()
            }
            other => other,
        };
        Self { policy, classifier }
    }

    /// The policy actually in effect.
    pub fn policy(&self) -> HandRaisePolicy {
        self.policy
    }

    /// Whether `detection` shows a raised hand in `frame`. Anything that
    /// cannot be evaluated counts as not raised.
    pub fn is_raised(&self, frame: &RgbImage, detection: &Detection) -> bool {
        match self.policy {
            HandRaisePolicy::SkinRatio { threshold } => {
                region::skin_ratio(frame, &detection.bbox).is_some_and(|r| r > threshold)
            }
            HandRaisePolicy::Classifier { min_probability } => {
                self.classify(frame, detection, min_probability)
            }
            HandRaisePolicy::PoseLandmarks { margin } => {
                detection.pose.as_ref().is_some_and(|p| wrist_above_shoulder(p, margin))
            }
        }
    }

    fn classify(&self, frame: &RgbImage, detection: &Detection, min_probability: f32) -> bool {
        let Some(classifier) = self.classifier.as_deref() else {
            return false;
        };
        let Some(features) = HandFeatures::extract(frame, &detection.bbox) else {
            debug!("empty region above face, no hand-raise features");
            return false;
        };

        let verdict = classifier.predict(features.as_slice()).and_then(|positive| {
            let proba = classifier.predict_proba(features.as_slice())?;
            Ok(positive && proba > min_probability)
        });
        match verdict {
            Ok(raised) => raised,
            Err(e) => {
                warn!("hand-raise classifier failed: {}", e);
                false
            }
        }
    }
}

fn wrist_above_shoulder(pose: &PoseLandmarks, margin: f32) -> bool {
    pose.left_wrist_y < pose.left_shoulder_y - margin
        || pose.right_wrist_y < pose.right_shoulder_y - margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use image::Rgb;

    struct FixedClassifier {
        positive: bool,
        proba: f32,
    }

    impl HandRaiseClassifier for FixedClassifier {
        fn predict_proba(&self, _features: &[f32]) -> Result<f32, ClassifierError> {
            Ok(self.proba)
        }

        fn predict(&self, _features: &[f32]) -> Result<bool, ClassifierError> {
            Ok(self.positive)
        }
    }

    struct BrokenClassifier;

    impl HandRaiseClassifier for BrokenClassifier {
        fn predict_proba(&self, features: &[f32]) -> Result<f32, ClassifierError> {
            Err(ClassifierError::FeatureCount {
                expected: 4,
                got: features.len(),
            })
        }
    }

    fn face() -> Detection {
        Detection::new(100.0, 200.0, 40.0, 60.0)
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(320, 320, Rgb([30, 30, 30]))
    }

    fn with_classifier(positive: bool, proba: f32) -> HandRaiseDetector {
        HandRaiseDetector::new(
            HandRaisePolicy::classifier(),
            Some(Box::new(FixedClassifier { positive, proba })),
        )
    }

    #[test]
    fn test_skin_ratio_policy() {
        let detector = HandRaiseDetector::new(HandRaisePolicy::skin_ratio(), None);
        assert!(!detector.is_raised(&frame(), &face()));

        let skin = RgbImage::from_pixel(320, 320, Rgb([220, 160, 120]));
        assert!(detector.is_raised(&skin, &face()));

        // Nothing above a face at the top edge.
        let top = Detection::new(100.0, 0.0, 40.0, 60.0);
        assert!(!detector.is_raised(&skin, &top));
    }

    #[test]
    fn test_classifier_requires_prediction_and_probability() {
        assert!(with_classifier(true, 0.61).is_raised(&frame(), &face()));
        assert!(!with_classifier(true, 0.6).is_raised(&frame(), &face()));
        assert!(!with_classifier(false, 0.9).is_raised(&frame(), &face()));
    }

    #[test]
    fn test_classifier_failure_is_not_raised() {
        let detector =
            HandRaiseDetector::new(HandRaisePolicy::classifier(), Some(Box::new(BrokenClassifier)));
        assert!(!detector.is_raised(&frame(), &face()));
    }

    #[test]
    fn test_missing_classifier_falls_back_to_skin_ratio() {
        let detector = HandRaiseDetector::new(HandRaisePolicy::classifier(), None);
        assert_eq!(detector.policy(), HandRaisePolicy::skin_ratio());
    }

    #[test]
    fn test_pose_policy() {
        let detector = HandRaiseDetector::new(HandRaisePolicy::pose_landmarks(), None);
        let mut det = face();
        assert!(!detector.is_raised(&frame(), &det));

        det.pose = Some(PoseLandmarks {
            left_wrist_y: 0.7,
            right_wrist_y: 0.25,
            left_shoulder_y: 0.5,
            right_shoulder_y: 0.5,
        });
        assert!(detector.is_raised(&frame(), &det));

        det.pose = Some(PoseLandmarks {
            left_wrist_y: 0.45,
            right_wrist_y: 0.6,
            left_shoulder_y: 0.5,
            right_shoulder_y: 0.5,
        });
        assert!(!detector.is_raised(&frame(), &det));
    }

    #[test]
    fn test_policy_serde_tag() {
        let p: HandRaisePolicy =
            serde_json::from_str(r#"{"kind":"classifier","min_probability":0.7}"#).unwrap();
        assert_eq!(p, HandRaisePolicy::Classifier { min_probability: 0.7 });
    }
}
