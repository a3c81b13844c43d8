//! Engagement and attention formulas.
//!
//! The weights and windows below are fixed contracts; reports from
//! different runs are only comparable while they stay unchanged.

use serde::{Deserialize, Serialize};

use crate::tracker::{Identity, variance};

const EYE_WEIGHT: f64 = 0.7;
const MOVEMENT_WEIGHT: f64 = 0.3;
const MOVEMENT_PENALTY: f64 = 2.0;
const MOVEMENT_WINDOW: usize = 10;
/// Movement score needs strictly more than five samples.
const MIN_MOVEMENT_SAMPLES: usize = 6;
const ATTENTION_WINDOW: usize = 10;
const VARIANCE_DIVISOR: f64 = 10.0;

/// Score used when a history is too short to say anything.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// `eye_score * 0.7 + movement_score * 0.3`, in [0, 100].
///
/// Zero while no eye-visibility sample exists.
pub fn engagement_score(identity: &Identity) -> f64 {
    let Some(eye_mean) = identity.eye_visibility.mean() else {
        return 0.0;
    };
    let eye_score = eye_mean * 100.0;

    let movement_score = if identity.movement.len() >= MIN_MOVEMENT_SAMPLES {
        let avg = identity.movement.mean_recent(MOVEMENT_WINDOW).unwrap_or(0.0);
        (100.0 - avg * MOVEMENT_PENALTY).max(0.0)
    } else {
        NEUTRAL_SCORE
    };

    (eye_score * EYE_WEIGHT + movement_score * MOVEMENT_WEIGHT).clamp(0.0, 100.0)
}

/// Positional stability over the last ten centers, in [0, 100].
///
/// Exactly 50 with fewer than ten position samples.
pub fn attention_score(identity: &Identity) -> f64 {
    if identity.positions.len() < ATTENTION_WINDOW {
        return NEUTRAL_SCORE;
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = identity
        .positions
        .recent(ATTENTION_WINDOW)
        .map(|p| (p.x as f64, p.y as f64))
        .unzip();
    let spread = variance(&xs).unwrap_or(0.0) + variance(&ys).unwrap_or(0.0);

    (100.0 - spread / VARIANCE_DIVISOR).clamp(0.0, 100.0)
}

/// Coarse label for an engagement score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementLevel {
    Engaged,
    Moderate,
    Distracted,
}

impl EngagementLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 60.0 {
            Self::Engaged
        } else if score > 40.0 {
            Self::Moderate
        } else {
            Self::Distracted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engaged => "Engaged",
            Self::Moderate => "Moderate",
            Self::Distracted => "Distracted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::IdentityId;
    use nalgebra::Point2;

    fn identity() -> Identity {
        Identity::new(IdentityId(1), Point2::new(0.0, 0.0), 50, 1)
    }

    #[test]
    fn test_engagement_all_eyes_no_movement() {
        let mut ident = identity();
        for _ in 0..5 {
            ident.eye_visibility.push(1);
        }
        assert!((engagement_score(&ident) - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_engagement_without_eye_samples_is_zero() {
        assert_eq!(engagement_score(&identity()), 0.0);
    }

    #[test]
    fn test_engagement_movement_window() {
        let mut ident = identity();
        ident.eye_visibility.push(0);
        // Five samples: still the neutral movement score.
        for _ in 0..5 {
            ident.movement.push(10.0);
        }
        assert!((engagement_score(&ident) - 15.0).abs() < 1e-9);

        // Sixth sample switches to 100 - 2 * mean = 80.
        ident.movement.push(10.0);
        assert!((engagement_score(&ident) - 24.0).abs() < 1e-9);

        // Only the last ten samples matter; heavy movement clamps to zero.
        for _ in 0..10 {
            ident.movement.push(75.0);
        }
        assert_eq!(engagement_score(&ident), 0.0);
    }

    #[test]
    fn test_attention_defaults_and_stability() {
        let mut ident = identity();
        for _ in 0..9 {
            ident.positions.push(Point2::new(100.0, 100.0));
        }
        assert_eq!(attention_score(&ident), 50.0);

        ident.positions.push(Point2::new(100.0, 100.0));
        assert_eq!(attention_score(&ident), 100.0);
    }

    #[test]
    fn test_attention_variance_penalty() {
        let mut ident = identity();
        // x alternates 90/110: variance 100; y constant.
        for i in 0..10 {
            let x = if i % 2 == 0 { 90.0 } else { 110.0 };
            ident.positions.push(Point2::new(x, 50.0));
        }
        assert!((attention_score(&ident) - 90.0).abs() < 1e-9);

        for i in 0..10 {
            ident.positions.push(Point2::new(i as f32 * 200.0, 0.0));
        }
        assert_eq!(attention_score(&ident), 0.0);
    }

    #[test]
    fn test_levels() {
        assert_eq!(EngagementLevel::from_score(85.0), EngagementLevel::Engaged);
        assert_eq!(EngagementLevel::from_score(60.0), EngagementLevel::Moderate);
        assert_eq!(EngagementLevel::from_score(40.0), EngagementLevel::Distracted);
        assert_eq!(EngagementLevel::Moderate.as_str(), "Moderate");
    }
}
