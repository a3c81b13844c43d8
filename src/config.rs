//! Analyzer and detector configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngageError, Result};
use crate::scoring::HandRaisePolicy;
use crate::tracker::{TrackerConfig, TrackingMode};

/// Frames that must pass after a counted raise before the next one counts.
pub const DEFAULT_COOLDOWN_FRAMES: u64 = 30;

/// Face and eye detector knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Image pyramid step of the face cascade
    pub scale_factor: f64,
    /// Neighbouring hits required to keep a face candidate
    pub min_neighbors: i32,
    /// Smallest face side in pixels
    pub min_face_size: i32,
    pub eye_scale_factor: f64,
    pub eye_min_neighbors: i32,
    /// Detections scoring below this are discarded before tracking
    pub min_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_face_size: 30,
            eye_scale_factor: 1.1,
            eye_min_neighbors: 3,
            min_confidence: 0.0,
        }
    }
}

/// Everything a [`Session`](crate::session::Session) needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub tracker: TrackerConfig,
    pub hand_raise: HandRaisePolicy,
    /// Hand-raise cooldown window in frames
    pub cooldown_frames: u64,
    pub detector: DetectorConfig,
    /// Forest classifier artifact used by the classifier policy
    pub classifier_path: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            hand_raise: HandRaisePolicy::default(),
            cooldown_frames: DEFAULT_COOLDOWN_FRAMES,
            detector: DetectorConfig::default(),
            classifier_path: None,
        }
    }
}

impl AnalyzerConfig {
    /// Classifier-backed hand raises, tight gate.
    pub fn accurate() -> Self {
        Self {
            tracker: TrackerConfig {
                tracking_gate: 80.0,
                history_capacity: 50,
                ..Default::default()
            },
            hand_raise: HandRaisePolicy::classifier(),
            ..Default::default()
        }
    }

    /// Small classroom with a roster fixed by the first frame with faces.
    pub fn fixed_roster() -> Self {
        Self {
            tracker: TrackerConfig {
                tracking_gate: 150.0,
                history_capacity: 50,
                max_identities: Some(6),
                mode: TrackingMode::FixedRoster,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Live monitoring: wider gate, shorter histories.
    pub fn realtime() -> Self {
        Self {
            tracker: TrackerConfig {
                tracking_gate: 100.0,
                history_capacity: 30,
                ..Default::default()
            },
            hand_raise: HandRaisePolicy::skin_ratio(),
            ..Default::default()
        }
    }

    /// Load a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| EngageError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EngageError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let gate = self.tracker.tracking_gate;
        if !gate.is_finite() || gate <= 0.0 {
            return Err(EngageError::Config(format!(
                "tracking_gate must be a positive number, got {gate}"
            )));
        }
        if self.tracker.history_capacity == 0 {
            return Err(EngageError::Config("history_capacity must be positive".into()));
        }
        if self.tracker.max_identities == Some(0) {
            return Err(EngageError::Config("max_identities must be positive".into()));
        }

        let (name, value) = match self.hand_raise {
            HandRaisePolicy::SkinRatio { threshold } => ("threshold", threshold),
            HandRaisePolicy::Classifier { min_probability } => ("min_probability", min_probability),
            HandRaisePolicy::PoseLandmarks { margin } => ("margin", margin),
        };
        if !(0.0..=1.0).contains(&value) {
            return Err(EngageError::Config(format!(
                "hand-raise {name} must lie in [0, 1], got {value}"
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(EngageError::Config(format!(
                "min_confidence must lie in [0, 1], got {}",
                self.detector.min_confidence
            )));
        }
        if self.detector.scale_factor <= 1.0 || self.detector.eye_scale_factor <= 1.0 {
            return Err(EngageError::Config("cascade scale factors must exceed 1".into()));
        }
        Ok(())
    }
}
