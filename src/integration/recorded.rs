//! Replay of detections recorded ahead of time.

use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use image::RgbImage;
use tracing::info;

use super::DetectionSource;
use crate::error::{EngageError, Result};
use crate::tracker::Detection;

/// Detections read from a JSON Lines file: line `n` holds the JSON array of
/// detections for frame `n`. Blank lines are frames without faces.
///
/// Frames past the end of the recording have no detections.
#[derive(Debug, Clone, Default)]
pub struct RecordedDetections {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
}

impl RecordedDetections {
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Load a whole recording. Any malformed line fails the load.
    pub fn from_jsonl_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |reason: String| EngageError::SourceUnavailable {
            source_name: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
        let mut frames = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                frames.push(Vec::new());
                continue;
            }
            let dets: Vec<Detection> = serde_json::from_str(&line)
                .map_err(|e| unavailable(format!("line {}: {}", n + 1, e)))?;
            frames.push(dets);
        }

        info!(path = %path.display(), frames = frames.len(), "loaded recorded detections");
        Ok(Self::new(frames))
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectionSource for RecordedDetections {
    type Error = Infallible;

    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        let dets = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        Ok(dets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_replay_in_order_then_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"[{{"bbox": {{"x": 10, "y": 20, "width": 40, "height": 40}}, "eye_count": 2}}]"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"[]"#).unwrap();

        let mut rec = RecordedDetections::from_jsonl_file(file.path()).unwrap();
        assert_eq!(rec.len(), 3);

        let frame = RgbImage::new(1, 1);
        let first = rec.detect(&frame).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].eye_count, Some(2));
        assert_eq!(first[0].score, 1.0);

        for _ in 0..4 {
            assert!(rec.detect(&frame).unwrap().is_empty());
        }
    }

    #[test]
    fn test_malformed_line_fails_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[]").unwrap();
        writeln!(file, "not json").unwrap();

        let err = RecordedDetections::from_jsonl_file(file.path()).unwrap_err();
        match err {
            EngageError::SourceUnavailable { reason, .. } => assert!(reason.starts_with("line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
