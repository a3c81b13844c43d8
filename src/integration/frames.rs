//! Frame sources feeding the analysis pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::info;

use crate::error::{EngageError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Whole frames per second as used for durations: the container's rate
/// truncated (29.97 becomes 29), zero when unknown or invalid.
pub fn nominal_fps(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported.trunc()
    } else {
        0.0
    }
}

/// Ordered stream of RGB frames.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Nominal frame rate; zero when unknown.
    fn fps(&self) -> f64;

    /// Total number of frames, when the source knows it.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

/// Directory of still images played back in file-name order.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
}

impl ImageSequence {
    /// Open `dir`. Fails immediately when the directory cannot be read or
    /// holds no png/jpg/jpeg/bmp file.
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self> {
        let dir = dir.as_ref();
        let unavailable = |reason: String| EngageError::SourceUnavailable {
            source_name: dir.display().to_string(),
            reason,
        };

        let entries = fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_image_extension(p))
            .collect();
        if paths.is_empty() {
            return Err(unavailable("no image files".into()));
        }
        paths.sort();

        info!(dir = %dir.display(), frames = paths.len(), fps, "opened image sequence");
        Ok(Self {
            paths,
            cursor: 0,
            fps,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let frame = image::open(path)
            .map_err(|e| EngageError::FrameRead(format!("{}: {}", path.display(), e)))?;
        Ok(Some(frame.to_rgb8()))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.paths.len() as u64)
    }
}
