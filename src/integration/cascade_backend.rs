//! OpenCV Haar cascade face/eye detector and video decoding.
//!
//! # Example
//!
//! ```ignore
//! use engagetrack_rs::{AnalysisPipeline, AnalyzerConfig, CascadeDetector, Session, VideoCaptureSource};
//!
//! let config = AnalyzerConfig::default();
//! let detector = CascadeDetector::new(
//!     "haarcascade_frontalface_default.xml",
//!     "haarcascade_eye.xml",
//!     config.detector.clone(),
//! )?;
//! let mut source = VideoCaptureSource::open("class.mp4")?;
//! let session = Session::new(&config, source.fps())?;
//! let report = AnalysisPipeline::new(detector, session).run(&mut source)?;
//! ```

use std::path::Path;

use image::RgbImage;
use opencv::core::{Mat, Rect as CvRect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use opencv::{imgproc, objdetect};
use tracing::info;

use super::{DetectionBuilder, DetectionSource, FrameSource, measured_or_absent, nominal_fps};
use crate::config::DetectorConfig;
use crate::error::{EngageError, Result};
use crate::scoring::to_gray;
use crate::tracker::Detection;

fn load_cascade(path: &Path) -> Result<CascadeClassifier> {
    let name = path
        .to_str()
        .ok_or_else(|| EngageError::ModelLoad(format!("{}: path is not UTF-8", path.display())))?;
    let cascade = CascadeClassifier::new(name)
        .map_err(|e| EngageError::ModelLoad(format!("{name}: {e}")))?;
    if cascade.empty().unwrap_or(true) {
        return Err(EngageError::ModelLoad(format!("{name}: empty cascade")));
    }
    Ok(cascade)
}

/// Haar cascade face detector with an eye cascade run inside each face box.
pub struct CascadeDetector {
    faces: CascadeClassifier,
    eyes: CascadeClassifier,
    config: DetectorConfig,
}

impl CascadeDetector {
    pub fn new(
        face_cascade: impl AsRef<Path>,
        eye_cascade: impl AsRef<Path>,
        config: DetectorConfig,
    ) -> Result<Self> {
        let faces = load_cascade(face_cascade.as_ref())?;
        let eyes = load_cascade(eye_cascade.as_ref())?;
        info!(
            face = %face_cascade.as_ref().display(),
            eye = %eye_cascade.as_ref().display(),
            "loaded cascades"
        );
        Ok(Self {
            faces,
            eyes,
            config,
        })
    }

    fn count_eyes(&mut self, gray: &Mat, face: CvRect) -> opencv::Result<u32> {
        let roi = Mat::roi(gray, face)?.try_clone()?;
        let mut eyes = Vector::<CvRect>::new();
        self.eyes.detect_multi_scale(
            &roi,
            &mut eyes,
            self.config.eye_scale_factor,
            self.config.eye_min_neighbors,
            0,
            Size::default(),
            Size::default(),
        )?;
        Ok(eyes.len() as u32)
    }
}

impl DetectionSource for CascadeDetector {
    type Error = opencv::Error;

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        let luma = to_gray(frame);
        let gray = Mat::new_rows_cols_with_data(
            frame.height() as i32,
            frame.width() as i32,
            luma.as_raw().as_slice(),
        )?
        .try_clone()?;

        let mut faces = Vector::<CvRect>::new();
        self.faces.detect_multi_scale(
            &gray,
            &mut faces,
            self.config.scale_factor,
            self.config.min_neighbors,
            objdetect::CASCADE_SCALE_IMAGE,
            Size::new(self.config.min_face_size, self.config.min_face_size),
            Size::default(),
        )?;

        let mut detections = Vec::with_capacity(faces.len());
        for face in faces {
            let eyes = measured_or_absent("eyes", self.count_eyes(&gray, face));
            detections.push(
                DetectionBuilder::new()
                    .tlwh(face.x as f32, face.y as f32, face.width as f32, face.height as f32)
                    .eye_count(eyes)
                    .build(),
            );
        }
        Ok(detections)
    }
}

/// Video file decoded through OpenCV.
pub struct VideoCaptureSource {
    capture: VideoCapture,
    fps: f64,
    frame_count: Option<u64>,
}

impl VideoCaptureSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |reason: String| EngageError::SourceUnavailable {
            source_name: path.display().to_string(),
            reason,
        };

        let name = path
            .to_str()
            .ok_or_else(|| unavailable("path is not UTF-8".into()))?;
        let capture = VideoCapture::from_file(name, videoio::CAP_ANY)
            .map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(unavailable("capture did not open".into()));
        }

        let fps = nominal_fps(capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0));
        let frame_count = capture
            .get(videoio::CAP_PROP_FRAME_COUNT)
            .ok()
            .filter(|n| *n > 0.0)
            .map(|n| n as u64);

        info!(path = %path.display(), fps, frames = ?frame_count, "opened video");
        Ok(Self {
            capture,
            fps,
            frame_count,
        })
    }
}

impl FrameSource for VideoCaptureSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let read_err = |e: opencv::Error| EngageError::FrameRead(e.to_string());

        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr).map_err(read_err)? || bgr.empty() {
            return Ok(None);
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB).map_err(read_err)?;

        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let data = rgb.data_bytes().map_err(read_err)?.to_vec();
        RgbImage::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| EngageError::FrameRead("frame buffer size mismatch".into()))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count
    }
}
