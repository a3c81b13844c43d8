//! Trait for face detection backends.

use std::fmt::Display;

use image::RgbImage;
use tracing::warn;

use crate::tracker::Detection;

/// Trait for face detection backends.
///
/// Implement this trait to feed any face detector into an
/// [`AnalysisPipeline`](super::AnalysisPipeline). Implementations should be
/// deterministic for a given frame and configuration.
///
/// # Example
///
/// ```ignore
/// use engagetrack_rs::{Detection, DetectionSource};
/// use image::RgbImage;
///
/// struct MyDetector;
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error: std::fmt::Display;

    /// Find the faces in one frame, with eye counts when available.
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error>;
}

impl<D: DetectionSource + ?Sized> DetectionSource for Box<D> {
    type Error = D::Error;

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        (**self).detect(frame)
    }
}

/// Result of an optional per-face measurement. A failure is logged and the
/// feature counts as absent for that face only.
pub fn measured_or_absent<T, E: Display>(feature: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(feature, error = %e, "measurement failed, treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::DetectionBuilder;

    #[test]
    fn test_failed_measurement_keeps_face() {
        let faces: Vec<Detection> = [Ok(2), Err("roi outside frame"), Ok(0)]
            .into_iter()
            .enumerate()
            .map(|(i, eyes)| {
                DetectionBuilder::new()
                    .tlwh(50.0 * i as f32, 0.0, 40.0, 40.0)
                    .eye_count(measured_or_absent("eyes", eyes))
                    .build()
            })
            .collect();

        assert_eq!(faces.len(), 3);
        assert_eq!(faces[0].eye_count, Some(2));
        assert_eq!(faces[1].eye_count, None);
        assert_eq!(faces[2].eye_count, Some(0));
    }
}
