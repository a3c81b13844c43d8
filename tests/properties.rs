use engagetrack_rs::tracker::RollingHistory;
use engagetrack_rs::{AnalyzerConfig, Detection, Session};
use image::{Rgb, RgbImage};
use proptest::prelude::*;

/// Up to three faces per frame anywhere in a 640x480 frame, with eye counts.
fn frame_detections() -> impl Strategy<Value = Vec<Detection>> {
    prop::collection::vec(
        (0.0f32..600.0, 0.0f32..440.0, 20.0f32..80.0, prop::option::of(0u32..4)),
        0..4,
    )
    .prop_map(|faces| {
        faces
            .into_iter()
            .map(|(x, y, size, eyes)| {
                let mut det = Detection::new(x, y, size, size);
                det.eye_count = eyes;
                det
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn test_history_never_exceeds_capacity(
        capacity in 1usize..64,
        samples in prop::collection::vec(-1000.0f64..1000.0, 0..200),
    ) {
        let mut history = RollingHistory::new(capacity);
        for &s in &samples {
            history.push(s);
            prop_assert!(history.len() <= capacity);
        }

        let expected: Vec<f64> = samples.iter().rev().take(capacity).rev().copied().collect();
        let kept: Vec<f64> = history.iter().copied().collect();
        prop_assert_eq!(kept, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_scores_stay_in_range(frames in prop::collection::vec(frame_detections(), 1..40)) {
        let frame = RgbImage::from_pixel(640, 480, Rgb([180, 140, 110]));
        let mut session = Session::new(&AnalyzerConfig::realtime(), 30.0).unwrap();

        for dets in &frames {
            let summary = session.ingest(&frame, dets);
            prop_assert!(summary.subjects.len() <= dets.len());
            for subject in &summary.subjects {
                prop_assert!((0.0..=100.0).contains(&subject.engagement));
                prop_assert!((0.0..=100.0).contains(&subject.attention));
            }
        }

        let report = session.report();
        prop_assert_eq!(report.frames_processed, frames.len() as u64);
        for ident in &report.identities {
            prop_assert!((0.0..=100.0).contains(&ident.avg_engagement));
            prop_assert!((0.0..=100.0).contains(&ident.avg_attention));
        }
    }

    #[test]
    fn test_no_identity_updated_twice_per_frame(frames in prop::collection::vec(frame_detections(), 1..30)) {
        let frame = RgbImage::new(640, 480);
        let mut session = Session::new(&AnalyzerConfig::default(), 30.0).unwrap();

        for dets in &frames {
            let summary = session.ingest(&frame, dets);
            let mut ids: Vec<_> = summary.subjects.iter().map(|s| s.id).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), summary.subjects.len());
        }
    }
}
