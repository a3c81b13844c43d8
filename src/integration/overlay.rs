//! Drawing live metrics onto frames.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as PixelRect;

use crate::scoring::EngagementLevel;
use crate::session::FrameSummary;

const ENGAGED: Rgb<u8> = Rgb([0, 200, 0]);
const MODERATE: Rgb<u8> = Rgb([255, 165, 0]);
const DISTRACTED: Rgb<u8> = Rgb([220, 0, 0]);
const HAND_RAISED: Rgb<u8> = Rgb([255, 255, 0]);

/// Border thickness of subject boxes.
const BOX_THICKNESS: i32 = 2;
const BAR_HEIGHT: u32 = 6;

pub fn level_color(level: EngagementLevel) -> Rgb<u8> {
    match level {
        EngagementLevel::Engaged => ENGAGED,
        EngagementLevel::Moderate => MODERATE,
        EngagementLevel::Distracted => DISTRACTED,
    }
}

/// Draw one box per tracked subject, coloured by engagement level, and a
/// bar above the box when the subject's hand is raised.
pub fn annotate(frame: &mut RgbImage, summary: &FrameSummary) {
    for subject in &summary.subjects {
        let b = &subject.bbox;
        let (x, y) = (b.x.round() as i32, b.y.round() as i32);
        let (w, h) = (b.width.round() as i64, b.height.round() as i64);
        if w <= 0 || h <= 0 {
            continue;
        }
        let (w, h) = (w as u32, h as u32);

        let color = level_color(subject.level);
        for offset in 0..BOX_THICKNESS {
            let rect = PixelRect::at(x - offset, y - offset)
                .of_size(w + 2 * offset as u32, h + 2 * offset as u32);
            draw_hollow_rect_mut(frame, rect, color);
        }

        if subject.hand_raised {
            let top = y - BOX_THICKNESS - BAR_HEIGHT as i32 - 2;
            let bar = PixelRect::at(x, top).of_size(w, BAR_HEIGHT);
            draw_filled_rect_mut(frame, bar, HAND_RAISED);
        }
    }
}
