//! Pixel features of the region above a detected face.

use image::{GrayImage, Luma, RgbImage, imageops};

use crate::tracker::Rect;

/// Skin range in 8-bit HSV (hue in 0..180), inclusive on both ends.
const SKIN_LOW: [u8; 3] = [0, 20, 70];
const SKIN_HIGH: [u8; 3] = [20, 255, 255];

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Number of values in a [`HandFeatures`] vector.
pub const HAND_FEATURE_COUNT: usize = 9;

/// Pixel rectangle `[x, y, width, height]` above a face: 1.5x the face height
/// and twice its width, centered horizontally, clipped to the frame.
///
/// Returns `None` when the clipped region is empty.
pub fn above_face_region(bbox: &Rect, frame_width: u32, frame_height: u32) -> Option<[u32; 4]> {
    let x = bbox.x.round() as i64;
    let y = (bbox.y.round() as i64).min(frame_height as i64);
    let w = bbox.width.round() as i64;
    let h = bbox.height.round() as i64;
    if w <= 0 || h <= 0 {
        return None;
    }

    let above_h = (h as f64 * 1.5) as i64;
    let top = (y - above_h).max(0);
    let left = (x - w / 2).max(0);
    let right = (x + w + w / 2).min(frame_width as i64);

    if y <= top || right <= left {
        return None;
    }
    Some([left as u32, top as u32, (right - left) as u32, (y - top) as u32])
}

/// OpenCV-convention 8-bit HSV: hue halved into 0..180, saturation and value
/// in 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { (diff * 255.0 / v).round() } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let mut h = (h / 2.0).round();
    if h >= 180.0 {
        h -= 180.0;
    }

    [h as u8, s as u8, v as u8]
}

#[inline]
pub fn is_skin(hsv: [u8; 3]) -> bool {
    (0..3).all(|i| hsv[i] >= SKIN_LOW[i] && hsv[i] <= SKIN_HIGH[i])
}

/// BT.601 luma, rounded.
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let l = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([l.round().min(255.0) as u8])
    })
}

fn crop_above_face(frame: &RgbImage, bbox: &Rect) -> Option<RgbImage> {
    let [x, y, w, h] = above_face_region(bbox, frame.width(), frame.height())?;
    Some(imageops::crop_imm(frame, x, y, w, h).to_image())
}

/// Boolean skin mask in row-major order.
fn skin_mask(region: &RgbImage) -> Vec<bool> {
    region
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            is_skin(rgb_to_hsv(r, g, b))
        })
        .collect()
}

/// Fraction of skin-coloured pixels above the face.
pub fn skin_ratio(frame: &RgbImage, bbox: &Rect) -> Option<f32> {
    let region = crop_above_face(frame, bbox)?;
    let mask = skin_mask(&region);
    let skin = mask.iter().filter(|&&s| s).count();
    Some(skin as f32 / mask.len() as f32)
}

/// Feature vector fed to the hand-raise classifier.
///
/// Order: skin ratio; skin share of the top, middle and bottom thirds;
/// skin share of the left and right halves; mean brightness; edge density;
/// region aspect ratio (rows / cols).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandFeatures(pub [f32; HAND_FEATURE_COUNT]);

impl HandFeatures {
    pub fn extract(frame: &RgbImage, bbox: &Rect) -> Option<Self> {
        let region = crop_above_face(frame, bbox)?;
        let (cols, rows) = (region.width() as usize, region.height() as usize);
        let mask = skin_mask(&region);

        let row_counts: Vec<usize> = mask
            .chunks(cols)
            .map(|row| row.iter().filter(|&&s| s).count())
            .collect();
        let mut col_counts = vec![0usize; cols];
        for row in mask.chunks(cols) {
            for (c, &s) in row.iter().enumerate() {
                col_counts[c] += usize::from(s);
            }
        }
        let total: usize = row_counts.iter().sum();

        let mut f = [0.0f32; HAND_FEATURE_COUNT];
        f[0] = total as f32 / mask.len() as f32;

        if total > 0 {
            let third = |a: usize, b: usize| row_counts[a..b].iter().sum::<usize>() as f32 / total as f32;
            f[1] = third(0, rows / 3);
            f[2] = third(rows / 3, 2 * rows / 3);
            f[3] = third(2 * rows / 3, rows);

            let left: usize = col_counts[..cols / 2].iter().sum();
            f[4] = left as f32 / total as f32;
            f[5] = (total - left) as f32 / total as f32;
        } else {
            f[4] = 0.5;
            f[5] = 0.5;
        }

        let gray = to_gray(&region);
        let brightness: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
        f[6] = brightness as f32 / (gray.len() as f32) / 255.0;

        let edges = imageproc::edges::canny(&gray, CANNY_LOW, CANNY_HIGH);
        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();
        f[7] = edge_pixels as f32 / edges.len() as f32;

        f[8] = rows as f32 / cols as f32;

        Some(Self(f))
    }

    #[inline]
    pub fn skin_ratio(&self) -> f32 {
        self.0[0]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const SKIN: Rgb<u8> = Rgb([220, 160, 120]);
    const WALL: Rgb<u8> = Rgb([40, 60, 200]);

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_skin_range() {
        let [r, g, b] = SKIN.0;
        assert!(is_skin(rgb_to_hsv(r, g, b)));
        let [r, g, b] = WALL.0;
        assert!(!is_skin(rgb_to_hsv(r, g, b)));
        // Too dark.
        assert!(!is_skin(rgb_to_hsv(60, 40, 30)));
    }

    #[test]
    fn test_region_geometry() {
        let bbox = Rect::new(100.0, 200.0, 40.0, 60.0);
        // 1.5 * 60 = 90 rows above, columns 80..160.
        assert_eq!(above_face_region(&bbox, 640, 480), Some([80, 110, 80, 90]));

        // Clipped at the top and left edges.
        let bbox = Rect::new(10.0, 30.0, 40.0, 40.0);
        assert_eq!(above_face_region(&bbox, 640, 480), Some([0, 0, 70, 30]));

        // Face touching the top edge leaves nothing above it.
        let bbox = Rect::new(10.0, 0.0, 40.0, 40.0);
        assert_eq!(above_face_region(&bbox, 640, 480), None);
    }

    #[test]
    fn test_skin_ratio() {
        let bbox = Rect::new(100.0, 200.0, 40.0, 60.0);

        let frame = RgbImage::from_pixel(640, 480, SKIN);
        assert_eq!(skin_ratio(&frame, &bbox), Some(1.0));

        let frame = RgbImage::from_pixel(640, 480, WALL);
        assert_eq!(skin_ratio(&frame, &bbox), Some(0.0));
    }

    #[test]
    fn test_features_without_skin() {
        let frame = RgbImage::from_pixel(640, 480, WALL);
        let bbox = Rect::new(100.0, 200.0, 40.0, 60.0);
        let f = HandFeatures::extract(&frame, &bbox).unwrap();

        assert_eq!(f.skin_ratio(), 0.0);
        assert_eq!(&f.0[1..6], &[0.0, 0.0, 0.0, 0.5, 0.5]);
        assert_eq!(f.0[7], 0.0); // flat colour has no edges
        assert!((f.0[8] - 90.0 / 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_features_skin_in_top_left() {
        // Region is columns 80..160, rows 110..200; paint its top-left quarter.
        let mut frame = RgbImage::from_pixel(640, 480, WALL);
        for y in 110..140 {
            for x in 80..120 {
                frame.put_pixel(x, y, SKIN);
            }
        }
        let bbox = Rect::new(100.0, 200.0, 40.0, 60.0);
        let f = HandFeatures::extract(&frame, &bbox).unwrap();

        assert!((f.skin_ratio() - (30.0 * 40.0) / (90.0 * 80.0)).abs() < 1e-6);
        assert_eq!(&f.0[1..4], &[1.0, 0.0, 0.0]);
        assert_eq!(&f.0[4..6], &[1.0, 0.0]);
        assert!(f.0[7] > 0.0);
    }
}
