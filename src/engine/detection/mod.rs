//! Confidence analysis: five heuristic defect scores computed from pixel
//! statistics of the current raster.

use image::{GenericImageView, GrayImage};
use tracing::{debug, instrument};

pub mod channels;
pub mod contours;
pub mod foreground;

pub use contours::{external_regions, Region};
pub use foreground::{foreground_mask, foreground_ratio};

use crate::types::{ConfidenceVector, Dimensions, Raster};

/// Side of the square sampled in each corner for background variance.
const CORNER_SIZE: u32 = 80;
/// Foreground below this share of the frame warrants a crop.
const CROP_FOREGROUND_RATIO: f64 = 0.35;
/// A pixel darker than this fraction of the mean value is shadowed.
const SHADOW_VALUE_FACTOR: f64 = 0.35;
const SHADOW_RATIO_GAIN: f64 = 40.0;
const WATERMARK_LEVEL: u8 = 230;
const WATERMARK_MIN_WIDTH: f64 = 0.25;
const WATERMARK_MAX_HEIGHT: f64 = 0.12;
/// Fixed score reported on the first letterbox-shaped mark.
pub const WATERMARK_CONFIDENCE: f64 = 0.85;

/// Stateless scorer. Never mutates the raster.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceAnalyzer;

impl ConfidenceAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Scores the raster against the five defects. `requested` is the resize target, if any.
    #[instrument(skip(self, raster), fields(width = raster.width(), height = raster.height()))]
    pub fn analyze(&self, raster: &Raster, requested: Option<Dimensions>) -> ConfidenceVector {
        let gray = channels::grayscale(raster);
        let mask = foreground_mask(raster);
        let fg_ratio = foreground_ratio(&mask);

        let confidence = ConfidenceVector {
            bg_clean: background_confidence(&gray),
            shadow: shadow_confidence(raster, &mask),
            crop: crop_confidence(fg_ratio),
            watermark: watermark_confidence(&gray),
            resize: resize_confidence(Dimensions::of(raster), requested),
        };

        debug!(fg_ratio, ?confidence, "Computed confidence vector");
        confidence
    }
}

/// 1.0 only when an explicit target differs from the current size.
pub fn resize_confidence(current: Dimensions, requested: Option<Dimensions>) -> f64 {
    match requested {
        Some(target) if target != current => 1.0,
        _ => 0.0,
    }
}

/// Linear ramp `(0.5 - ratio) * 3`, zero at or above 35% foreground.
pub fn crop_confidence(fg_ratio: f64) -> f64 {
    if fg_ratio < CROP_FOREGROUND_RATIO {
        ((0.5 - fg_ratio) * 3.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Mean intensity spread of the four corners; busy corners mean a dirty backdrop.
pub fn background_confidence(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let cw = CORNER_SIZE.min(w);
    let ch = CORNER_SIZE.min(h);
    let right = w - cw;
    let bottom = h - ch;

    let corners = [(0, 0), (right, 0), (0, bottom), (right, bottom)];
    let corner_std = corners
        .iter()
        .map(|&(x, y)| channels::std_dev(&gray.view(x, y, cw, ch).to_image()))
        .sum::<f64>()
        / corners.len() as f64;

    ((corner_std - 10.0) / 20.0).clamp(0.0, 1.0)
}

/// Share of dark foreground pixels, scaled by 40 and saturated.
pub fn shadow_confidence(raster: &Raster, mask: &GrayImage) -> f64 {
    let value = channels::value_channel(raster);
    let mut mean_v = channels::mean(&value);
    if mean_v == 0.0 {
        mean_v = 1.0;
    }
    let cutoff = SHADOW_VALUE_FACTOR * mean_v;

    let shadowed = value
        .pixels()
        .zip(mask.pixels())
        .filter(|(v, m)| (v[0] as f64) < cutoff && m[0] > 0)
        .count();
    let total = value.width() as f64 * value.height() as f64;
    if total == 0.0 {
        return 0.0;
    }
    (shadowed as f64 / total * SHADOW_RATIO_GAIN).clamp(0.0, 1.0)
}

/// Fixed 0.85 on the first wide, short dark contour; 0 otherwise.
pub fn watermark_confidence(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let marks = channels::threshold_inv(gray, WATERMARK_LEVEL);
    let min_width = w as f64 * WATERMARK_MIN_WIDTH;
    let max_height = h as f64 * WATERMARK_MAX_HEIGHT;

    let found = external_regions(&marks)
        .into_iter()
        .find(|r| r.width as f64 > min_width && (r.height as f64) < max_height);

    match found {
        Some(region) => {
            debug!(?region, "Letterbox-shaped mark found");
            WATERMARK_CONFIDENCE
        }
        None => 0.0,
    }
}
