use image::imageops;
use tracing::debug;

use crate::engine::detection::{external_regions, foreground_mask, Region};
use crate::engine::error::EngineError;
use crate::types::{Raster, Step};

/// Contours below this share of the frame are noise.
const MIN_CONTOUR_RATIO: f64 = 0.01;
/// Union boxes outside this band are left alone.
const MIN_BOX_RATIO: f64 = 0.40;
const MAX_BOX_RATIO: f64 = 0.95;
const PADDING_RATIO: f64 = 0.08;

/// Crop rectangle in raster coordinates, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Picks the padded union box of the significant foreground contours, or
/// `None` when cropping would be noise, over-tight or pointless.
pub fn plan_crop(raster: &Raster) -> Option<CropWindow> {
    let (w, h) = raster.dimensions();
    let image_area = w as f64 * h as f64;
    let mask = foreground_mask(raster);

    let union = external_regions(&mask)
        .into_iter()
        .filter(|r| r.area >= image_area * MIN_CONTOUR_RATIO)
        .reduce(|acc, r| acc.union(&r))?;

    let box_ratio = union.box_area() as f64 / image_area;
    if !(MIN_BOX_RATIO..=MAX_BOX_RATIO).contains(&box_ratio) {
        debug!(box_ratio, "Crop skipped, subject box out of range");
        return None;
    }

    Some(pad(&union, w, h))
}

fn pad(union: &Region, w: u32, h: u32) -> CropWindow {
    let pad = (PADDING_RATIO * union.width.max(union.height) as f64) as u32;
    let x1 = union.x.saturating_sub(pad);
    let y1 = union.y.saturating_sub(pad);
    let x2 = (union.right() + pad).min(w);
    let y2 = (union.bottom() + pad).min(h);
    CropWindow {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    }
}

/// Crops to the planned window. Returns the window applied, if any.
pub fn smart_crop(raster: &mut Raster) -> Result<Option<CropWindow>, EngineError> {
    let Some(window) = plan_crop(raster) else {
        return Ok(None);
    };
    if window.width == 0 || window.height == 0 {
        return Err(EngineError::operator(
            Step::SmartCrop,
            format!("degenerate crop window {window:?}"),
        ));
    }

    *raster = imageops::crop_imm(&*raster, window.x, window.y, window.width, window.height).to_image();
    debug!(?window, "Smart crop applied");
    Ok(Some(window))
}
