use anyhow::anyhow;
use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use tracing::debug;

use crate::engine::detection::foreground_mask;
use crate::engine::error::EngineError;
use crate::types::Raster;

/// External foreground extraction capability.
///
/// Given the current raster, return a cutout of the dominant foreground
/// object. RGBA cutouts are alpha-composited on white; anything without an
/// alpha channel replaces the raster as is.
#[cfg_attr(test, mockall::automock)]
pub trait Segmenter: Send + Sync {
    fn segment_foreground(&self, raster: &Raster) -> anyhow::Result<DynamicImage>;
}

/// Heuristic cutout: the foreground mask becomes the alpha channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskSegmenter;

impl Segmenter for MaskSegmenter {
    fn segment_foreground(&self, raster: &Raster) -> anyhow::Result<DynamicImage> {
        let mask = foreground_mask(raster);
        let cutout = RgbaImage::from_fn(raster.width(), raster.height(), |x, y| {
            let [r, g, b] = raster.get_pixel(x, y).0;
            Rgba([r, g, b, mask.get_pixel(x, y)[0]])
        });
        Ok(DynamicImage::ImageRgba8(cutout))
    }
}

/// Stands in when no model is wired; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSegmenter;

impl Segmenter for UnavailableSegmenter {
    fn segment_foreground(&self, _raster: &Raster) -> anyhow::Result<DynamicImage> {
        Err(anyhow!("no segmentation model configured"))
    }
}

/// Flattens a cutout onto an opaque white canvas of the cutout's size.
pub fn composite_on_white(cutout: &DynamicImage) -> Raster {
    if !cutout.color().has_alpha() {
        return cutout.to_rgb8();
    }
    let fg = cutout.to_rgba8();
    let mut canvas = RgbaImage::from_pixel(fg.width(), fg.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut canvas, &fg, 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Replaces the backdrop with white via the segmentation capability.
/// Capability failures come back as `CapabilityError` with the raster untouched.
pub fn replace_background(raster: &mut Raster, segmenter: &dyn Segmenter) -> Result<(), EngineError> {
    let cutout = segmenter
        .segment_foreground(raster)
        .map_err(|e| EngineError::capability(format!("{e:#}")))?;
    if cutout.width() == 0 || cutout.height() == 0 {
        return Err(EngineError::capability("segmenter returned an empty cutout"));
    }

    debug!(
        width = cutout.width(),
        height = cutout.height(),
        alpha = cutout.color().has_alpha(),
        "Compositing cutout on white"
    );
    *raster = composite_on_white(&cutout);
    Ok(())
}
