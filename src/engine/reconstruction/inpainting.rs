use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use opencv as cv;
use opencv::core::Mat;
use opencv::photo;
use opencv::prelude::*;
use tracing::debug;

use crate::engine::detection::channels::{count_nonzero, grayscale, threshold_inv};
use crate::engine::error::EngineError;
use crate::types::{Raster, Step};

/// Anything at or below this gray level is treated as a mark.
const MARK_LEVEL: u8 = 220;
/// 3x3 grow to cover glyph edges.
const MARK_GROW: u8 = 1;
pub const DEFAULT_RADIUS: f64 = 5.0;

/// Fast-marching inpainting (Telea) over a binary mask.
///
/// Best effort: the mark is removed, the original content is not recovered.
pub struct InpaintingEngine {
    radius: f64,
    method: i32,
}

impl Default for InpaintingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InpaintingEngine {
    pub fn new() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            method: photo::INPAINT_TELEA,
        }
    }

    /// Fills every non-zero pixel of `mask` in place. Returns the number of
    /// pixels rewritten.
    pub fn inpaint(&self, raster: &mut Raster, mask: &GrayImage) -> Result<u64, EngineError> {
        if raster.dimensions() != mask.dimensions() {
            return Err(EngineError::operator(
                Step::WatermarkRemoval,
                format!(
                    "mask is {:?} but image is {:?}",
                    mask.dimensions(),
                    raster.dimensions()
                ),
            ));
        }

        let filled = count_nonzero(mask);
        if filled == 0 {
            return Ok(0);
        }

        let img = raster_to_mat(raster).map_err(cv_error)?;
        let mask_mat = mask_to_mat(mask).map_err(cv_error)?;

        let mut result = Mat::default();
        photo::inpaint(&img, &mask_mat, &mut result, self.radius, self.method).map_err(cv_error)?;

        let bytes = result.data_bytes().map_err(cv_error)?;
        if bytes.len() != raster.len() {
            return Err(EngineError::operator(
                Step::WatermarkRemoval,
                format!("inpainted buffer has {} bytes, expected {}", bytes.len(), raster.len()),
            ));
        }
        raster.copy_from_slice(bytes);

        debug!(filled, radius = self.radius, "Inpainting finished");
        Ok(filled)
    }
}

/// Removes dark marks: gray <= 220, grown by 3x3, then Telea with radius 5.
pub fn remove_watermark(raster: &mut Raster) -> Result<u64, EngineError> {
    let marks = threshold_inv(&grayscale(raster), MARK_LEVEL);
    let mask = dilate(&marks, Norm::LInf, MARK_GROW);
    InpaintingEngine::new().inpaint(raster, &mask)
}

fn cv_error(err: cv::Error) -> EngineError {
    EngineError::operator(Step::WatermarkRemoval, err)
}

// Telea works per channel, so the RGB order is kept as is.
fn raster_to_mat(raster: &Raster) -> cv::Result<Mat> {
    let (width, height) = raster.dimensions();
    // SAFETY: the borrowed Mat only lives until `try_clone` copies it, and
    // `raster` outlives this function.
    let borrowed = unsafe {
        Mat::new_rows_cols_with_data(
            height as i32,
            width as i32,
            cv::core::CV_8UC3,
            raster.as_ptr() as *mut _,
            cv::core::Mat_AUTO_STEP,
        )?
    };
    borrowed.try_clone()
}

fn mask_to_mat(mask: &GrayImage) -> cv::Result<Mat> {
    let (width, height) = mask.dimensions();
    // SAFETY: same as `raster_to_mat`.
    let borrowed = unsafe {
        Mat::new_rows_cols_with_data(
            height as i32,
            width as i32,
            cv::core::CV_8UC1,
            mask.as_ptr() as *mut _,
            cv::core::Mat_AUTO_STEP,
        )?
    };
    borrowed.try_clone()
}
