use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::debug;

use crate::engine::error::EngineError;
use crate::types::{Dimensions, Raster, Step};

const CANVAS: Rgb<u8> = Rgb([255, 255, 255]);

/// Aspect-preserving scale so the raster fits inside `target`.
pub fn fitted_size(current: Dimensions, target: Dimensions) -> Dimensions {
    let scale = f64::min(
        target.width as f64 / current.width as f64,
        target.height as f64 / current.height as f64,
    );
    Dimensions {
        width: ((current.width as f64 * scale) as u32).clamp(1, target.width),
        height: ((current.height as f64 * scale) as u32).clamp(1, target.height),
    }
}

/// Lanczos scale-to-fit, then centred on a white canvas of exactly `target`.
pub fn fit_to_canvas(raster: &mut Raster, target: Dimensions) -> Result<(), EngineError> {
    if target.is_empty() {
        return Err(EngineError::invalid_input(format!("resize target {target} is empty")));
    }
    let current = Dimensions::of(raster);
    if current.is_empty() {
        return Err(EngineError::operator(Step::Resize, "source image is empty"));
    }

    let fitted = fitted_size(current, target);
    let resized = imageops::resize(&*raster, fitted.width, fitted.height, FilterType::Lanczos3);

    let mut canvas = RgbImage::from_pixel(target.width, target.height, CANVAS);
    let x = (target.width - fitted.width) / 2;
    let y = (target.height - fitted.height) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);

    debug!(%current, %fitted, %target, "Canvas fit applied");
    *raster = canvas;
    Ok(())
}
