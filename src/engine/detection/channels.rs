//! Single-channel views of a raster and the pixel statistics built on them.

use image::{GenericImageView, GrayImage, Luma};
use imageproc::map::map_colors;

use crate::types::Raster;

/// BT.601 luma (`0.299 R + 0.587 G + 0.114 B`), the weighting the gray
/// thresholds are tuned against.
pub fn grayscale(raster: &Raster) -> GrayImage {
    map_colors(raster, |p| {
        let [r, g, b] = p.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// HSV value channel: `max(r, g, b)` per pixel.
pub fn value_channel(raster: &Raster) -> GrayImage {
    map_colors(raster, |p| {
        let [r, g, b] = p.0;
        Luma([r.max(g).max(b)])
    })
}

/// Pixels strictly above `level` become 255, the rest 0.
pub fn threshold(gray: &GrayImage, level: u8) -> GrayImage {
    map_colors(gray, |p| Luma([if p[0] > level { 255 } else { 0 }]))
}

/// Pixels at or below `level` become 255, the rest 0.
pub fn threshold_inv(gray: &GrayImage, level: u8) -> GrayImage {
    map_colors(gray, |p| Luma([if p[0] > level { 0 } else { 255 }]))
}

pub fn mean<I>(view: &I) -> f64
where
    I: GenericImageView<Pixel = Luma<u8>>,
{
    let (w, h) = view.dimensions();
    let count = w as u64 * h as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = view.pixels().map(|(_, _, p)| p[0] as u64).sum();
    sum as f64 / count as f64
}

/// Population standard deviation of the view's intensities.
pub fn std_dev<I>(view: &I) -> f64
where
    I: GenericImageView<Pixel = Luma<u8>>,
{
    let (w, h) = view.dimensions();
    let count = w as u64 * h as u64;
    if count == 0 {
        return 0.0;
    }
    let mu = mean(view);
    let sq: f64 = view
        .pixels()
        .map(|(_, _, p)| {
            let d = p[0] as f64 - mu;
            d * d
        })
        .sum();
    (sq / count as f64).sqrt()
}

pub fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p[0] > 0).count() as u64
}
