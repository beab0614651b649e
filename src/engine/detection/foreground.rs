use image::GrayImage;
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use tracing::debug;

use super::channels::{grayscale, threshold};
use crate::types::Raster;

/// Sigma OpenCV derives for a 7x7 Gaussian kernel.
const BLUR_SIGMA: f32 = 1.4;
/// 9x9 square structuring element.
const CLOSE_RADIUS: u8 = 4;

/// Binary (0/255) subject/backdrop mask of the current raster.
///
/// Grayscale, 7x7 Gaussian blur, global Otsu threshold, then a 9x9
/// morphological close. The class that dominates the frame border is taken
/// as backdrop, so a dark product on a white sweep comes out as 255. A flat
/// frame is all foreground, except a flat black one, which is all backdrop.
pub fn foreground_mask(raster: &Raster) -> GrayImage {
    let gray = grayscale(raster);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    // A flat frame yields level 0: non-black frames threshold to all 255,
    // a black frame to all 0.
    let level = otsu_level(&blurred);
    let mut mask = threshold(&blurred, level);

    if border_is_foreground(&mask) {
        image::imageops::invert(&mut mask);
        debug!(level, "Inverted foreground mask, border was bright");
    }

    close(&mask, Norm::LInf, CLOSE_RADIUS)
}

/// Fraction of the frame labelled foreground.
pub fn foreground_ratio(mask: &GrayImage) -> f64 {
    let total = mask.width() as u64 * mask.height() as u64;
    if total == 0 {
        return 0.0;
    }
    super::channels::count_nonzero(mask) as f64 / total as f64
}

/// True when the mask has both classes and most border pixels are set.
fn border_is_foreground(mask: &GrayImage) -> bool {
    let (w, h) = mask.dimensions();
    let set = super::channels::count_nonzero(mask);
    if set == 0 || set == w as u64 * h as u64 {
        return false;
    }

    let mut border = 0u64;
    let mut border_set = 0u64;
    for (x, y, p) in mask.enumerate_pixels() {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            border += 1;
            if p[0] > 0 {
                border_set += 1;
            }
        }
    }
    border_set * 2 > border
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn test_flat_frame_is_all_foreground() {
        let raster = RgbImage::from_pixel(120, 90, Rgb([128, 128, 128]));
        let mask = foreground_mask(&raster);
        assert_eq!(mask.dimensions(), (120, 90));
        assert_eq!(foreground_ratio(&mask), 1.0);
    }

    #[test]
    fn test_flat_black_frame_is_all_backdrop() {
        let raster = RgbImage::new(80, 60);
        let mask = foreground_mask(&raster);
        assert_eq!(foreground_ratio(&mask), 0.0);
    }

    #[test]
    fn test_dark_object_on_white_is_foreground() {
        let mut raster = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut raster, Rect::at(70, 70).of_size(60, 60), Rgb([40, 40, 40]));

        let mask = foreground_mask(&raster);
        assert_eq!(mask.get_pixel(100, 100)[0], 255);
        assert_eq!(mask.get_pixel(5, 5)[0], 0);

        let ratio = foreground_ratio(&mask);
        assert!(ratio > 0.05 && ratio < 0.15, "ratio was {ratio}");
    }

    #[test]
    fn test_mask_is_binary_and_deterministic() {
        let raster = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]));
        let first = foreground_mask(&raster);
        let second = foreground_mask(&raster);
        assert_eq!(first, second);
        assert!(first.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }
}
