use image::Rgb;
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::debug;

use crate::engine::detection::channels::{mean, threshold_inv, value_channel};
use crate::types::Raster;

/// Pixels darker than this fraction of the mean value get lifted.
const SHADOW_VALUE_FACTOR: f64 = 0.4;
/// 5x5 grow to reach the penumbra.
const PENUMBRA_RADIUS: u8 = 2;
const LIFT: u8 = 25;

/// Brightens dark regions by a flat +25 per channel (saturating).
/// Returns the number of pixels touched.
pub fn flatten_shadows(raster: &mut Raster) -> u64 {
    let value = value_channel(raster);
    let cutoff = SHADOW_VALUE_FACTOR * mean(&value);

    // `v < cutoff` on integers is `v <= ceil(cutoff) - 1`.
    let level = cutoff.ceil() - 1.0;
    if level < 0.0 {
        return 0;
    }
    let shadows = threshold_inv(&value, level.min(255.0) as u8);
    let shadows = dilate(&shadows, Norm::LInf, PENUMBRA_RADIUS);

    let mut lifted = 0u64;
    for (pixel, m) in raster.pixels_mut().zip(shadows.pixels()) {
        if m[0] > 0 {
            let [r, g, b] = pixel.0;
            *pixel = Rgb([r.saturating_add(LIFT), g.saturating_add(LIFT), b.saturating_add(LIFT)]);
            lifted += 1;
        }
    }

    debug!(lifted, cutoff, "Shadow flattening applied");
    lifted
}
