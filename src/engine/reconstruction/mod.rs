//! Enhancement operators. Each one mutates the raster in place and knows
//! nothing about confidence; the pipeline decides when they run.

pub mod background;
pub mod crop;
pub mod inpainting;
pub mod resize;
pub mod shadow;

pub use background::{replace_background, MaskSegmenter, Segmenter, UnavailableSegmenter};
pub use crop::{smart_crop, CropWindow};
pub use inpainting::{remove_watermark, InpaintingEngine};
pub use resize::fit_to_canvas;
pub use shadow::flatten_shadows;
