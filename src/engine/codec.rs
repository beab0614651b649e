use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use crate::engine::error::EngineError;
use crate::types::Raster;

/// Decodes compressed bytes into an RGB raster. Alpha, if any, is dropped.
pub fn decode(bytes: &[u8]) -> Result<Raster, EngineError> {
    if bytes.is_empty() {
        return Err(EngineError::DecodeError("empty input".to_string()));
    }
    let image = image::load_from_memory(bytes)?;
    let raster = image.to_rgb8();
    if raster.width() == 0 || raster.height() == 0 {
        return Err(EngineError::DecodeError("image has no pixels".to_string()));
    }
    Ok(raster)
}

/// Encodes the raster as JPEG at the given quality.
pub fn encode_jpeg(raster: &Raster, quality: u8) -> Result<Vec<u8>, EngineError> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(raster.as_raw(), raster.width(), raster.height(), ColorType::Rgb8)
        .map_err(|e| EngineError::EncodeError(e.to_string()))?;
    Ok(buffer)
}
