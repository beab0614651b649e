use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use pretty_assertions::assert_eq;

use asset_enhancer::engine::config::SegmenterKind;
use asset_enhancer::types::{Dimensions, OperationRequest, Step};
use asset_enhancer::{EngineConfig, EngineError, EnhancementEngine, ImageProcessor};

fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn decoded_size(jpeg: &[u8]) -> (u32, u32) {
    image::load_from_memory(jpeg).unwrap().to_rgb8().dimensions()
}

// Two distant gray squares on white
fn spread_product() -> RgbImage {
    let mut image = RgbImage::from_pixel(500, 500, Rgb([255, 255, 255]));
    draw_filled_rect_mut(&mut image, Rect::at(85, 85).of_size(110, 110), Rgb([120, 120, 120]));
    draw_filled_rect_mut(&mut image, Rect::at(305, 305).of_size(110, 110), Rgb([120, 120, 120]));
    image
}

#[test]
fn test_manual_resize_to_canvas() -> Result<()> {
    let engine = EnhancementEngine::default();
    let input = encode_png(&RgbImage::from_pixel(500, 500, Rgb([40, 90, 160])));
    let request = OperationRequest::manual(["resize"], Some(Dimensions::new(1000, 1000)))?;

    let output = engine.process(&input, &request)?;
    assert_eq!(output.telemetry.steps, vec![Step::Resize]);
    assert_eq!(decoded_size(&output.image), (1000, 1000));
    Ok(())
}

fn near(pixel: &Rgb<u8>, expected: [u8; 3], tolerance: i16) -> bool {
    pixel
        .0
        .iter()
        .zip(expected)
        .all(|(a, b)| (*a as i16 - b as i16).abs() <= tolerance)
}

#[test]
fn test_letterbox_pads_with_white() -> Result<()> {
    let engine = EnhancementEngine::default();
    let input = encode_png(&RgbImage::from_pixel(500, 250, Rgb([200, 30, 30])));
    let request = OperationRequest::manual(["resize"], Some(Dimensions::new(1000, 1000)))?;

    let output = engine.process(&input, &request)?;
    assert_eq!(output.telemetry.steps, vec![Step::Resize]);

    let decoded = image::load_from_memory(&output.image)?.to_rgb8();
    assert_eq!(decoded.dimensions(), (1000, 1000));
    // Content fills rows 250..750.
    assert!(near(decoded.get_pixel(500, 100), [255, 255, 255], 8));
    assert!(near(decoded.get_pixel(500, 900), [255, 255, 255], 8));
    let centre = decoded.get_pixel(500, 500);
    assert!(near(centre, [200, 30, 30], 10), "centre is {centre:?}");
    Ok(())
}

#[test]
fn test_auto_small_dark_subject() -> Result<()> {
    let engine = EnhancementEngine::default();
    let mut image = RgbImage::from_pixel(400, 400, Rgb([255, 255, 255]));
    draw_filled_rect_mut(&mut image, Rect::at(150, 150).of_size(100, 100), Rgb([0, 0, 0]));

    let output = engine.process(&encode_png(&image), &OperationRequest::auto())?;
    let telemetry = &output.telemetry;
    assert_eq!(telemetry.confidence.shadow, 1.0);
    assert!(telemetry.confidence.crop >= 0.6);
    assert_eq!(telemetry.confidence.watermark, 0.0);
    assert_eq!(telemetry.steps, vec![Step::ShadowFix, Step::SmartCrop]);
    // Subject box is under 40% of the frame, so the crop leaves it alone.
    assert_eq!(decoded_size(&output.image), (400, 400));
    Ok(())
}

#[test]
fn test_auto_clean_image_at_target_size_is_untouched() -> Result<()> {
    let engine = EnhancementEngine::default();
    let mut image = RgbImage::from_pixel(400, 400, Rgb([255, 255, 255]));
    draw_filled_rect_mut(&mut image, Rect::at(80, 40).of_size(240, 320), Rgb([150, 150, 150]));
    let request = OperationRequest::auto().with_resize(Dimensions::new(400, 400));

    let output = engine.process(&encode_png(&image), &request)?;
    assert_eq!(output.telemetry.confidence.resize, 0.0);
    assert!(output.telemetry.steps.is_empty());
    assert!(output.telemetry.skipped.is_empty());
    assert_eq!(decoded_size(&output.image), (400, 400));
    Ok(())
}

#[test]
fn test_manual_resize_without_dims_is_skipped() -> Result<()> {
    let engine = EnhancementEngine::default();
    let input = encode_png(&RgbImage::from_pixel(300, 200, Rgb([40, 90, 160])));
    let request = OperationRequest::manual(["resize"], None)?;

    let output = engine.process(&input, &request)?;
    assert!(!output.telemetry.steps.contains(&Step::Resize));
    assert_eq!(decoded_size(&output.image), (300, 200));
    Ok(())
}

#[test]
fn test_auto_flat_image_untouched() -> Result<()> {
    let engine = EnhancementEngine::default();
    let input = encode_png(&RgbImage::from_pixel(400, 400, Rgb([128, 128, 128])));

    let output = engine.process(&input, &OperationRequest::auto())?;
    assert!(output.telemetry.steps.is_empty());
    assert_eq!(decoded_size(&output.image), (400, 400));
    Ok(())
}

#[test]
fn test_auto_crops_small_subject() -> Result<()> {
    let engine = EnhancementEngine::default();
    let output = engine.process(&encode_png(&spread_product()), &OperationRequest::auto())?;

    let telemetry = &output.telemetry;
    assert!(telemetry.confidence.crop >= 0.6);
    assert_eq!(telemetry.confidence.bg_clean, 0.0);
    assert_eq!(telemetry.confidence.watermark, 0.0);
    assert_eq!(telemetry.steps, vec![Step::SmartCrop]);

    let (w, h) = decoded_size(&output.image);
    assert!(w < 500 && h < 500, "expected a crop, got {w}x{h}");
    Ok(())
}

#[test]
fn test_crop_runs_before_background() -> Result<()> {
    let engine = EnhancementEngine::default();
    let request = OperationRequest::manual(["bg-remove", "crop"], None)?;

    let output = engine.process(&encode_png(&spread_product()), &request)?;
    assert_eq!(output.telemetry.steps, vec![Step::SmartCrop, Step::BgRemoval]);
    Ok(())
}

#[test]
fn test_missing_segmenter_degrades() -> Result<()> {
    let mut config = EngineConfig::default();
    config.processing.segmenter = SegmenterKind::None;
    let engine = EnhancementEngine::new(config);
    let request = OperationRequest::manual(["bg_removal", "resize"], Some(Dimensions::new(64, 64)))?;

    let output = engine.process(&encode_png(&spread_product()), &request)?;
    assert_eq!(output.telemetry.steps, vec![Step::Resize]);
    assert_eq!(output.telemetry.skipped.len(), 1);
    assert_eq!(output.telemetry.skipped[0].step, Step::BgRemoval);
    assert_eq!(decoded_size(&output.image), (64, 64));
    Ok(())
}

#[test]
fn test_unknown_operation_rejected() {
    let result = OperationRequest::manual(["sharpen"], None);
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
}

#[test]
fn test_garbage_input_is_decode_error() {
    let engine = EnhancementEngine::default();
    let result = engine.process(b"\x00\x01garbage", &OperationRequest::auto());
    assert!(matches!(result, Err(EngineError::DecodeError(_))));
}

#[test]
fn test_process_async() {
    let processor = Arc::new(ImageProcessor::default());
    let input = encode_png(&RgbImage::from_pixel(120, 80, Rgb([200, 30, 30])));
    let request = OperationRequest::auto().with_resize(Dimensions::new(60, 60));

    let output = tokio_test::block_on(processor.process_async(input, request)).unwrap();
    assert_eq!(output.telemetry.steps, vec![Step::Resize]);
    assert_eq!(decoded_size(&output.image), (60, 60));
}

#[test]
fn test_telemetry_json_uses_step_names() -> Result<()> {
    let engine = EnhancementEngine::default();
    let output = engine.process(&encode_png(&spread_product()), &OperationRequest::auto())?;

    let json = serde_json::to_value(&output.telemetry)?;
    assert_eq!(json["steps"], serde_json::json!(["smart_crop"]));
    assert!(json["confidence"]["crop"].as_f64().unwrap() >= 0.6);
    assert!(json.get("skipped").is_none());
    Ok(())
}

#[test]
fn test_request_from_json() -> Result<()> {
    let request: OperationRequest = serde_json::from_str(
        r#"{"mode":"manual","operations":["watermark","resize"],"resize_dims":{"width":800,"height":600}}"#,
    )?;
    assert_eq!(
        request,
        OperationRequest::Manual {
            operations: vec![Step::WatermarkRemoval, Step::Resize],
            resize_dims: Some(Dimensions::new(800, 600)),
        }
    );
    Ok(())
}
