use std::io::Cursor;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use pretty_assertions::assert_eq;

use asset_enhancer::types::BackgroundKind;
use asset_enhancer::{EngineError, QualityGrader};

const MIB: u64 = 1024 * 1024;

fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn checkerboard(size: u32, cell: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

#[test]
fn test_busy_small_heavy_image() -> Result<()> {
    let grader = QualityGrader::default();
    let report = grader.grade(&encode_png(&checkerboard(600, 20)), 600, 600, 3 * MIB)?;

    assert!(report.score <= 65, "score {}", report.score);
    assert_eq!(report.background_analysis.kind, BackgroundKind::Complex);
    assert_eq!(report.compliance.amazon.violations.len(), 2);
    assert!(!report.compliance.amazon.is_compliant);
    assert!(report.compliance.shopify.is_compliant);
    assert!(report.suggestions.background_removal);
    assert!(report.suggestions.upscaling);
    assert!(report.suggestions.compression);
    Ok(())
}

#[test]
fn test_clean_image_is_compliant() -> Result<()> {
    let grader = QualityGrader::default();
    let image = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
    let report = grader.grade(&encode_png(&image), 2000, 1500, MIB)?;

    assert_eq!(report.score, 100);
    assert!(report.issues.is_empty());
    assert!(report.compliance.amazon.is_compliant);
    Ok(())
}

#[test]
fn test_report_json_shape() -> Result<()> {
    let grader = QualityGrader::default();
    let report = grader.grade(&encode_png(&checkerboard(300, 15)), 300, 300, 10)?;
    let json = serde_json::to_value(&report)?;

    assert!(json["qualityScore"].is_u64());
    assert_eq!(json["productCategory"], "Product");
    assert_eq!(json["backgroundAnalysis"]["type"], "Complex");
    assert_eq!(json["issues"][0]["type"], "Background");
    assert_eq!(json["issues"][0]["suggestedAction"], "Remove Background");
    assert_eq!(json["compliance"]["shopify"]["isCompliant"], true);
    assert!(json["suggestions"]["backgroundRemoval"].as_bool().unwrap());
    Ok(())
}

#[test]
fn test_grade_base64_data_url() -> Result<()> {
    let grader = QualityGrader::default();
    let png = encode_png(&RgbImage::from_pixel(50, 50, Rgb([255, 255, 255])));
    let payload = format!("data:image/png;base64,{}", STANDARD.encode(&png));

    let report = grader.grade_base64(&payload, 1200, 1200, png.len() as u64)?;
    assert_eq!(report.score, 100);
    Ok(())
}

#[test]
fn test_invalid_inputs() {
    let grader = QualityGrader::default();
    assert!(matches!(
        grader.grade(b"garbage", 100, 100, 7),
        Err(EngineError::DecodeError(_))
    ));
    assert!(matches!(
        grader.grade_base64("not base64 at all!", 100, 100, 7),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        grader.grade(b"garbage", 0, 100, 7),
        Err(EngineError::InvalidInput(_))
    ));
}
