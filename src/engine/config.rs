use std::fmt;
use std::path::Path;
use std::str::FromStr;

use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::error::EngineError;
use crate::types::Dimensions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub grading: GradingConfig,
}

/// Which foreground extractor backs the background replacement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterKind {
    /// Heuristic cutout built from the foreground mask.
    #[default]
    Mask,
    /// No capability wired; background replacement always degrades.
    None,
}

impl fmt::Display for SegmenterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmenterKind::Mask => write!(f, "mask"),
            SegmenterKind::None => write!(f, "none"),
        }
    }
}

impl FromStr for SegmenterKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mask" => Ok(SegmenterKind::Mask),
            "none" | "off" => Ok(SegmenterKind::None),
            other => Err(EngineError::config(format!("unknown segmenter '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Single global trigger for automatic mode.
    pub confidence_threshold: f64,
    /// JPEG quality of the re-encoded output.
    pub output_quality: u8,
    /// Resize target used when a request carries no `resize_dims`.
    pub default_canvas: Option<Dimensions>,
    pub segmenter: SegmenterKind,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            output_quality: 95,
            default_canvas: None,
            segmenter: SegmenterKind::Mask,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub background_threshold: f64,
    pub shadow_threshold: f64,
    pub crop_threshold: f64,
    pub min_resolution: u32,
    pub compression_bytes: u64,
    pub background_penalty: u8,
    pub shadow_penalty: u8,
    pub resolution_penalty: u8,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            background_threshold: 0.6,
            shadow_threshold: 0.5,
            crop_threshold: 0.5,
            min_resolution: 1000,
            compression_bytes: 2 * 1024 * 1024,
            background_penalty: 20,
            shadow_penalty: 15,
            resolution_penalty: 15,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `ENHANCE_*` variables (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, EngineError> {
        dotenv().ok();

        let mut config = Self::default();
        let processing = &mut config.processing;
        processing.confidence_threshold =
            env_or("ENHANCE_CONFIDENCE_THRESHOLD", processing.confidence_threshold);
        processing.output_quality = env_or("ENHANCE_OUTPUT_QUALITY", processing.output_quality);
        processing.segmenter = env_or("ENHANCE_SEGMENTER", processing.segmenter);

        if let Ok(value) = std::env::var("ENHANCE_DEFAULT_CANVAS") {
            processing.default_canvas = match value.trim() {
                "" | "none" => None,
                dims => Some(dims.parse().map_err(|e| {
                    EngineError::config(format!("ENHANCE_DEFAULT_CANVAS: {e}"))
                })?),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file; missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("{}: {e}", path.display())))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| EngineError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let p = &self.processing;
        if !(0.0..=1.0).contains(&p.confidence_threshold) {
            return Err(EngineError::config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                p.confidence_threshold
            )));
        }
        if !(1..=100).contains(&p.output_quality) {
            return Err(EngineError::config(format!(
                "output_quality must be within 1..=100, got {}",
                p.output_quality
            )));
        }
        if let Some(canvas) = p.default_canvas {
            if canvas.is_empty() {
                return Err(EngineError::config(format!(
                    "default_canvas must be non-zero, got {canvas}"
                )));
            }
        }

        let g = &self.grading;
        for (name, value) in [
            ("background_threshold", g.background_threshold),
            ("shadow_threshold", g.shadow_threshold),
            ("crop_threshold", g.crop_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
