//! Core engine for product image enhancement.
//! Confidence analysis, the enhancement pipeline and quality grading share
//! one configuration and one set of pixel heuristics.

use std::sync::Arc;

pub mod codec;
pub mod config;
pub mod detection;
pub mod error;
pub mod grading;
pub mod pipeline;
pub mod reconstruction;

pub use config::{EngineConfig, GradingConfig, ProcessingConfig, SegmenterKind};
pub use detection::ConfidenceAnalyzer;
pub use error::EngineError;
pub use grading::QualityGrader;
pub use pipeline::ImageProcessor;
pub use reconstruction::Segmenter;

use crate::types::{ConfidenceVector, Dimensions, OperationRequest, ProcessOutput, QualityReport};

/// Main engine structure that coordinates analysis, enhancement and grading
pub struct EnhancementEngine {
    /// Enhancement pipeline, shared with blocking workers
    processor: Arc<ImageProcessor>,
    /// Quality grader
    grader: QualityGrader,
}

impl EnhancementEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            processor: Arc::new(ImageProcessor::from_config(config.processing)),
            grader: QualityGrader::new(config.grading),
        }
    }

    /// Replaces the configured segmenter, e.g. with a model-backed one.
    pub fn with_segmenter(config: EngineConfig, segmenter: Arc<dyn Segmenter>) -> Self {
        Self {
            processor: Arc::new(ImageProcessor::new(config.processing, segmenter)),
            grader: QualityGrader::new(config.grading),
        }
    }

    pub fn processor(&self) -> Arc<ImageProcessor> {
        Arc::clone(&self.processor)
    }

    pub fn grader(&self) -> &QualityGrader {
        &self.grader
    }

    /// Scores the five defects without touching the image.
    pub fn analyze(
        &self,
        image_bytes: &[u8],
        resize_dims: Option<Dimensions>,
    ) -> Result<ConfidenceVector, EngineError> {
        let raster = codec::decode(image_bytes)?;
        Ok(self.processor.analyzer().analyze(&raster, resize_dims))
    }

    pub fn process(
        &self,
        image_bytes: &[u8],
        request: &OperationRequest,
    ) -> Result<ProcessOutput, EngineError> {
        self.processor.process(image_bytes, request)
    }

    pub async fn process_async(
        &self,
        image_bytes: Vec<u8>,
        request: OperationRequest,
    ) -> Result<ProcessOutput, EngineError> {
        self.processor().process_async(image_bytes, request).await
    }

    pub fn grade(
        &self,
        image_bytes: &[u8],
        width: i64,
        height: i64,
        file_size: u64,
    ) -> Result<QualityReport, EngineError> {
        self.grader.grade(image_bytes, width, height, file_size)
    }
}

impl Default for EnhancementEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_creation() {
        let engine = EnhancementEngine::default();
        assert_eq!(engine.processor().config().confidence_threshold, 0.6);
        assert_eq!(engine.grader().config().min_resolution, 1000);
    }

    #[test]
    fn test_analyze_rejects_garbage() {
        let engine = EnhancementEngine::default();
        assert!(matches!(
            engine.analyze(&[0u8; 16], None),
            Err(EngineError::DecodeError(_))
        ));
    }
}
