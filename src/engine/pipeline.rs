//! Pipeline controller: decode once, score once, then run the enhancement
//! operators in their fixed priority order on a single working raster.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::engine::codec;
use crate::engine::config::{ProcessingConfig, SegmenterKind};
use crate::engine::detection::ConfidenceAnalyzer;
use crate::engine::error::EngineError;
use crate::engine::reconstruction::{
    fit_to_canvas, flatten_shadows, remove_watermark, replace_background, smart_crop,
    MaskSegmenter, Segmenter, UnavailableSegmenter,
};
use crate::types::{
    ConfidenceVector, Dimensions, OperationRequest, ProcessOutput, Raster, SkippedStep, Step,
    Telemetry,
};

pub struct ImageProcessor {
    config: ProcessingConfig,
    analyzer: ConfidenceAnalyzer,
    segmenter: Arc<dyn Segmenter>,
}

impl ImageProcessor {
    pub fn new(config: ProcessingConfig, segmenter: Arc<dyn Segmenter>) -> Self {
        Self {
            config,
            analyzer: ConfidenceAnalyzer::new(),
            segmenter,
        }
    }

    /// Wires the segmenter named by `config.segmenter`.
    pub fn from_config(config: ProcessingConfig) -> Self {
        let segmenter: Arc<dyn Segmenter> = match config.segmenter {
            SegmenterKind::Mask => Arc::new(MaskSegmenter),
            SegmenterKind::None => Arc::new(UnavailableSegmenter),
        };
        Self::new(config, segmenter)
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &ConfidenceAnalyzer {
        &self.analyzer
    }

    /// Full invocation: encoded bytes in, JPEG bytes and telemetry out.
    #[instrument(skip_all, fields(mode = request.mode(), bytes = image_bytes.len()))]
    pub fn process(
        &self,
        image_bytes: &[u8],
        request: &OperationRequest,
    ) -> Result<ProcessOutput, EngineError> {
        let mut raster = codec::decode(image_bytes)?;
        let telemetry = self.enhance(&mut raster, request)?;
        let image = codec::encode_jpeg(&raster, self.config.output_quality)?;

        info!(
            steps = ?telemetry.steps,
            skipped = telemetry.skipped.len(),
            duration_ms = telemetry.duration_ms,
            output_bytes = image.len(),
            "Image processed"
        );
        Ok(ProcessOutput { image, telemetry })
    }

    /// Runs `process` on the blocking pool so async callers never stall
    /// their executor on pixel work.
    pub async fn process_async(
        self: Arc<Self>,
        image_bytes: Vec<u8>,
        request: OperationRequest,
    ) -> Result<ProcessOutput, EngineError> {
        tokio::task::spawn_blocking(move || self.process(&image_bytes, &request))
            .await
            .map_err(|e| EngineError::internal(format!("processing task failed: {e}")))?
    }

    /// Analyses then enhances `raster` in place. The confidence vector is
    /// computed once, before any operator runs.
    pub fn enhance(
        &self,
        raster: &mut Raster,
        request: &OperationRequest,
    ) -> Result<Telemetry, EngineError> {
        let start = Instant::now();
        let target = self.resize_target(request);
        let confidence = self.analyzer.analyze(raster, target);

        let mut steps = Vec::new();
        let mut skipped = Vec::new();

        for step in Step::PRIORITY {
            if !self.is_triggered(step, request, &confidence) {
                continue;
            }

            match self.apply(step, raster, target) {
                Ok(()) => {
                    debug!(%step, "Step applied");
                    steps.push(step);
                }
                Err(err) if err.is_recoverable() => {
                    warn!(%step, error = %err, "Step degraded, continuing");
                    skipped.push(SkippedStep { step, reason: err.to_string() });
                }
                Err(err @ EngineError::OperatorError { .. }) => return Err(err),
                Err(err) => return Err(EngineError::operator(step, err)),
            }
        }

        Ok(Telemetry {
            confidence,
            steps,
            duration_ms: start.elapsed().as_millis() as u64,
            skipped,
        })
    }

    fn resize_target(&self, request: &OperationRequest) -> Option<Dimensions> {
        let requested = request.resize_dims();
        if let Some(dims) = requested.filter(|d| d.is_empty()) {
            warn!(%dims, "Ignoring empty resize target");
        }
        requested
            .filter(|d| !d.is_empty())
            .or(self.config.default_canvas)
    }

    fn is_triggered(
        &self,
        step: Step,
        request: &OperationRequest,
        confidence: &ConfidenceVector,
    ) -> bool {
        match request {
            OperationRequest::Auto { .. } => {
                confidence.get(step.defect()) >= self.config.confidence_threshold
            }
            OperationRequest::Manual { operations, .. } => operations.contains(&step),
        }
    }

    fn apply(
        &self,
        step: Step,
        raster: &mut Raster,
        target: Option<Dimensions>,
    ) -> Result<(), EngineError> {
        match step {
            Step::ShadowFix => {
                flatten_shadows(raster);
                Ok(())
            }
            Step::WatermarkRemoval => remove_watermark(raster).map(|_| ()),
            Step::SmartCrop => smart_crop(raster).map(|_| ()),
            Step::BgRemoval => replace_background(raster, self.segmenter.as_ref()),
            Step::Resize => match target {
                Some(dims) => fit_to_canvas(raster, dims),
                None => Err(EngineError::invalid_input(
                    "resize requested without target dimensions",
                )),
            },
        }
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::from_config(ProcessingConfig::default())
    }
}
