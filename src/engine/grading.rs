//! Pre-enhancement quality grading: a 0-100 score with issues, suggestions
//! and marketplace compliance, derived from the same confidence vector the
//! pipeline uses.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{info, instrument};

use crate::engine::codec;
use crate::engine::config::GradingConfig;
use crate::engine::detection::ConfidenceAnalyzer;
use crate::engine::error::EngineError;
use crate::types::{
    BackgroundAnalysis, BackgroundKind, Compliance, ComplianceCheck, ConfidenceVector, Issue,
    IssueCategory, QualityReport, Raster, Severity, Suggestions,
};

const PRODUCT_CATEGORY: &str = "Product";

pub struct QualityGrader {
    config: GradingConfig,
    analyzer: ConfidenceAnalyzer,
}

impl QualityGrader {
    pub fn new(config: GradingConfig) -> Self {
        Self {
            config,
            analyzer: ConfidenceAnalyzer::new(),
        }
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Grades encoded image bytes. `width`/`height` are the dimensions the
    /// caller declares for the original asset and drive the resolution rule.
    #[instrument(skip(self, image_bytes), fields(bytes = image_bytes.len()))]
    pub fn grade(
        &self,
        image_bytes: &[u8],
        width: i64,
        height: i64,
        file_size: u64,
    ) -> Result<QualityReport, EngineError> {
        declared_dimensions(width, height)?;
        let raster = codec::decode(image_bytes)?;
        self.grade_decoded(&raster, width, height, file_size)
    }

    /// Grades an already decoded raster against declared metadata.
    pub fn grade_decoded(
        &self,
        raster: &Raster,
        width: i64,
        height: i64,
        file_size: u64,
    ) -> Result<QualityReport, EngineError> {
        let (width, height) = declared_dimensions(width, height)?;
        let report = self.grade_raster(raster, width, height, file_size);

        info!(
            score = report.score,
            issues = report.issues.len(),
            amazon_compliant = report.compliance.amazon.is_compliant,
            "Image graded"
        );
        Ok(report)
    }

    /// Same as [`grade`](Self::grade) for a base64 payload. A data-URL
    /// prefix (`data:image/png;base64,`) is accepted and stripped.
    pub fn grade_base64(
        &self,
        payload: &str,
        width: i64,
        height: i64,
        file_size: u64,
    ) -> Result<QualityReport, EngineError> {
        let bytes = decode_base64(payload)?;
        self.grade(&bytes, width, height, file_size)
    }

    pub fn grade_raster(
        &self,
        raster: &Raster,
        width: u32,
        height: u32,
        file_size: u64,
    ) -> QualityReport {
        let confidence = self.analyzer.analyze(raster, None);
        self.report(&confidence, width, height, file_size)
    }

    /// Pure scoring from an already computed confidence vector.
    pub fn report(
        &self,
        confidence: &ConfidenceVector,
        width: u32,
        height: u32,
        file_size: u64,
    ) -> QualityReport {
        let cfg = &self.config;
        let cluttered = confidence.bg_clean > cfg.background_threshold;
        let shadowed = confidence.shadow > cfg.shadow_threshold;
        let low_resolution = width.min(height) < cfg.min_resolution;

        let mut score: i32 = 100;
        let mut issues = Vec::new();
        let mut amazon = Vec::new();

        if cluttered {
            score -= cfg.background_penalty as i32;
            issues.push(issue(
                IssueCategory::Background,
                Severity::Medium,
                "Cluttered background detected",
                "Remove Background",
            ));
            amazon.push("Background must be pure white".to_string());
        }
        if shadowed {
            score -= cfg.shadow_penalty as i32;
            issues.push(issue(
                IssueCategory::Lighting,
                Severity::Medium,
                "Harsh shadows detected",
                "Shadow Correction",
            ));
        }
        if low_resolution {
            score -= cfg.resolution_penalty as i32;
            issues.push(issue(
                IssueCategory::Resolution,
                Severity::High,
                "Image resolution is low",
                "Upscale",
            ));
            amazon.push(format!("{}px minimum required", cfg.min_resolution));
        }

        QualityReport {
            score: score.clamp(0, 100) as u8,
            product_category: PRODUCT_CATEGORY.to_string(),
            background_analysis: BackgroundAnalysis {
                kind: if cluttered {
                    BackgroundKind::Complex
                } else {
                    BackgroundKind::Clean
                },
            },
            suggestions: Suggestions {
                background_removal: cluttered,
                upscaling: low_resolution,
                cropping: confidence.crop > cfg.crop_threshold,
                enhancement: shadowed,
                compression: file_size > cfg.compression_bytes,
            },
            issues,
            compliance: Compliance {
                amazon: ComplianceCheck::from_violations(amazon),
                // TODO: Shopify rules (aspect ratio, 2048px recommendation) once the storefront requirements are confirmed
                shopify: ComplianceCheck::from_violations(Vec::new()),
            },
        }
    }
}

impl Default for QualityGrader {
    fn default() -> Self {
        Self::new(GradingConfig::default())
    }
}

fn issue(category: IssueCategory, severity: Severity, description: &str, action: &str) -> Issue {
    Issue {
        category,
        severity,
        description: description.to_string(),
        suggested_action: action.to_string(),
    }
}

fn declared_dimensions(width: i64, height: i64) -> Result<(u32, u32), EngineError> {
    let checked = |value: i64, name: &str| {
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| EngineError::invalid_input(format!("{name} must be positive, got {value}")))
    };
    Ok((checked(width, "width")?, checked(height, "height")?))
}

/// Decodes standard base64, ignoring anything up to the first comma.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, EngineError> {
    let data = payload
        .split_once(',')
        .map_or(payload, |(_, data)| data)
        .trim();
    if data.is_empty() {
        return Err(EngineError::invalid_input("empty base64 payload"));
    }
    STANDARD
        .decode(data)
        .map_err(|e| EngineError::invalid_input(format!("invalid base64 payload: {e}")))
}
