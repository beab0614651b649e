use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

/// Decoded 8-bit raster, RGB channel order. Owned by a single invocation.
pub type Raster = RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(raster: &Raster) -> Self {
        let (width, height) = raster.dimensions();
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = EngineError;

    /// Parses `WIDTHxHEIGHT`, e.g. `2000x2000`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(|| EngineError::invalid_input(format!("expected WxH, got '{s}'")))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| EngineError::invalid_input(format!("invalid width '{w}'")))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| EngineError::invalid_input(format!("invalid height '{h}'")))?;
        Ok(Self { width, height })
    }
}

/// Defects scored by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Defect {
    BgClean,
    Shadow,
    Crop,
    Watermark,
    Resize,
}

impl Defect {
    pub const ALL: [Defect; 5] = [
        Defect::BgClean,
        Defect::Shadow,
        Defect::Crop,
        Defect::Watermark,
        Defect::Resize,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Defect::BgClean => "bg_clean",
            Defect::Shadow => "shadow",
            Defect::Crop => "crop",
            Defect::Watermark => "watermark",
            Defect::Resize => "resize",
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-defect scores in [0, 1]. Higher always means "defect present".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceVector {
    pub bg_clean: f64,
    pub shadow: f64,
    pub crop: f64,
    pub watermark: f64,
    pub resize: f64,
}

impl ConfidenceVector {
    pub fn get(&self, defect: Defect) -> f64 {
        match defect {
            Defect::BgClean => self.bg_clean,
            Defect::Shadow => self.shadow,
            Defect::Crop => self.crop,
            Defect::Watermark => self.watermark,
            Defect::Resize => self.resize,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Defect, f64)> + '_ {
        Defect::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

/// Corrective transforms, in the only order they are ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Step {
    ShadowFix,
    WatermarkRemoval,
    SmartCrop,
    BgRemoval,
    Resize,
}

impl Step {
    /// Shadow and watermark before crop, crop before background, resize last.
    pub const PRIORITY: [Step; 5] = [
        Step::ShadowFix,
        Step::WatermarkRemoval,
        Step::SmartCrop,
        Step::BgRemoval,
        Step::Resize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::ShadowFix => "shadow_fix",
            Step::WatermarkRemoval => "watermark_removal",
            Step::SmartCrop => "smart_crop",
            Step::BgRemoval => "bg_removal",
            Step::Resize => "resize",
        }
    }

    /// The confidence key that triggers this step in automatic mode.
    pub fn defect(&self) -> Defect {
        match self {
            Step::ShadowFix => Defect::Shadow,
            Step::WatermarkRemoval => Defect::Watermark,
            Step::SmartCrop => Defect::Crop,
            Step::BgRemoval => Defect::BgClean,
            Step::Resize => Defect::Resize,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Step {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shadow_fix" | "shadow" => Ok(Step::ShadowFix),
            "watermark_removal" | "watermark" => Ok(Step::WatermarkRemoval),
            "smart_crop" | "crop" => Ok(Step::SmartCrop),
            "bg_removal" | "bg-remove" | "bg_remove" | "background" => Ok(Step::BgRemoval),
            "resize" => Ok(Step::Resize),
            other => Err(EngineError::invalid_input(format!("unknown operation '{other}'"))),
        }
    }
}

impl TryFrom<String> for Step {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        step.name().to_string()
    }
}

/// Trigger policy for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum OperationRequest {
    Auto {
        #[serde(default)]
        resize_dims: Option<Dimensions>,
    },
    Manual {
        operations: Vec<Step>,
        #[serde(default)]
        resize_dims: Option<Dimensions>,
    },
}

impl Default for OperationRequest {
    fn default() -> Self {
        OperationRequest::auto()
    }
}

impl OperationRequest {
    pub fn auto() -> Self {
        OperationRequest::Auto { resize_dims: None }
    }

    /// Builds a manual request from operation names (aliases accepted).
    /// Duplicates are dropped; the caller's order is irrelevant.
    pub fn manual<I, S>(operations: I, resize_dims: Option<Dimensions>) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut steps = Vec::new();
        for name in operations {
            let step: Step = name.as_ref().parse()?;
            if !steps.contains(&step) {
                steps.push(step);
            }
        }
        Ok(OperationRequest::Manual {
            operations: steps,
            resize_dims,
        })
    }

    pub fn with_resize(self, dims: Dimensions) -> Self {
        match self {
            OperationRequest::Auto { .. } => OperationRequest::Auto {
                resize_dims: Some(dims),
            },
            OperationRequest::Manual { operations, .. } => OperationRequest::Manual {
                operations,
                resize_dims: Some(dims),
            },
        }
    }

    pub fn resize_dims(&self) -> Option<Dimensions> {
        match self {
            OperationRequest::Auto { resize_dims } | OperationRequest::Manual { resize_dims, .. } => {
                *resize_dims
            }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            OperationRequest::Auto { .. } => "auto",
            OperationRequest::Manual { .. } => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub step: Step,
    pub reason: String,
}

/// Record of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub confidence: ConfidenceVector,
    pub steps: Vec<Step>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedStep>,
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub image: Vec<u8>,
    pub telemetry: Telemetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCategory {
    Background,
    Lighting,
    Resolution,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueCategory::Background => write!(f, "Background"),
            IssueCategory::Lighting => write!(f, "Lighting"),
            IssueCategory::Resolution => write!(f, "Resolution"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub category: IssueCategory,
    pub severity: Severity,
    pub description: String,
    pub suggested_action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub background_removal: bool,
    pub upscaling: bool,
    pub cropping: bool,
    pub enhancement: bool,
    pub compression: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub is_compliant: bool,
    pub violations: Vec<String>,
}

impl ComplianceCheck {
    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            is_compliant: violations.is_empty(),
            violations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    pub amazon: ComplianceCheck,
    pub shopify: ComplianceCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundKind {
    Clean,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundAnalysis {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    #[serde(rename = "qualityScore")]
    pub score: u8,
    pub product_category: String,
    pub background_analysis: BackgroundAnalysis,
    pub suggestions: Suggestions,
    pub issues: Vec<Issue>,
    pub compliance: Compliance,
}
