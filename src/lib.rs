//! Product image quality analysis and conditional enhancement.

pub mod engine;
pub mod types;

pub use engine::{
    ConfidenceAnalyzer, EngineConfig, EngineError, EnhancementEngine, ImageProcessor,
    QualityGrader,
};
pub use types::{
    ConfidenceVector, Dimensions, OperationRequest, ProcessOutput, QualityReport, Step, Telemetry,
};
