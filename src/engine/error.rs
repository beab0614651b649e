use thiserror::Error;

use crate::types::Step;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Operator {step} failed: {reason}")]
    OperatorError { step: Step, reason: String },

    #[error("Segmentation capability error: {0}")]
    CapabilityError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::DecodeError(err.to_string())
    }
}

// Helper functions for error creation
impl EngineError {
    pub fn invalid_input<T: std::fmt::Display>(msg: T) -> Self {
        EngineError::InvalidInput(msg.to_string())
    }

    pub fn operator<T: std::fmt::Display>(step: Step, msg: T) -> Self {
        EngineError::OperatorError {
            step,
            reason: msg.to_string(),
        }
    }

    pub fn capability<T: std::fmt::Display>(msg: T) -> Self {
        EngineError::CapabilityError(msg.to_string())
    }

    pub fn config<T: std::fmt::Display>(msg: T) -> Self {
        EngineError::ConfigError(msg.to_string())
    }

    pub fn internal<T: std::fmt::Display>(msg: T) -> Self {
        EngineError::Internal(msg.to_string())
    }

    /// Degraded errors never fail an invocation; the rest abort it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::CapabilityError(_) | EngineError::InvalidInput(_)
        )
    }
}
