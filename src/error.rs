//! Error types for fgsm-rs

use thiserror::Error;

/// All possible errors in fgsm-rs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FgsmError {
    /// The image batch has no examples
    #[error("Empty batch provided")]
    EmptyBatch,

    /// Images, labels, epsilon or model output have incompatible shapes
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The model output cannot be differentiated with respect to its input
    #[error("Model is not differentiable with respect to its input: {0}")]
    NonDifferentiableModel(String),

    /// Input pixel values fall outside the configured range
    #[error("Input values span [{min}, {max}], outside the valid range [{lower}, {upper}]")]
    InvalidRange {
        /// Smallest value found in the input
        min: f32,
        /// Largest value found in the input
        max: f32,
        /// Lower bound of the valid range
        lower: f32,
        /// Upper bound of the valid range
        upper: f32,
    },

    /// Epsilon is negative or not finite
    #[error("Invalid epsilon: {0} (must be finite and >= 0.0)")]
    InvalidEpsilon(f32),

    /// Clip bounds are not finite or are inverted
    #[error("Invalid clip range: [{lower}, {upper}]")]
    InvalidClipRange {
        /// Requested lower bound
        lower: f32,
        /// Requested upper bound
        upper: f32,
    },

    /// A post-hoc check on an adversarial batch failed
    #[error("Verification failed: {0}")]
    VerificationError(String),

    /// Array shape error raised by ndarray
    #[error("Array shape error: {0}")]
    ShapeError(String),

    /// Model or configuration (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<ndarray::ShapeError> for FgsmError {
    fn from(e: ndarray::ShapeError) -> Self {
        FgsmError::ShapeError(e.to_string())
    }
}

impl From<serde_json::Error> for FgsmError {
    fn from(e: serde_json::Error) -> Self {
        FgsmError::Serialization(e.to_string())
    }
}
