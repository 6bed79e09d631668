//! Error types for FGSM operations.
//!
//! Every validation failure aborts the whole call before anything is
//! mutated or returned; there is no partial recovery and nothing to retry.

use std::path::PathBuf;
use thiserror::Error;

use crate::device::Device;

/// Main error type for the crate.
///
/// # Examples
///
/// ```
/// use fgsm::error::FgsmError;
///
/// let err = FgsmError::InvalidShape {
///     expected: "(1, C, H, W)".to_string(),
///     actual: "[2, 3, 8, 8]".to_string(),
/// };
/// assert!(err.to_string().contains("invalid shape"));
/// ```
#[derive(Error, Debug)]
pub enum FgsmError {
    /// Tensor rank, batch size or channel count is not what the operation needs.
    #[error("invalid shape: expected {expected}, got {actual}")]
    InvalidShape {
        /// Expected shape description
        expected: String,
        /// Actual shape found
        actual: String,
    },

    /// Operands live on different compute devices.
    #[error("device mismatch in {context}: expected {expected}, found {found}")]
    DeviceMismatch {
        /// What was being checked (e.g. "image vs classifier")
        context: String,
        /// Device of the reference operand
        expected: Device,
        /// Device of the offending operand
        found: Device,
    },

    /// Invalid hyperparameter value provided.
    #[error("invalid hyperparameter: {param} = {value}, expected {constraint}")]
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Ground-truth label outside the classifier's output range.
    #[error("label {label} out of range for {num_classes} classes")]
    LabelOutOfRange {
        /// Supplied label
        label: usize,
        /// Number of classifier outputs
        num_classes: usize,
    },

    /// Classifier still has stochastic layers active.
    #[error("classifier must be in evaluation mode for an attack")]
    ClassifierInTrainingMode,

    /// Image bytes are not PNG or JPEG.
    #[error("unsupported media type: {0} (expected PNG or JPEG)")]
    UnsupportedMediaType(String),

    /// Image bytes could not be decoded.
    #[error("invalid image: {0}")]
    Decode(#[from] image::ImageError),

    /// Model weights file does not match the architecture.
    #[error("invalid weights: {0}")]
    Weights(String),

    /// Configuration file could not be parsed.
    #[error("invalid config {path}: {source}")]
    Config {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV sink error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FgsmError {
    /// Create an invalid shape error from an expected description and the actual shape.
    #[must_use]
    pub fn invalid_shape(expected: &str, actual: &[usize]) -> Self {
        Self::InvalidShape {
            expected: expected.to_string(),
            actual: format!("{actual:?}"),
        }
    }

    /// Create an invalid hyperparameter error.
    #[must_use]
    pub fn invalid_hyperparameter(param: &str, value: impl ToString, constraint: &str) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, FgsmError>;
