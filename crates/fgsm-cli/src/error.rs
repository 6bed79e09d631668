//! Error types for the fgsm CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use fgsm::FgsmError;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Expected a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory holds no PNG or JPEG files
    #[error("No images found in {0}")]
    NoImages(PathBuf),

    /// Library error
    #[error("{0}")]
    Fgsm(#[from] FgsmError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound(_) | Self::NotADirectory(_) | Self::NoImages(_) => ExitCode::from(3),
            Self::Fgsm(e) => match e {
                FgsmError::UnsupportedMediaType(_) | FgsmError::Decode(_) => ExitCode::from(4),
                FgsmError::InvalidShape { .. }
                | FgsmError::DeviceMismatch { .. }
                | FgsmError::InvalidHyperparameter { .. }
                | FgsmError::LabelOutOfRange { .. }
                | FgsmError::ClassifierInTrainingMode => ExitCode::from(5),
                FgsmError::Weights(_) | FgsmError::Config { .. } => ExitCode::from(6),
                FgsmError::Io(_) => ExitCode::from(7),
                FgsmError::Csv(_) | FgsmError::Json(_) => ExitCode::from(1),
            },
            Self::Io(_) => ExitCode::from(7),
            Self::Json(_) => ExitCode::from(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::FileNotFound(PathBuf::from("x")).exit_code(),
            ExitCode::from(3)
        );
        assert_eq!(
            CliError::from(FgsmError::UnsupportedMediaType("image/gif".into())).exit_code(),
            ExitCode::from(4)
        );
        assert_eq!(
            CliError::from(FgsmError::LabelOutOfRange {
                label: 9,
                num_classes: 3
            })
            .exit_code(),
            ExitCode::from(5)
        );
        assert_eq!(
            CliError::from(FgsmError::Weights("bad".into())).exit_code(),
            ExitCode::from(6)
        );
    }

    #[test]
    fn test_library_message_passes_through() {
        let err = CliError::from(FgsmError::ClassifierInTrainingMode);
        assert_eq!(
            err.to_string(),
            "classifier must be in evaluation mode for an attack"
        );
    }
}
