//! Error types shared by the trainer and the inference adapter

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Errors produced while training or serving the preprocessing pipeline
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// The training input location is missing, unreadable or empty.
    #[error(
        "{}.\nThis usually indicates that the channel ({channel}) was incorrectly specified,\n\
         the data location was incorrectly specified or the role specified does not have \
         permission to access the data",
        channel_summary(path, problem)
    )]
    Configuration {
        channel: String,
        path: PathBuf,
        problem: ChannelProblem,
    },

    /// A declared content type or accept type has no codec.
    #[error("{0} is not a supported media type")]
    UnsupportedMediaType(String),

    /// The persisted transform is absent, corrupt or does not match the schema.
    #[error("Failed to load artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    /// Input rows could not be decoded into a feature table.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The number of feature columns differs from what the transform was fitted on.
    #[error("Expected {expected} feature column(s), found {found}")]
    FeatureMismatch { expected: usize, found: usize },

    /// The transform could not be fitted.
    #[error("Cannot fit transform: {0}")]
    Fit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What is wrong with a training input location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelProblem {
    /// The directory holds no regular files
    Empty,
    /// The directory or one of its entries could not be listed
    Unreadable(String),
}

fn channel_summary(path: &Path, problem: &ChannelProblem) -> String {
    match problem {
        ChannelProblem::Empty => format!("There are no files in {}", path.display()),
        ChannelProblem::Unreadable(reason) => {
            format!("Cannot read {}: {}", path.display(), reason)
        }
    }
}

impl PreprocessError {
    /// Stable machine-readable code, used in error responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            PreprocessError::Configuration { .. } => "configuration_error",
            PreprocessError::UnsupportedMediaType(_) => "unsupported_media_type",
            PreprocessError::Artifact { .. } => "artifact_error",
            PreprocessError::MalformedInput(_) => "malformed_input",
            PreprocessError::FeatureMismatch { .. } => "feature_mismatch",
            PreprocessError::Fit(_) => "fit_error",
            PreprocessError::Io(_) => "io_error",
            PreprocessError::Csv(_) => "csv_error",
            PreprocessError::Json(_) => "json_error",
        }
    }

    /// Returns true when the caller's request, not the server, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PreprocessError::UnsupportedMediaType(_)
                | PreprocessError::MalformedInput(_)
                | PreprocessError::FeatureMismatch { .. }
        )
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PreprocessError::Artifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
