use thiserror::Error;

/// Failures that stop a pipeline run before a report can be produced.
///
/// Per-line parse failures are not errors at this level; they are collected
/// into the report's `errors` list.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },
    #[error("Custom format requires both customPattern and fields")]
    MissingCustomPattern,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Input too large: {size} bytes exceeds the {limit} byte limit")]
    InputTooLarge { size: usize, limit: usize },
    #[error("Processing error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
