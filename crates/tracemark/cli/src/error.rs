//! CLI error types

use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cookie jar could not be read back
    #[error("Cookie jar error: {0}")]
    Jar(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pipeline run failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] tracemark_core::PipelineError),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
