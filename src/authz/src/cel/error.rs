//! Error types for CEL operations

use thiserror::Error;

/// CEL operation errors
#[derive(Error, Debug)]
pub enum CelError {
    #[error("CEL compilation of `{source_text}` failed: {message}")]
    CompilationError { source_text: String, message: String },

    #[error("CEL evaluation failed: {0}")]
    EvaluationError(String),

    #[error("Request payload could not be converted: {0}")]
    TypeConversionError(String),

    #[error("Expression did not return boolean result")]
    NonBooleanResult,
}

/// Result type for CEL operations
pub type Result<T> = std::result::Result<T, CelError>;
