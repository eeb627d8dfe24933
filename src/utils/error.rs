//! Error Handling Module
//!
//! Defines the error taxonomy of the classification pipeline.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Main error type for steel defect classification
#[derive(Error, Debug)]
pub enum DefectError {
    /// The weight artifact is missing, corrupt or shaped for another label set.
    /// Fatal at startup.
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// The uploaded bytes are not a decodable image
    #[error("Decode error: {0}")]
    Decode(String),

    /// A forward pass produced unusable output (non-finite values, wrong width)
    #[error("Inference error: {0}")]
    Inference(String),

    /// A caller-supplied argument is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The inference workers are gone
    #[error("Inference unavailable: {0}")]
    Unavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DefectError {
    /// Whether the failure is caused by the request rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, DefectError::Decode(_) | DefectError::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for DefectError {
    fn from(err: serde_json::Error) -> Self {
        DefectError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for DefectError {
    fn from(err: image::ImageError) -> Self {
        DefectError::Decode(err.to_string())
    }
}

/// Convenience Result type for steel defect operations
pub type Result<T> = std::result::Result<T, DefectError>;
