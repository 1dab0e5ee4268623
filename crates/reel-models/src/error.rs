//! Error types for model parsing and validation.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or assembling domain models.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Timeline has no segments")]
    EmptyTimeline,

    #[error("Scene index {0} is invalid, indices start at 1")]
    InvalidSceneIndex(u32),

    #[error("Scene index {0} appears more than once")]
    DuplicateSceneIndex(u32),

    #[error("Scene {index} has invalid duration {duration}")]
    InvalidDuration { index: u32, duration: f64 },
}

impl ModelError {
    pub(crate) fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
