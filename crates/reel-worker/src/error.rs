//! Worker error types.

use reel_models::Capability;
use reel_providers::{ChainError, ProviderAttempts};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Scene {scene} has no image: {source}")]
    ImageExhausted {
        scene: u32,
        #[source]
        source: ChainError,
    },

    #[error("Script generation failed: {0}")]
    ScriptFailed(#[source] ChainError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Render failed: {0}")]
    Render(#[from] reel_media::MediaError),

    #[error("Timeline error: {0}")]
    Model(#[from] reel_models::ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn image_exhausted(scene: u32, source: ChainError) -> Self {
        Self::ImageExhausted { scene, source }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Capability whose provider chain failed, if any.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            WorkerError::ImageExhausted { source, .. } | WorkerError::ScriptFailed(source) => {
                Some(source.capability())
            }
            _ => None,
        }
    }

    /// Failure ledger of the exhausted chain, empty for other errors.
    pub fn attempts(&self) -> &[ProviderAttempts] {
        match self {
            WorkerError::ImageExhausted { source, .. } | WorkerError::ScriptFailed(source) => source.attempts(),
            _ => &[],
        }
    }

    /// Check if a later run with the same input could succeed.
    ///
    /// Provider exhaustion usually stems from outages or rate limits.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::ImageExhausted { .. }
                | WorkerError::ScriptFailed(_)
                | WorkerError::Io(_)
        )
    }

    /// Check if this is a permanent failure that should NOT be retried.
    ///
    /// Rendering is local and deterministic given its inputs, so a render
    /// failure reproduces on retry.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::Render(_)
                | WorkerError::Model(_)
                | WorkerError::InvalidRequest(_)
                | WorkerError::ConfigError(_)
                | WorkerError::Json(_)
        )
    }
}
