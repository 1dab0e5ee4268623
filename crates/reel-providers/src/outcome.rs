//! Artifacts and per-invocation outcomes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Backoff, FailureKind, ProviderFailure};

/// A generated file on disk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Content type reported by the provider, if any
    pub content_type: Option<String>,
    /// Measured duration for audio and video artifacts
    pub duration_seconds: Option<f64>,
    /// Provider-specific details (model, seed, task id...)
    pub metadata: BTreeMap<String, String>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of one provider invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success { artifact: Artifact },
    TransientFailure { reason: String, backoff: Backoff },
    PermanentFailure { reason: String },
}

impl ProviderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Success { .. } => "success",
            ProviderOutcome::TransientFailure { .. } => "transient",
            ProviderOutcome::PermanentFailure { .. } => "permanent",
        }
    }

    /// The failure, `None` on success.
    pub fn failure(&self) -> Option<ProviderFailure> {
        match self {
            ProviderOutcome::Success { .. } => None,
            ProviderOutcome::TransientFailure { reason, backoff } => Some(ProviderFailure {
                kind: FailureKind::Transient,
                reason: reason.clone(),
                backoff: *backoff,
            }),
            ProviderOutcome::PermanentFailure { reason } => Some(ProviderFailure::permanent(reason.clone())),
        }
    }
}

impl From<Result<Artifact, ProviderFailure>> for ProviderOutcome {
    fn from(result: Result<Artifact, ProviderFailure>) -> Self {
        match result {
            Ok(artifact) => ProviderOutcome::Success { artifact },
            Err(failure) => match failure.kind {
                FailureKind::Transient => ProviderOutcome::TransientFailure {
                    reason: failure.reason,
                    backoff: failure.backoff,
                },
                FailureKind::Permanent => ProviderOutcome::PermanentFailure { reason: failure.reason },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        let ok: ProviderOutcome = Ok(Artifact::new("/tmp/a.png", 2048)).into();
        assert!(ok.is_success());

        let busy: ProviderOutcome = Err(ProviderFailure::server_error("503")).into();
        assert_eq!(busy.label(), "transient");
        assert_eq!(busy.failure().map(|f| f.backoff), Some(Backoff::ServerError));

        let denied: ProviderOutcome = Err(ProviderFailure::permanent("401")).into();
        assert_eq!(
            denied,
            ProviderOutcome::PermanentFailure {
                reason: "401".to_string()
            }
        );
    }
}
