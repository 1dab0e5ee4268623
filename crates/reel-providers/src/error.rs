//! Provider failure classification and chain errors.

use std::fmt;

use reel_models::{Capability, Provider};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeouts, rate limits, server errors, malformed artifacts
    Transient,
    /// Bad credentials, unsupported capability, rejected request
    Permanent,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long to back off after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    Standard,
    /// The provider reported a server-side error (5xx)
    ServerError,
}

/// A failed provider invocation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} failure: {reason}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub reason: String,
    pub backoff: Backoff,
}

impl ProviderFailure {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            reason: reason.into(),
            backoff: Backoff::Standard,
        }
    }

    pub fn server_error(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            reason: reason.into(),
            backoff: Backoff::ServerError,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            reason: reason.into(),
            backoff: Backoff::Standard,
        }
    }

    pub fn missing_credential() -> Self {
        Self::permanent("missing credential")
    }

    pub fn unsupported(capability: Capability) -> Self {
        Self::permanent(format!("capability {} not supported", capability))
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == FailureKind::Permanent
    }
}

/// One failed attempt in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    /// 1-based attempt number for this provider
    pub attempt: u32,
    pub kind: FailureKind,
    pub reason: String,
}

/// Every failed attempt against one provider, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempts {
    pub provider: Provider,
    pub failures: Vec<AttemptFailure>,
}

impl ProviderAttempts {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            failures: Vec::new(),
        }
    }

    /// Ledger entry for a provider rejected before any attempt.
    pub fn rejected(provider: Provider, failure: ProviderFailure) -> Self {
        let mut attempts = Self::new(provider);
        attempts.record(0, &failure);
        attempts
    }

    pub fn record(&mut self, attempt: u32, failure: &ProviderFailure) {
        self.failures.push(AttemptFailure {
            attempt,
            kind: failure.kind,
            reason: failure.reason.clone(),
        });
    }

    /// Kind of the last recorded failure.
    pub fn final_kind(&self) -> Option<FailureKind> {
        self.failures.last().map(|f| f.kind)
    }
}

impl fmt::Display for ProviderAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.last() {
            Some(last) => write!(
                f,
                "{} ({} attempt(s), last {}: {})",
                self.provider,
                self.failures.len(),
                last.kind,
                last.reason
            ),
            None => write!(f, "{} (no attempts)", self.provider),
        }
    }
}

fn format_ledger(attempts: &[ProviderAttempts]) -> String {
    if attempts.is_empty() {
        return "no providers tried".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from [`crate::ProviderChain`].
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("all {capability} providers exhausted: {}", format_ledger(.attempts))]
    AllProvidersExhausted {
        capability: Capability,
        attempts: Vec<ProviderAttempts>,
    },

    #[error("failed to store {capability} artifact: {source}")]
    Store {
        capability: Capability,
        #[source]
        source: std::io::Error,
    },
}

impl ChainError {
    pub fn capability(&self) -> Capability {
        match self {
            ChainError::AllProvidersExhausted { capability, .. } => *capability,
            ChainError::Store { capability, .. } => *capability,
        }
    }

    /// The failure ledger, empty for storage errors.
    pub fn attempts(&self) -> &[ProviderAttempts] {
        match self {
            ChainError::AllProvidersExhausted { attempts, .. } => attempts,
            ChainError::Store { .. } => &[],
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
