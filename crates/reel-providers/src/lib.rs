//! Provider adapters and the fallback/retry chain.
//!
//! This crate provides:
//! - A typed [`ProviderAdapter`] seam, one implementation per (capability, provider)
//! - Built-in adapters for script, image, voice and motion providers
//! - [`ProviderChain`]: ordered fallback, retries, timeouts and artifact validation
//! - Script parsing and the offline template script

pub mod adapter;
pub mod adapters;
pub mod chain;
pub mod credentials;
pub mod error;
pub mod limits;
pub mod metrics;
pub mod outcome;
pub mod policy;
pub mod registry;
pub mod request;
pub mod script;
pub mod validation;

pub use adapter::ProviderAdapter;
pub use adapters::http::build_client;
pub use chain::{ChainSuccess, ProviderChain};
pub use credentials::{CredentialProvider, CredentialStore};
pub use error::{AttemptFailure, Backoff, ChainError, ChainResult, FailureKind, ProviderAttempts, ProviderFailure};
pub use limits::ProviderLimits;
pub use outcome::{Artifact, ProviderOutcome};
pub use policy::{ChainPolicy, ValidationPolicy};
pub use registry::{AdapterRegistry, AdapterSettings};
pub use request::{GenerationParams, GenerationRequest};
pub use script::{parse_script, read_script, template_scenes};
pub use validation::{ArtifactValidator, MediaValidator};
