//! Ordered provider fallback with retries and artifact validation.
//!
//! For one [`GenerationRequest`] the chain:
//!
//! 1. Builds the candidate list: caller-requested providers first, then the
//!    capability ranking when the caller named none or asked for the full
//!    ranking. Requested providers that cannot serve the request are entered
//!    in the ledger as permanent failures.
//! 2. Tries each candidate up to `max_retries` times. Transient failures wait
//!    the policy delay before the next attempt; a permanent failure moves on
//!    to the next provider immediately.
//! 3. Validates every produced artifact. A rejected artifact is a transient
//!    failure of that attempt.
//! 4. Returns the first accepted artifact, moved to the request's output
//!    path, or [`ChainError::AllProvidersExhausted`] with the full ledger.
//!
//! The chain holds no per-request state and can be shared freely.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reel_models::{Capability, Provider};
use tracing::{debug, info, warn};

use crate::adapter::ProviderAdapter;
use crate::credentials::CredentialProvider;
use crate::error::{ChainError, ChainResult, ProviderAttempts, ProviderFailure};
use crate::limits::ProviderLimits;
use crate::metrics;
use crate::outcome::{Artifact, ProviderOutcome};
use crate::policy::ChainPolicy;
use crate::registry::AdapterRegistry;
use crate::request::GenerationRequest;
use crate::validation::{ArtifactValidator, MediaValidator};

/// An accepted artifact and how it was obtained.
#[derive(Debug, Clone)]
pub struct ChainSuccess {
    pub artifact: Artifact,
    pub provider: Provider,
    /// Failures of earlier providers and attempts
    pub failures: Vec<ProviderAttempts>,
}

impl ChainSuccess {
    pub fn path(&self) -> &Path {
        &self.artifact.path
    }
}

#[derive(Clone)]
pub struct ProviderChain {
    registry: AdapterRegistry,
    credentials: Arc<dyn CredentialProvider>,
    validator: Arc<dyn ArtifactValidator>,
    limits: Arc<ProviderLimits>,
    policy: ChainPolicy,
}

impl ProviderChain {
    pub fn new(registry: AdapterRegistry, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            registry,
            credentials,
            validator: Arc::new(MediaValidator::default()),
            limits: Arc::new(ProviderLimits::unlimited()),
            policy: ChainPolicy::default(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn ArtifactValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_limits(mut self, limits: Arc<ProviderLimits>) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ChainPolicy {
        &self.policy
    }

    /// Ordered providers to try, plus ledger entries for requested providers
    /// that were rejected up front.
    pub fn candidates(&self, request: &GenerationRequest) -> (Vec<Provider>, Vec<ProviderAttempts>) {
        let capability = request.capability();
        let mut candidates: Vec<Provider> = Vec::new();
        let mut rejected = Vec::new();

        for provider in &request.providers {
            if candidates.contains(provider) || rejected.iter().any(|r: &ProviderAttempts| r.provider == *provider) {
                continue;
            }
            if let Err(failure) = self.check_usable(capability, *provider) {
                warn!(provider = %provider, capability = %capability, "Requested provider unusable: {}", failure.reason);
                rejected.push(ProviderAttempts::rejected(*provider, failure));
                continue;
            }
            candidates.push(*provider);
        }

        if request.providers.is_empty() || request.use_full_ranking {
            for provider in self.credentials.default_provider_order(capability) {
                if candidates.contains(&provider) || rejected.iter().any(|r| r.provider == provider) {
                    continue;
                }
                match self.check_usable(capability, provider) {
                    Ok(()) => candidates.push(provider),
                    Err(failure) => debug!(provider = %provider, "Skipping ranked provider: {}", failure.reason),
                }
            }
        }

        (candidates, rejected)
    }

    fn check_usable(&self, capability: Capability, provider: Provider) -> Result<(), ProviderFailure> {
        if !provider.supports(capability) || self.registry.get(capability, provider).is_none() {
            return Err(ProviderFailure::unsupported(capability));
        }
        if provider.requires_credential() && !self.credentials.has_credential(provider) {
            return Err(ProviderFailure::missing_credential());
        }
        Ok(())
    }

    /// Run the request until one provider produces an accepted artifact.
    pub async fn execute(&self, request: &GenerationRequest) -> ChainResult<ChainSuccess> {
        let capability = request.capability();
        let (candidates, mut ledger) = self.candidates(request);
        let max_attempts = request.max_retries.max(1);

        debug!(
            capability = %capability,
            candidates = ?candidates,
            "Executing provider chain"
        );

        for provider in candidates {
            let Some(adapter) = self.registry.get(capability, provider) else {
                continue;
            };
            let credential = self.credentials.credential(provider);
            let timeout = request
                .attempt_timeout
                .unwrap_or_else(|| self.policy.attempt_timeout(provider));
            let mut attempts = ProviderAttempts::new(provider);

            for attempt in 1..=max_attempts {
                let scratch = attempt_path(&request.output_path, provider, attempt);
                let outcome = self
                    .attempt(adapter.as_ref(), request, credential.clone(), &scratch, timeout)
                    .await;

                match outcome {
                    ProviderOutcome::Success { artifact } => {
                        let artifact = self.store(capability, artifact, &request.output_path).await?;
                        info!(
                            provider = %provider,
                            capability = %capability,
                            attempt,
                            size_bytes = artifact.size_bytes,
                            "Artifact accepted"
                        );
                        return Ok(ChainSuccess {
                            artifact,
                            provider,
                            failures: ledger,
                        });
                    }
                    ProviderOutcome::TransientFailure { reason, backoff } => {
                        warn!(
                            provider = %provider,
                            capability = %capability,
                            attempt,
                            max_attempts,
                            "Transient failure: {}",
                            reason
                        );
                        attempts.record(attempt, &ProviderFailure::transient(reason));
                        if attempt < max_attempts {
                            let delay = self.policy.delay_for(backoff);
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                    }
                    ProviderOutcome::PermanentFailure { reason } => {
                        warn!(
                            provider = %provider,
                            capability = %capability,
                            attempt,
                            "Permanent failure, moving to next provider: {}",
                            reason
                        );
                        attempts.record(attempt, &ProviderFailure::permanent(reason));
                        break;
                    }
                }
            }

            ledger.push(attempts);
        }

        metrics::record_exhausted(capability);
        Err(ChainError::AllProvidersExhausted {
            capability,
            attempts: ledger,
        })
    }

    /// One bounded, rate-limited, validated invocation.
    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        request: &GenerationRequest,
        credential: Option<String>,
        scratch: &Path,
        timeout: Duration,
    ) -> ProviderOutcome {
        let provider = adapter.provider();
        let capability = request.capability();
        let _permit = self.limits.acquire(provider).await;
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, adapter.invoke(&request.params, credential, scratch)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderFailure::transient(format!(
                "attempt timed out after {}s",
                timeout.as_secs_f64()
            ))),
        };
        let result = match result {
            Ok(artifact) => self.validator.validate(capability, artifact).await,
            Err(failure) => Err(failure),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_file(scratch).await;
        }

        let outcome = ProviderOutcome::from(result);
        metrics::record_attempt(provider, capability, outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn store(&self, capability: Capability, mut artifact: Artifact, output: &Path) -> ChainResult<Artifact> {
        if artifact.path != output {
            tokio::fs::rename(&artifact.path, output)
                .await
                .map_err(|source| ChainError::Store { capability, source })?;
            artifact.path = output.to_path_buf();
        }
        Ok(artifact)
    }
}

/// Scratch path for one attempt, next to the final output.
fn attempt_path(output: &Path, provider: Provider, attempt: u32) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{}.{}-{}.{}", stem, provider, attempt, ext.to_string_lossy()),
        None => format!("{}.{}-{}", stem, provider, attempt),
    };
    output.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialStore, MockCredentialProvider};
    use crate::error::FailureKind;
    use crate::request::GenerationParams;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Adapter that replays scripted results and then repeats the last one.
    struct ScriptedAdapter {
        provider: Provider,
        capability: Capability,
        script: Mutex<VecDeque<Result<(), ProviderFailure>>>,
        last: Mutex<Result<(), ProviderFailure>>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedAdapter {
        fn new(provider: Provider, capability: Capability, script: Vec<Result<(), ProviderFailure>>) -> Self {
            Self {
                provider,
                capability,
                script: Mutex::new(script.into()),
                last: Mutex::new(Err(ProviderFailure::transient("script exhausted"))),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn always(provider: Provider, capability: Capability, result: Result<(), ProviderFailure>) -> Self {
            let adapter = Self::new(provider, capability, Vec::new());
            *adapter.last.lock().unwrap() = result;
            adapter
        }

        fn calls(&self) -> Arc<AtomicU32> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn provider(&self) -> Provider {
            self.provider
        }

        fn capability(&self) -> Capability {
            self.capability
        }

        async fn invoke(
            &self,
            _params: &GenerationParams,
            _credential: Option<String>,
            output: &Path,
        ) -> Result<Artifact, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = match self.script.lock().unwrap().pop_front() {
                Some(result) => result,
                None => self.last.lock().unwrap().clone(),
            };
            next?;
            tokio::fs::write(output, self.provider.as_str()).await.unwrap();
            Ok(Artifact::new(output, self.provider.as_str().len() as u64))
        }
    }

    /// Accepts everything except artifacts from one provider.
    struct RejectProvider(Option<Provider>);

    #[async_trait]
    impl ArtifactValidator for RejectProvider {
        async fn validate(&self, _capability: Capability, artifact: Artifact) -> Result<Artifact, ProviderFailure> {
            let body = tokio::fs::read_to_string(&artifact.path).await.unwrap_or_default();
            match self.0 {
                Some(p) if body == p.as_str() => Err(ProviderFailure::transient("image too small")),
                _ => Ok(artifact),
            }
        }
    }

    fn image_request(dir: &TempDir) -> GenerationRequest {
        GenerationRequest::new(
            GenerationParams::Image {
                prompt: "A lighthouse".to_string(),
                width: 1920,
                height: 1080,
                seed: None,
            },
            dir.path().join("image.png"),
        )
    }

    fn chain(registry: AdapterRegistry, credentials: CredentialStore) -> ProviderChain {
        ProviderChain::new(registry, Arc::new(credentials))
            .with_validator(Arc::new(RejectProvider(None)))
            .with_policy(ChainPolicy::immediate())
    }

    #[tokio::test]
    async fn test_falls_back_past_transient_providers() {
        let dir = TempDir::new().unwrap();
        let stability = ScriptedAdapter::always(
            Provider::Stability,
            Capability::Image,
            Err(ProviderFailure::server_error("HTTP 503")),
        );
        let openai = ScriptedAdapter::always(
            Provider::OpenAi,
            Capability::Image,
            Err(ProviderFailure::transient("timed out")),
        );
        let pollinations = ScriptedAdapter::always(Provider::Pollinations, Capability::Image, Ok(()));
        let stability_calls = stability.calls();

        let registry = AdapterRegistry::new().with(stability).with(openai).with(pollinations);
        let credentials = CredentialStore::new()
            .with_key(Provider::Stability, "sk")
            .with_key(Provider::OpenAi, "sk");

        let success = chain(registry, credentials)
            .execute(&image_request(&dir))
            .await
            .unwrap();

        assert_eq!(success.provider, Provider::Pollinations);
        assert_eq!(success.path(), dir.path().join("image.png"));
        assert_eq!(std::fs::read_to_string(success.path()).unwrap(), "pollinations");
        assert_eq!(stability_calls.load(Ordering::SeqCst), 3);
        assert_eq!(success.failures.len(), 2);
        assert!(success.failures.iter().all(|f| f.failures.len() == 3));
    }

    #[tokio::test]
    async fn test_auth_failure_then_free_provider() {
        let dir = TempDir::new().unwrap();
        let stability = ScriptedAdapter::always(
            Provider::Stability,
            Capability::Image,
            Err(ProviderFailure::permanent("HTTP 401 Unauthorized")),
        );
        let stability_calls = stability.calls();
        let registry = AdapterRegistry::new()
            .with(stability)
            .with(ScriptedAdapter::always(Provider::Pollinations, Capability::Image, Ok(())));
        let credentials = CredentialStore::new().with_key(Provider::Stability, "expired");

        let request = image_request(&dir).with_providers([Provider::Stability, Provider::Pollinations]);
        let success = chain(registry, credentials).execute(&request).await.unwrap();

        assert_eq!(success.provider, Provider::Pollinations);
        assert_eq!(stability_calls.load(Ordering::SeqCst), 1);
        assert_eq!(success.failures.len(), 1);
        assert_eq!(success.failures[0].provider, Provider::Stability);
        assert_eq!(success.failures[0].failures.len(), 1);
        assert_eq!(success.failures[0].failures[0].kind, FailureKind::Permanent);
    }

    #[tokio::test]
    async fn test_exhaustion_has_one_entry_per_provider() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(ScriptedAdapter::always(
                Provider::HuggingFace,
                Capability::Image,
                Err(ProviderFailure::permanent("HTTP 403")),
            ))
            .with(ScriptedAdapter::always(
                Provider::Pollinations,
                Capability::Image,
                Err(ProviderFailure::transient("HTTP 502")),
            ));
        let credentials = CredentialStore::new().with_key(Provider::HuggingFace, "hf");

        let err = chain(registry, credentials)
            .execute(&image_request(&dir).with_max_retries(2))
            .await
            .unwrap_err();

        match err {
            ChainError::AllProvidersExhausted { capability, attempts } => {
                assert_eq!(capability, Capability::Image);
                let providers: Vec<Provider> = attempts.iter().map(|a| a.provider).collect();
                assert_eq!(providers, vec![Provider::HuggingFace, Provider::Pollinations]);
                assert_eq!(attempts[0].failures.len(), 1);
                assert_eq!(attempts[1].failures.len(), 2);
                assert_eq!(attempts[1].failures[1].attempt, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!dir.path().join("image.png").exists());
    }

    #[tokio::test]
    async fn test_retry_recovers_within_provider() {
        let dir = TempDir::new().unwrap();
        let adapter = ScriptedAdapter::new(
            Provider::Pollinations,
            Capability::Image,
            vec![Err(ProviderFailure::transient("HTTP 429")), Ok(())],
        );
        let calls = adapter.calls();

        let success = chain(AdapterRegistry::new().with(adapter), CredentialStore::new())
            .execute(&image_request(&dir))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(success.failures.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_artifact_counts_as_transient() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(ScriptedAdapter::always(Provider::Stability, Capability::Image, Ok(())))
            .with(ScriptedAdapter::always(Provider::Pollinations, Capability::Image, Ok(())));
        let credentials = CredentialStore::new().with_key(Provider::Stability, "sk");

        let success = ProviderChain::new(registry, Arc::new(credentials))
            .with_validator(Arc::new(RejectProvider(Some(Provider::Stability))))
            .with_policy(ChainPolicy::immediate())
            .execute(&image_request(&dir))
            .await
            .unwrap();

        assert_eq!(success.provider, Provider::Pollinations);
        let stability = &success.failures[0];
        assert_eq!(stability.failures.len(), 3);
        assert!(stability.failures.iter().all(|f| f.kind == FailureKind::Transient));
        // scratch files of rejected attempts are removed
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_single_requested_provider_is_tried_alone() {
        let dir = TempDir::new().unwrap();
        let pollinations = ScriptedAdapter::always(Provider::Pollinations, Capability::Image, Ok(()));
        let pollinations_calls = pollinations.calls();
        let registry = AdapterRegistry::new()
            .with(ScriptedAdapter::always(
                Provider::HuggingFace,
                Capability::Image,
                Err(ProviderFailure::permanent("HTTP 401")),
            ))
            .with(pollinations);
        let credentials = CredentialStore::new().with_key(Provider::HuggingFace, "hf");
        let chain = chain(registry, credentials);

        let alone = image_request(&dir).with_providers([Provider::HuggingFace]);
        assert!(chain.execute(&alone).await.is_err());
        assert_eq!(pollinations_calls.load(Ordering::SeqCst), 0);

        let ranked = alone.with_full_ranking(true);
        let success = chain.execute(&ranked).await.unwrap();
        assert_eq!(success.provider, Provider::Pollinations);
    }

    #[tokio::test]
    async fn test_requested_provider_without_key_is_ledgered() {
        let dir = TempDir::new().unwrap();
        let registry = AdapterRegistry::new()
            .with(ScriptedAdapter::always(Provider::Stability, Capability::Image, Ok(())))
            .with(ScriptedAdapter::always(Provider::Pollinations, Capability::Image, Ok(())));

        let request = image_request(&dir).with_providers([Provider::Stability, Provider::Pollinations]);
        let success = chain(registry, CredentialStore::new()).execute(&request).await.unwrap();

        assert_eq!(success.provider, Provider::Pollinations);
        assert_eq!(success.failures.len(), 1);
        assert_eq!(success.failures[0].failures[0].reason, "missing credential");
    }

    #[tokio::test]
    async fn test_ranking_comes_from_credential_provider() {
        let dir = TempDir::new().unwrap();
        let mut credentials = MockCredentialProvider::new();
        credentials
            .expect_default_provider_order()
            .returning(|_| vec![Provider::Pollinations, Provider::Stability]);
        credentials
            .expect_has_credential()
            .returning(|p| p == Provider::Stability);
        credentials.expect_credential().returning(|_| None);

        let registry = AdapterRegistry::new()
            .with(ScriptedAdapter::always(Provider::Stability, Capability::Image, Ok(())))
            .with(ScriptedAdapter::always(Provider::Pollinations, Capability::Image, Ok(())));
        let chain = ProviderChain::new(registry, Arc::new(credentials))
            .with_validator(Arc::new(RejectProvider(None)))
            .with_policy(ChainPolicy::immediate());

        let (candidates, rejected) = chain.candidates(&image_request(&dir));
        assert_eq!(candidates, vec![Provider::Pollinations, Provider::Stability]);
        assert!(rejected.is_empty());

        let success = chain.execute(&image_request(&dir)).await.unwrap();
        assert_eq!(success.provider, Provider::Pollinations);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        struct Hanging;

        #[async_trait]
        impl ProviderAdapter for Hanging {
            fn provider(&self) -> Provider {
                Provider::Pollinations
            }
            fn capability(&self) -> Capability {
                Capability::Image
            }
            async fn invoke(
                &self,
                _params: &GenerationParams,
                _credential: Option<String>,
                _output: &Path,
            ) -> Result<Artifact, ProviderFailure> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderFailure::transient("unreachable"))
            }
        }

        let dir = TempDir::new().unwrap();
        let request = image_request(&dir)
            .with_max_retries(1)
            .with_attempt_timeout(Duration::from_millis(20));

        let err = chain(AdapterRegistry::new().with(Hanging), CredentialStore::new())
            .execute(&request)
            .await
            .unwrap_err();
        assert!(err.attempts()[0].failures[0].reason.contains("timed out"));
    }

    #[test]
    fn test_attempt_path() {
        let path = attempt_path(Path::new("/w/scene-001/image-ab12.png"), Provider::Stability, 2);
        assert_eq!(path, Path::new("/w/scene-001/image-ab12.stability-2.png"));
    }
}
