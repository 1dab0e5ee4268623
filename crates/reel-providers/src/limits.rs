//! Per-provider concurrency and request-rate limits.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reel_models::Provider;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Request-rate limiter for one provider.
pub type ProviderRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Caps in-flight requests and request rate for each provider.
///
/// Every provider gets its own semaphore and limiter so a slow provider
/// never blocks requests to another.
pub struct ProviderLimits {
    semaphores: HashMap<Provider, Arc<Semaphore>>,
    limiters: HashMap<Provider, Arc<ProviderRateLimiter>>,
}

impl ProviderLimits {
    /// `concurrency` in-flight requests and `requests_per_minute` per provider.
    pub fn new(concurrency: usize, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        let semaphores = Provider::ALL
            .into_iter()
            .map(|p| (p, Arc::new(Semaphore::new(concurrency.max(1)))))
            .collect();
        let limiters = Provider::ALL
            .into_iter()
            .map(|p| (p, Arc::new(RateLimiter::direct(quota))))
            .collect();

        Self { semaphores, limiters }
    }

    /// No limits at all.
    pub fn unlimited() -> Self {
        Self {
            semaphores: HashMap::new(),
            limiters: HashMap::new(),
        }
    }

    /// Wait for a request slot. Hold the permit for the request's duration.
    pub async fn acquire(&self, provider: Provider) -> Option<OwnedSemaphorePermit> {
        let permit = match self.semaphores.get(&provider) {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        };

        if let Some(limiter) = self.limiters.get(&provider) {
            limiter.until_ready().await;
        }
        trace!(provider = %provider, "Request slot acquired");
        permit
    }

    /// Free request slots for a provider, `None` when unlimited.
    pub fn available(&self, provider: Provider) -> Option<usize> {
        self.semaphores.get(&provider).map(|s| s.available_permits())
    }
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}
